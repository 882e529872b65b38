//! Axum-based HTTP gateway for the library service.
//!
//! - Account routes: register, login (sets the session cookie), logout, me
//! - Catalog routes: public reads, admin-only writes
//! - File routes: admin upload (multipart), session-gated streaming download
//!
//! Request body size and request time are bounded by tower-http layers; both
//! limits come from `[gateway]` in the config.

pub mod auth;
pub mod books;
pub mod error;

pub use error::ApiError;

use crate::auth::{AuthGate, PasswordHasher, SessionCookie, SqliteCredentialStore, TokenCodec};
use crate::books::{BookStore, FileStorage, SqliteBookStore};
use crate::config::{Config, GatewayConfig};
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AuthGate>,
    pub books: Arc<dyn BookStore>,
    pub files: Arc<FileStorage>,
    /// Whether `POST /register/` accepts new accounts.
    pub allow_registration: bool,
}

impl AppState {
    /// Open the database and uploads directory named by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let db_path = config.database_path()?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let credentials = SqliteCredentialStore::open(&db_path)
            .with_context(|| format!("Failed to open credential store {}", db_path.display()))?;
        let books = SqliteBookStore::open(&db_path)
            .with_context(|| format!("Failed to open book store {}", db_path.display()))?;
        let files = FileStorage::new(config.uploads_dir()?).context("Failed to prepare uploads dir")?;

        let gate = AuthGate::new(
            Arc::new(credentials),
            PasswordHasher::new(config.auth.bcrypt_cost)?,
            TokenCodec::new(config.signing_key()?.as_bytes()),
            SessionCookie::new(config.cookie_name()?),
        )?;

        Ok(Self {
            gate: Arc::new(gate),
            books: Arc::new(books),
            files: Arc::new(files),
            allow_registration: config.auth.allow_registration,
        })
    }
}

/// Build the router with every route and middleware layer.
pub fn router(state: AppState, gateway: &GatewayConfig) -> Router {
    // Credentialed CORS cannot use a literal `*`; mirror the request origin instead.
    let cors = if gateway.cors_allow_any_origin {
        CorsLayer::very_permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/register/", post(auth::handle_register))
        .route("/login/", post(auth::handle_login))
        .route("/logout/", post(auth::handle_logout))
        .route("/me", get(auth::handle_me))
        .route(
            "/books/",
            get(books::handle_list_books).post(books::handle_create_book),
        )
        .route(
            "/books/{book_id}",
            get(books::handle_get_book)
                .put(books::handle_update_book)
                .delete(books::handle_delete_book),
        )
        .route("/upload", post(books::handle_upload))
        .route("/download/{book_id}", get(books::handle_download))
        .with_state(state)
        .layer(DefaultBodyLimit::max(gateway.max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(gateway.max_upload_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(gateway.request_timeout_secs),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP gateway until Ctrl-C / SIGTERM.
pub async fn run_gateway(config: Config) -> Result<()> {
    let state = AppState::from_config(&config)?;
    let app = router(state, &config.gateway);

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let local = listener.local_addr()?;

    tracing::info!(
        addr = %local,
        registration = config.auth.allow_registration,
        "Library gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// GET /
async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({"message": "Welcome in Library Management System"}))
}

/// GET /health: Always public
async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}
