//! Login, registration and the per-request session gate.

use super::cookie::SessionCookie;
use super::identity::{CredentialRecord, Identity, Role, UnknownRole};
use super::password::{PasswordHasher, MAX_PASSWORD_BYTES};
use super::store::{CredentialStore, StoreError};
use super::token::{SessionClaim, SessionLifetime, TokenCodec, TokenError};
use axum::http::HeaderMap;
use std::sync::Arc;

/// Longest accepted username.
pub const MAX_USERNAME_CHARS: usize = 64;

/// Password the dummy hash is computed from; only its cost matters.
const TIMING_EQUALIZER: &str = "libris-timing-equalizer";

/// Everything the auth layer can reject a request with.
///
/// Variants stay distinct for logging. What a client sees for each one is
/// decided by the HTTP boundary, which collapses codec failures into a single
/// response.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown username or wrong password; the two are never told apart.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("no session cookie on request")]
    AuthenticationMissing,
    #[error("session token rejected: {0}")]
    AuthenticationFailed(#[source] TokenError),
    #[error("permission denied: requires role {required}")]
    PermissionDenied { required: Role },
    #[error("username already exists")]
    UsernameTaken,
    #[error("{0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername(_) => Self::UsernameTaken,
            other => Self::Internal(other.into()),
        }
    }
}

/// A freshly issued session: the token plus the claim it encodes.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub claim: SessionClaim,
}

/// Turns credentials into sessions and session cookies into identities.
///
/// Holds only read-only state besides the store handle, so one instance is
/// shared by every request.
pub struct AuthGate {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    codec: TokenCodec,
    cookie: SessionCookie,
    dummy_hash: String,
}

impl AuthGate {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        codec: TokenCodec,
        cookie: SessionCookie,
    ) -> anyhow::Result<Self> {
        let dummy_hash = hasher.hash(TIMING_EQUALIZER)?;
        Ok(Self {
            store,
            hasher,
            codec,
            cookie,
            dummy_hash,
        })
    }

    pub fn cookie(&self) -> &SessionCookie {
        &self.cookie
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Create an account. Uniqueness is left to the store.
    pub fn register(&self, username: &str, password: &str, role: &str) -> Result<Identity, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::InvalidRequest("Username cannot be empty".into()));
        }
        if username.chars().count() > MAX_USERNAME_CHARS {
            return Err(AuthError::InvalidRequest(format!(
                "Username too long (max {MAX_USERNAME_CHARS} characters)"
            )));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidRequest("Password cannot be empty".into()));
        }
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AuthError::InvalidRequest(format!(
                "Password too long (max {MAX_PASSWORD_BYTES} bytes)"
            )));
        }
        let role: Role = role
            .parse()
            .map_err(|e: UnknownRole| AuthError::InvalidRequest(e.to_string()))?;

        let record = CredentialRecord {
            username: username.to_owned(),
            password_hash: self.hasher.hash(password)?,
            role,
        };
        self.store.insert(&record)?;
        Ok(record.identity())
    }

    /// Verify credentials and issue a session for the stored identity.
    pub fn login(
        &self,
        username: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<IssuedSession, AuthError> {
        let record = match self.store.find_by_username(username)? {
            Some(record) if self.hasher.verify(password, &record.password_hash) => record,
            Some(_) => {
                tracing::info!(username = %username.trim(), "Login rejected");
                return Err(AuthError::InvalidCredentials);
            }
            None => {
                // Same bcrypt cost as a real mismatch.
                let _ = self.hasher.verify(password, &self.dummy_hash);
                tracing::info!(username = %username.trim(), "Login rejected");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let claim = SessionClaim::issue(
            record.identity(),
            SessionLifetime::from_remember_me(remember_me),
        );
        let token = self.codec.encode(&claim)?;
        tracing::info!(
            username = %claim.identity.username,
            role = %claim.identity.role,
            expires_at = claim.expires_at,
            "Session issued"
        );
        Ok(IssuedSession { token, claim })
    }

    /// Resolve the identity behind the request's session cookie.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let token = self.cookie.extract(headers);
        self.verify_token(token.as_deref())
    }

    /// Gate logic on an already-extracted token.
    pub fn verify_token(&self, token: Option<&str>) -> Result<Identity, AuthError> {
        let token = token.ok_or(AuthError::AuthenticationMissing)?;
        match self.codec.decode(token) {
            Ok(claim) => Ok(claim.identity),
            Err(err) => {
                tracing::warn!(reason = err.kind(), "Session token rejected");
                Err(AuthError::AuthenticationFailed(err))
            }
        }
    }
}

/// Authorization check against the authenticated identity.
pub fn require_role(identity: &Identity, required: Role) -> Result<(), AuthError> {
    if identity.has_role(required) {
        Ok(())
    } else {
        tracing::info!(
            username = %identity.username,
            role = %identity.role,
            required = %required,
            "Permission denied"
        );
        Err(AuthError::PermissionDenied { required })
    }
}
