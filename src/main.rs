use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use libris::auth::Role;
use libris::{AppState, Config};
use std::io::BufRead;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable `user add` reads the new password from.
const ENV_NEW_PASSWORD: &str = "LIBRIS_NEW_PASSWORD";

#[derive(Parser)]
#[command(name = "libris")]
#[command(about = "Library catalog service with cookie-session authentication")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway
    Serve {
        /// Config file (default: ~/.libris/libris.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override [gateway] host
        #[arg(long)]
        host: Option<String>,

        /// Override [gateway] port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create an account, bypassing `allow_registration`.
    /// The password is read from LIBRIS_NEW_PASSWORD, else the first line of stdin.
    Add {
        #[arg(short, long)]
        username: String,

        /// admin or member
        #[arg(short, long, default_value = "member")]
        role: Role,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Load and validate the configuration, then print where things live
    Check {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("libris=info,tower_http=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn read_new_password() -> Result<String> {
    if let Ok(password) = std::env::var(ENV_NEW_PASSWORD) {
        return Ok(password);
    }
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("No password given (set {ENV_NEW_PASSWORD} or pipe it on stdin)");
    }
    Ok(password)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            libris::run_gateway(config).await
        }
        Commands::User {
            action:
                UserAction::Add {
                    username,
                    role,
                    config,
                },
        } => {
            let config = Config::load(config.as_deref())?;
            let password = read_new_password()?;
            let state = AppState::from_config(&config)?;
            let gate = state.gate.clone();
            let identity = tokio::task::spawn_blocking(move || {
                gate.register(&username, &password, role.as_str())
            })
            .await??;
            println!("Created {} ({})", identity.username, identity.role);
            Ok(())
        }
        Commands::Config {
            action: ConfigAction::Check { config },
        } => {
            let config = Config::load(config.as_deref())?;
            println!("Configuration OK");
            println!(
                "  listen:   {}:{}",
                config.gateway.host, config.gateway.port
            );
            println!("  cookie:   {}", config.cookie_name()?);
            println!("  database: {}", config.database_path()?.display());
            println!("  uploads:  {}", config.uploads_dir()?.display());
            println!(
                "  registration: {}",
                if config.auth.allow_registration {
                    "open"
                } else {
                    "closed"
                }
            );
            Ok(())
        }
    }
}
