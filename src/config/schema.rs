use serde::{Deserialize, Serialize};

/// Top-level `libris.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

// ── Gateway ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted request body; bounds file uploads.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Reflect any `Origin` back (with credentials) instead of same-origin only.
    #[serde(default = "default_true")]
    pub cors_allow_any_origin: bool,
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8000
}

fn default_max_upload_bytes() -> usize {
    32 * 1024 * 1024
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            request_timeout_secs: default_request_timeout_secs(),
            cors_allow_any_origin: true,
        }
    }
}

// ── Auth ────────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Name of the session cookie. Required.
    #[serde(default)]
    pub cookie_name: Option<String>,
    /// HMAC key tokens are signed with. Required, at least 32 bytes.
    #[serde(default)]
    pub signing_key: Option<String>,
    /// Whether `POST /register/` accepts new accounts.
    #[serde(default = "default_true")]
    pub allow_registration: bool,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: None,
            signing_key: None,
            allow_registration: true,
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("cookie_name", &self.cookie_name)
            .field(
                "signing_key",
                &self.signing_key.as_ref().map(|_| "[redacted]"),
            )
            .field("allow_registration", &self.allow_registration)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

// ── Storage ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file holding users and books. `~` and `$VARS` are expanded.
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Directory uploaded book files are written to.
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,
}

fn default_database_path() -> String {
    "~/.libris/libris.db".into()
}

fn default_uploads_dir() -> String {
    "~/.libris/uploads".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            uploads_dir: default_uploads_dir(),
        }
    }
}
