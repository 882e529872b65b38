//! Service configuration: `libris.toml` plus environment overrides.

pub mod schema;

pub use schema::{AuthConfig, Config, GatewayConfig, StorageConfig};

use crate::auth::is_valid_cookie_name;
use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};

/// Shortest accepted signing key, in bytes (HS256 block-size guidance).
pub const MIN_SIGNING_KEY_BYTES: usize = 32;

pub const ENV_SIGNING_KEY: &str = "LIBRIS_SIGNING_KEY";
pub const ENV_COOKIE_NAME: &str = "LIBRIS_COOKIE_NAME";
pub const ENV_DATABASE_PATH: &str = "LIBRIS_DATABASE_PATH";
pub const ENV_UPLOADS_DIR: &str = "LIBRIS_UPLOADS_DIR";

impl Config {
    /// `~/.libris/libris.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let home = directories::UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".libris").join("libris.toml"))
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist. A missing default file yields defaults,
    /// leaving the required values to the environment. Environment overrides
    /// are applied, then the result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Self::default_path()?;
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    tracing::debug!(path = %path.display(), "Config file not found, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded config from file");
        Ok(config)
    }

    /// Overlay non-empty environment values onto the file values.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_SIGNING_KEY) {
            self.auth.signing_key = Some(key);
        }
        if let Some(name) = get(ENV_COOKIE_NAME) {
            self.auth.cookie_name = Some(name);
        }
        if let Some(path) = get(ENV_DATABASE_PATH) {
            self.storage.database_path = path;
        }
        if let Some(dir) = get(ENV_UPLOADS_DIR) {
            self.storage.uploads_dir = dir;
        }
    }

    /// Reject configurations the service cannot start with.
    pub fn validate(&self) -> Result<()> {
        let key = self.signing_key()?;
        if key.len() < MIN_SIGNING_KEY_BYTES {
            bail!(
                "auth.signing_key must be at least {MIN_SIGNING_KEY_BYTES} bytes (got {})",
                key.len()
            );
        }

        let name = self.cookie_name()?;
        if !is_valid_cookie_name(name) {
            bail!("auth.cookie_name '{name}' is not a valid cookie name");
        }

        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            bail!(
                "auth.bcrypt_cost must be between 4 and 31 (got {})",
                self.auth.bcrypt_cost
            );
        }
        if self.gateway.max_upload_bytes == 0 {
            bail!("gateway.max_upload_bytes must be greater than zero");
        }
        if self.gateway.request_timeout_secs == 0 {
            bail!("gateway.request_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn signing_key(&self) -> Result<&str> {
        self.auth
            .signing_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow!("auth.signing_key is required (or set {ENV_SIGNING_KEY})"))
    }

    pub fn cookie_name(&self) -> Result<&str> {
        self.auth
            .cookie_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| anyhow!("auth.cookie_name is required (or set {ENV_COOKIE_NAME})"))
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        expand_path(&self.storage.database_path)
    }

    pub fn uploads_dir(&self) -> Result<PathBuf> {
        expand_path(&self.storage.uploads_dir)
    }
}

fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded =
        shellexpand::full(raw).map_err(|e| anyhow!("Failed to expand path '{raw}': {e}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn valid() -> Config {
        let mut config = Config::default();
        config.auth.signing_key = Some(KEY.into());
        config.auth.cookie_name = Some("library_session".into());
        config
    }

    #[test]
    fn parse_full_file() {
        let toml = r#"
[gateway]
host = "0.0.0.0"
port = 9000
max_upload_bytes = 1024
request_timeout_secs = 5
cors_allow_any_origin = false

[auth]
cookie_name = "library_session"
signing_key = "0123456789abcdef0123456789abcdef"
allow_registration = false
bcrypt_cost = 4

[storage]
database_path = "/tmp/libris.db"
uploads_dir = "/tmp/uploads"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.gateway.host, "0.0.0.0");
        assert_eq!(config.gateway.port, 9000);
        assert!(!config.gateway.cors_allow_any_origin);
        assert!(!config.auth.allow_registration);
        assert_eq!(config.auth.bcrypt_cost, 4);
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/libris.db"));
        config.validate().unwrap();
    }

    #[test]
    fn empty_file_gets_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.gateway.max_upload_bytes, 32 * 1024 * 1024);
        assert!(config.auth.allow_registration);
        assert_eq!(config.auth.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert!(config.auth.signing_key.is_none());
    }

    #[test]
    fn missing_signing_key_or_cookie_name_fails_validation() {
        let mut config = valid();
        config.auth.signing_key = None;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("signing_key"), "{err}");

        let mut config = valid();
        config.auth.cookie_name = Some("   ".into());
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("cookie_name"), "{err}");
    }

    #[test]
    fn short_key_and_bad_cookie_name_are_rejected() {
        let mut config = valid();
        config.auth.signing_key = Some("short".into());
        assert!(config.validate().is_err());

        let mut config = valid();
        config.auth.cookie_name = Some("bad name;".into());
        assert!(config.validate().is_err());

        let mut config = valid();
        config.auth.bcrypt_cost = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_take_priority() {
        let mut config = valid();
        let env: HashMap<&str, &str> = [
            (ENV_SIGNING_KEY, "ffffffffffffffffffffffffffffffff"),
            (ENV_COOKIE_NAME, "sid"),
            (ENV_DATABASE_PATH, "/var/lib/libris.db"),
            (ENV_UPLOADS_DIR, ""),
        ]
        .into_iter()
        .collect();

        config.apply_env_overrides(|k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(config.signing_key().unwrap(), "ffffffffffffffffffffffffffffffff");
        assert_eq!(config.cookie_name().unwrap(), "sid");
        assert_eq!(config.storage.database_path, "/var/lib/libris.db");
        // Empty values do not override.
        assert_eq!(config.storage.uploads_dir, "~/.libris/uploads");
    }

    #[test]
    fn load_explicit_path_must_exist() {
        let tmp = TempDir::new().unwrap();
        assert!(Config::from_file(&tmp.path().join("nope.toml")).is_err());
    }

    #[test]
    fn from_file_reads_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("libris.toml");
        std::fs::write(
            &path,
            format!("[auth]\ncookie_name = \"library_session\"\nsigning_key = \"{KEY}\"\n"),
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        config.validate().unwrap();
        assert_eq!(config.cookie_name().unwrap(), "library_session");
    }

    #[test]
    fn tilde_paths_expand() {
        let config = valid();
        let db = config.database_path().unwrap();
        assert!(!db.to_string_lossy().starts_with('~'));
        assert!(db.ends_with(".libris/libris.db"));
    }

    #[test]
    fn debug_output_redacts_signing_key() {
        let rendered = format!("{:?}", valid().auth);
        assert!(rendered.contains("[redacted]"));
        assert!(!rendered.contains(KEY));
    }
}
