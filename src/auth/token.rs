//! Signed session tokens.
//!
//! A token is an HS256 JWT whose claims are `{sub, exp}`. `sub` holds the
//! JSON-serialized [`Identity`] rather than spreading its fields across the
//! claim set, so the identity payload can grow without touching the outer
//! claim schema. `exp` is an absolute unix timestamp in seconds.
//!
//! Nothing about an issued token is stored server-side: a token is valid iff
//! its signature verifies and its expiry has not passed.

use super::identity::Identity;
use anyhow::{anyhow, Result};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The only algorithm tokens are issued or accepted with.
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

/// Default session length: 1 hour.
pub const DEFAULT_SESSION_SECS: i64 = 60 * 60;

/// Session length when "remember me" is ticked at login: 7 days.
pub const REMEMBER_ME_SESSION_SECS: i64 = 7 * 24 * 60 * 60;

/// How long an issued session stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLifetime {
    Default,
    RememberMe,
}

impl SessionLifetime {
    pub fn from_remember_me(remember_me: bool) -> Self {
        if remember_me {
            Self::RememberMe
        } else {
            Self::Default
        }
    }

    pub fn as_secs(&self) -> i64 {
        match self {
            Self::Default => DEFAULT_SESSION_SECS,
            Self::RememberMe => REMEMBER_ME_SESSION_SECS,
        }
    }
}

/// The payload carried inside a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaim {
    pub identity: Identity,
    /// Unix seconds after which the token no longer authenticates.
    pub expires_at: i64,
}

impl SessionClaim {
    /// A claim for `identity` expiring `lifetime` from now.
    pub fn issue(identity: Identity, lifetime: SessionLifetime) -> Self {
        Self {
            identity,
            expires_at: Utc::now().timestamp() + lifetime.as_secs(),
        }
    }
}

/// Why a token failed to decode. Only ever logged, never sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token signature does not verify")]
    BadSignature,
    #[error("malformed token: {0}")]
    Malformed(String),
}

impl TokenError {
    /// Short label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::BadSignature => "bad_signature",
            Self::Malformed(_) => "malformed",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    sub: String,
    exp: i64,
}

/// Encodes and decodes session tokens under one signing key.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &TOKEN_ALGORITHM)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(signing_key: &[u8]) -> Self {
        let mut validation = Validation::new(TOKEN_ALGORITHM);
        // `exp` is the only time bound; a token is dead the second it passes.
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(signing_key),
            decoding: DecodingKey::from_secret(signing_key),
            validation,
        }
    }

    pub fn encode(&self, claim: &SessionClaim) -> Result<String> {
        let sub = serde_json::to_string(&claim.identity)
            .map_err(|e| anyhow!("Failed to serialize identity: {e}"))?;
        let wire = WireClaims {
            sub,
            exp: claim.expires_at,
        };
        jsonwebtoken::encode(&Header::new(TOKEN_ALGORITHM), &wire, &self.encoding)
            .map_err(|e| anyhow!("Failed to create token: {e}"))
    }

    /// Verify the signature, then the expiry, then parse the identity.
    pub fn decode(&self, token: &str) -> Result<SessionClaim, TokenError> {
        let data = jsonwebtoken::decode::<WireClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                other => TokenError::Malformed(format!("{other:?}")),
            })?;

        let identity: Identity = serde_json::from_str(&data.claims.sub)
            .map_err(|e| TokenError::Malformed(format!("identity payload: {e}")))?;

        Ok(SessionClaim {
            identity,
            expires_at: data.claims.exp,
        })
    }
}
