//! Session cookie: carries the token between server and browser.
//!
//! The cookie is a session cookie (no `Max-Age`/`Expires` when set). A cookie
//! that survives a browser restart still stops authenticating once the token
//! inside it expires.

use axum::http::header::{self, InvalidHeaderValue};
use axum::http::{HeaderMap, HeaderValue};

/// Attributes shared by the set and clear forms of the cookie.
const COOKIE_ATTRIBUTES: &str = "HttpOnly; Secure; Path=/; SameSite=Lax";

/// Binds session tokens to a named, HTTP-only, secure-only cookie.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    name: String,
}

impl SessionCookie {
    /// `name` must already satisfy [`is_valid_cookie_name`]; config validation
    /// checks it at startup.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `Set-Cookie` value that stores `token`.
    pub fn attach(&self, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&format!("{}={token}; {COOKIE_ATTRIBUTES}", self.name))
    }

    /// `Set-Cookie` value that tells the browser to drop the cookie.
    pub fn detach(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&format!(
            "{}=; {COOKIE_ATTRIBUTES}; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            self.name
        ))
    }

    /// Token carried by the request, if any. An empty value counts as absent.
    pub fn extract(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| name.trim() == self.name)
            .map(|(_, value)| value.trim().trim_matches('"').to_owned())
            .filter(|value| !value.is_empty())
    }
}

/// RFC 6265 cookie-name check: visible ASCII, no separators.
pub fn is_valid_cookie_name(name: &str) -> bool {
    const SEPARATORS: &[u8] = b"()<>@,;:\\\"/[]?={} \t";
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && !SEPARATORS.contains(&b))
}
