//! Account authentication for the library service.
//!
//! Provides:
//! - Registration with bcrypt-hashed passwords (`password`)
//! - Stateless session tokens: HS256 JWTs carrying the identity (`token`)
//! - The session cookie that ferries tokens to and from browsers (`cookie`)
//! - SQLite-backed credential storage (`store`)
//! - The per-request gate tying it together (`gate`)
//!
//! ## Design Decisions
//! - Sessions are not stored server-side. A token is valid while its signature
//!   verifies and its expiry has not passed; logout only clears the cookie.
//! - The role inside a token is fixed at login. A role change in the store
//!   takes effect on the next login.
//! - Username uniqueness is enforced by the table, never by a read-then-write.

pub mod cookie;
pub mod gate;
pub mod identity;
pub mod password;
pub mod store;
pub mod token;

pub use cookie::{is_valid_cookie_name, SessionCookie};
pub use gate::{require_role, AuthError, AuthGate, IssuedSession};
pub use identity::{CredentialRecord, Identity, Role, UnknownRole};
pub use password::PasswordHasher;
pub use store::{CredentialStore, SqliteCredentialStore, StoreError};
pub use token::{SessionClaim, SessionLifetime, TokenCodec, TokenError};
