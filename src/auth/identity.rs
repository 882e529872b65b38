//! Account roles, authenticated identities and stored credential records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of account roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May create, edit and delete books and upload their files.
    Admin,
    /// May browse the catalog and download book files.
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role string is not one of the known roles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}' (expected 'admin' or 'member')")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            _ => Err(UnknownRole(s.to_owned())),
        }
    }
}

/// Who a request is acting as, once its session has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub role: Role,
}

impl Identity {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }
}

/// A stored account: username, bcrypt hash and role.
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

impl CredentialRecord {
    /// The identity a session issued for this record carries.
    pub fn identity(&self) -> Identity {
        Identity::new(self.username.clone(), self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_known_values_case_insensitively() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("Member".parse::<Role>().unwrap(), Role::Member);
        assert_eq!(" ADMIN ".parse::<Role>().unwrap(), Role::Admin);
    }

    #[test]
    fn role_rejects_unknown_values() {
        let err = "librarian".parse::<Role>().unwrap_err();
        assert_eq!(err, UnknownRole("librarian".into()));
        assert!(err.to_string().contains("librarian"));
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
        let back: Role = serde_json::from_str("\"member\"").unwrap();
        assert_eq!(back, Role::Member);
        assert!(serde_json::from_str::<Role>("\"root\"").is_err());
    }

    #[test]
    fn record_identity_mirrors_username_and_role() {
        let record = CredentialRecord {
            username: "alice".into(),
            password_hash: "$2b$04$irrelevant".into(),
            role: Role::Admin,
        };
        let identity = record.identity();
        assert_eq!(identity, Identity::new("alice", Role::Admin));
        assert!(identity.has_role(Role::Admin));
        assert!(!identity.has_role(Role::Member));
    }
}
