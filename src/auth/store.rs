//! SQLite-backed credential store.
//!
//! Tables:
//! - `users`: username (unique, case-insensitive), password_hash, role, created_at
//!
//! Username uniqueness is the table's job. Callers insert and react to the
//! constraint violation instead of checking for an existing row first, so two
//! concurrent registrations of one name cannot both succeed.

use super::identity::{CredentialRecord, Role, UnknownRole};
use parking_lot::Mutex;
use chrono::Utc;
use std::path::Path;

/// Credential store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("username '{0}' is already taken")]
    DuplicateUsername(String),
    #[error("stored record for '{username}' is corrupt: {reason}")]
    Corrupt { username: String, reason: String },
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Where account records live.
pub trait CredentialStore: Send + Sync {
    fn find_by_username(&self, username: &str) -> Result<Option<CredentialRecord>, StoreError>;

    /// Insert a new record; fails with [`StoreError::DuplicateUsername`] when
    /// the name is taken.
    fn insert(&self, record: &CredentialRecord) -> Result<(), StoreError>;
}

/// SQLite-backed [`CredentialStore`].
pub struct SqliteCredentialStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteCredentialStore {
    /// Open (or create) the credential database at the given path.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open(db_path)?;

        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        Self::with_connection(conn)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(rusqlite::Connection::open_in_memory()?)
    }

    fn with_connection(conn: rusqlite::Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn find_by_username(&self, username: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let conn = self.conn.lock();
        let row = conn.query_row(
            "SELECT username, password_hash, role FROM users WHERE username = ?1",
            rusqlite::params![username.trim()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        );

        match row {
            Ok((username, password_hash, role)) => {
                let role: Role = role.parse().map_err(|e: UnknownRole| {
                    StoreError::Corrupt {
                        username: username.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(Some(CredentialRecord {
                    username,
                    password_hash,
                    role,
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn insert(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO users (username, password_hash, role, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                record.username,
                record.password_hash,
                record.role.as_str(),
                Utc::now().timestamp()
            ],
        );

        match result {
            Ok(_) => {
                tracing::info!(username = %record.username, role = %record.role, "User registered");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateUsername(record.username.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, SqliteCredentialStore) {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("libris.db");
        let store = SqliteCredentialStore::open(&db_path).unwrap();
        (tmp, store)
    }

    fn row_count(store: &SqliteCredentialStore) -> i64 {
        store
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap()
    }

    fn record(username: &str, role: Role) -> CredentialRecord {
        CredentialRecord {
            username: username.into(),
            password_hash: "$2b$04$placeholderplaceholderplaceholderplaceholderpla".into(),
            role,
        }
    }

    #[test]
    fn insert_and_find() {
        let (_tmp, store) = test_store();

        store.insert(&record("alice", Role::Admin)).unwrap();
        let found = store.find_by_username("alice").unwrap().unwrap();
        assert_eq!(found.username, "alice");
        assert_eq!(found.role, Role::Admin);
        assert!(found.password_hash.starts_with("$2b$"));
    }

    #[test]
    fn find_missing_user_is_none() {
        let (_tmp, store) = test_store();
        assert!(store.find_by_username("ghost").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_rejected_by_the_table() {
        let (_tmp, store) = test_store();

        store.insert(&record("alice", Role::Admin)).unwrap();
        let err = store.insert(&record("alice", Role::Member)).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUsername(ref name) if name == "alice"));

        // The original record is untouched.
        let found = store.find_by_username("alice").unwrap().unwrap();
        assert_eq!(found.role, Role::Admin);
    }

    #[test]
    fn usernames_are_case_insensitive() {
        let (_tmp, store) = test_store();

        store.insert(&record("Alice", Role::Member)).unwrap();
        assert!(store.insert(&record("alice", Role::Member)).is_err());
        let found = store.find_by_username("ALICE").unwrap().unwrap();
        assert_eq!(found.username, "Alice");
    }

    #[test]
    fn concurrent_duplicate_registration_admits_exactly_one() {
        let (_tmp, store) = test_store();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.insert(&record("racer", Role::Member)).is_ok())
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 1);
        assert_eq!(row_count(&store), 1);
    }

    #[test]
    fn unknown_stored_role_is_reported_as_corrupt() {
        let store = SqliteCredentialStore::open_in_memory().unwrap();
        store
            .conn
            .lock()
            .execute(
                "INSERT INTO users (username, password_hash, role, created_at)
                 VALUES ('eve', 'x', 'superuser', 0)",
                [],
            )
            .unwrap();

        let err = store.find_by_username("eve").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn created_at_is_current_epoch_seconds() {
        let store = SqliteCredentialStore::open_in_memory().unwrap();
        let before = Utc::now().timestamp();
        store.insert(&record("alice", Role::Member)).unwrap();

        let created_at: i64 = store
            .conn
            .lock()
            .query_row("SELECT created_at FROM users WHERE username = 'alice'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert!((before..=Utc::now().timestamp()).contains(&created_at));
    }
}
