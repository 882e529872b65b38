//! SQLite-backed book records.
//!
//! Tables:
//! - `books`: id (uuid), title, author, description, stored_file, created_at, updated_at

use super::{download_url, Book, BookDraft, BookError};
use parking_lot::Mutex;
use rusqlite::OptionalExtension;
use std::path::Path;

/// Where book records live.
pub trait BookStore: Send + Sync {
    fn create(&self, draft: &BookDraft) -> Result<Book, BookError>;
    fn list(&self) -> Result<Vec<Book>, BookError>;
    fn get(&self, id: &str) -> Result<Option<Book>, BookError>;
    /// Replace the editable fields; the attached file is kept.
    fn update(&self, id: &str, draft: &BookDraft) -> Result<Option<Book>, BookError>;
    /// Remove the record, returning it so its file can be cleaned up.
    fn delete(&self, id: &str) -> Result<Option<Book>, BookError>;
    fn attach_file(&self, id: &str, stored_file: &str) -> Result<Option<Book>, BookError>;
}

/// SQLite-backed [`BookStore`].
pub struct SqliteBookStore {
    conn: Mutex<rusqlite::Connection>,
}

const BOOK_COLUMNS: &str = "id, title, author, description, stored_file";

impl SqliteBookStore {
    pub fn open(db_path: &Path) -> Result<Self, BookError> {
        let conn = rusqlite::Connection::open(db_path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, BookError> {
        Self::with_connection(rusqlite::Connection::open_in_memory()?)
    }

    fn with_connection(conn: rusqlite::Connection) -> Result<Self, BookError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS books (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                description TEXT,
                stored_file TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_books_created ON books(created_at);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn fetch(conn: &rusqlite::Connection, id: &str) -> Result<Option<Book>, BookError> {
        let book = conn
            .query_row(
                &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
                rusqlite::params![id],
                row_to_book,
            )
            .optional()?;
        Ok(book)
    }
}

fn row_to_book(row: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
    let id: String = row.get(0)?;
    let stored_file: Option<String> = row.get(4)?;
    Ok(Book {
        file_url: stored_file.as_ref().map(|_| download_url(&id)),
        id,
        title: row.get(1)?,
        author: row.get(2)?,
        description: row.get(3)?,
        stored_file,
    })
}

impl BookStore for SqliteBookStore {
    fn create(&self, draft: &BookDraft) -> Result<Book, BookError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO books (id, title, author, description, stored_file, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?5)",
            rusqlite::params![id, draft.title, draft.author, draft.description, now],
        )?;
        tracing::info!(book_id = %id, title = %draft.title, "Book created");
        Ok(Book {
            id,
            title: draft.title.clone(),
            author: draft.author.clone(),
            description: draft.description.clone(),
            file_url: None,
            stored_file: None,
        })
    }

    fn list(&self) -> Result<Vec<Book>, BookError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {BOOK_COLUMNS} FROM books ORDER BY created_at ASC, rowid ASC"
        ))?;
        let books = stmt
            .query_map([], row_to_book)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(books)
    }

    fn get(&self, id: &str) -> Result<Option<Book>, BookError> {
        let conn = self.conn.lock();
        Self::fetch(&conn, id)
    }

    fn update(&self, id: &str, draft: &BookDraft) -> Result<Option<Book>, BookError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE books SET title = ?2, author = ?3, description = ?4, updated_at = ?5
             WHERE id = ?1",
            rusqlite::params![
                id,
                draft.title,
                draft.author,
                draft.description,
                chrono::Utc::now().timestamp()
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        tracing::info!(book_id = %id, "Book updated");
        Self::fetch(&conn, id)
    }

    fn delete(&self, id: &str) -> Result<Option<Book>, BookError> {
        let conn = self.conn.lock();
        let Some(book) = Self::fetch(&conn, id)? else {
            return Ok(None);
        };
        conn.execute("DELETE FROM books WHERE id = ?1", rusqlite::params![id])?;
        tracing::info!(book_id = %id, "Book deleted");
        Ok(Some(book))
    }

    fn attach_file(&self, id: &str, stored_file: &str) -> Result<Option<Book>, BookError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE books SET stored_file = ?2, updated_at = ?3 WHERE id = ?1",
            rusqlite::params![id, stored_file, chrono::Utc::now().timestamp()],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Self::fetch(&conn, id)
    }
}
