//! Book catalog: records in SQLite, uploaded content on the filesystem.

pub mod files;
pub mod store;

pub use files::FileStorage;
pub use store::{BookStore, SqliteBookStore};

use serde::{Deserialize, Serialize};

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Where clients fetch the book's content from, once a file is attached.
    #[serde(default)]
    pub file_url: Option<String>,
    /// Name of the attached file inside the uploads directory.
    #[serde(skip)]
    pub stored_file: Option<String>,
}

/// Client-editable book fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BookDraft {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl BookDraft {
    /// Trim fields and reject blank title or author.
    pub fn normalized(self) -> Result<Self, BookError> {
        let title = self.title.trim().to_owned();
        let author = self.author.trim().to_owned();
        if title.is_empty() {
            return Err(BookError::InvalidInput("Title cannot be empty".into()));
        }
        if author.is_empty() {
            return Err(BookError::InvalidInput("Author cannot be empty".into()));
        }
        let description = self
            .description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());
        Ok(Self {
            title,
            author,
            description,
        })
    }
}

/// Path clients download a book's file from.
pub fn download_url(book_id: &str) -> String {
    format!("/download/{book_id}")
}

#[derive(Debug, thiserror::Error)]
pub enum BookError {
    #[error("no file stored for book '{0}'")]
    FileMissing(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("file storage error: {0}")]
    Io(#[from] std::io::Error),
}
