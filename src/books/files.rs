//! Flat-directory storage for uploaded book files.
//!
//! Every file is named `<book-id>[.<ext>]`. Nothing a client types ends up in
//! a path except the extension, which is reduced to ASCII alphanumerics.

use super::BookError;
use std::path::{Path, PathBuf};

const MAX_EXTENSION_CHARS: usize = 10;

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Use `root` as the uploads directory, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, BookError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name a book's file is stored under, given the uploaded filename.
    pub fn stored_name(book_id: &str, original_filename: Option<&str>) -> String {
        let ext = original_filename
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                ext.chars()
                    .filter(char::is_ascii_alphanumeric)
                    .take(MAX_EXTENSION_CHARS)
                    .collect::<String>()
                    .to_ascii_lowercase()
            })
            .unwrap_or_default();
        if ext.is_empty() {
            book_id.to_owned()
        } else {
            format!("{book_id}.{ext}")
        }
    }

    /// Write `contents` for `book_id`; returns the stored name.
    pub async fn save(
        &self,
        book_id: &str,
        original_filename: Option<&str>,
        contents: &[u8],
    ) -> Result<String, BookError> {
        let name = Self::stored_name(book_id, original_filename);
        let path = self.resolve(&name)?;
        tokio::fs::write(&path, contents).await?;
        tracing::info!(book_id = %book_id, file = %name, bytes = contents.len(), "Book file stored");
        Ok(name)
    }

    /// Open a stored file for streaming.
    pub async fn open(&self, stored_name: &str) -> Result<tokio::fs::File, BookError> {
        let path = self.resolve(stored_name)?;
        match tokio::fs::File::open(&path).await {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BookError::FileMissing(stored_name.to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a stored file. Already gone is not an error.
    pub async fn remove(&self, stored_name: &str) -> Result<(), BookError> {
        let path = self.resolve(stored_name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn resolve(&self, stored_name: &str) -> Result<PathBuf, BookError> {
        let valid = !stored_name.is_empty()
            && !stored_name.starts_with('.')
            && stored_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
        if !valid || stored_name.contains("..") {
            return Err(BookError::InvalidInput(format!(
                "invalid stored file name '{stored_name}'"
            )));
        }
        Ok(self.root.join(stored_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    const ID: &str = "0b5f3c1e-8f7a-4c1d-9a51-3d2f2b1c0e9a";

    #[test]
    fn stored_name_sanitizes_extension() {
        assert_eq!(FileStorage::stored_name(ID, Some("dune.PDF")), format!("{ID}.pdf"));
        assert_eq!(
            FileStorage::stored_name(ID, Some("../../etc/passwd")),
            ID.to_string()
        );
        assert_eq!(
            FileStorage::stored_name(ID, Some("x.e/p$ub")),
            ID.to_string(),
            "extension only comes from the final component"
        );
        assert_eq!(
            FileStorage::stored_name(ID, Some("book.tar.verylongextension")),
            format!("{ID}.verylongex")
        );
        assert_eq!(FileStorage::stored_name(ID, None), ID.to_string());
    }

    #[tokio::test]
    async fn save_open_remove() {
        let tmp = TempDir::new().unwrap();
        let storage = FileStorage::new(tmp.path().join("uploads")).unwrap();

        let name = storage.save(ID, Some("book.epub"), b"content").await.unwrap();
        assert_eq!(name, format!("{ID}.epub"));
        assert!(storage.root().join(&name).exists());

        let mut buf = String::new();
        storage
            .open(&name)
            .await
            .unwrap()
            .read_to_string(&mut buf)
            .await
            .unwrap();
        assert_eq!(buf, "content");

        storage.remove(&name).await.unwrap();
        assert!(!storage.root().join(&name).exists());
        // Second removal is a no-op.
        storage.remove(&name).await.unwrap();
    }

    #[tokio::test]
    async fn open_missing_file_is_file_missing() {
        let tmp = TempDir::new().unwrap();
        let storage = FileStorage::new(tmp.path()).unwrap();
        assert!(matches!(
            storage.open("nothing.pdf").await,
            Err(BookError::FileMissing(_))
        ));
    }

    #[tokio::test]
    async fn traversal_names_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let storage = FileStorage::new(tmp.path()).unwrap();
        for name in ["../secret", "a/b", "..", ".hidden", ""] {
            assert!(
                matches!(storage.open(name).await, Err(BookError::InvalidInput(_))),
                "{name:?}"
            );
        }
    }
}
