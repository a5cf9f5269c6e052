//! Book Snapshot Store
//!
//! One pretty-printed JSON file per book id. Writes go to a temp file in the
//! same directory and are renamed into place, so a crash mid-write never
//! leaves a truncated snapshot behind.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::types::{Book, BookProgress, BookStatus, ForgeError, Result};

/// Listing entry for a stored book
#[derive(Debug, Clone, Serialize)]
pub struct BookSummary {
    pub id: String,
    pub title: String,
    pub status: BookStatus,
    pub progress: BookProgress,
    pub updated_at: DateTime<Utc>,
}

pub struct BookStore {
    dir: PathBuf,
}

impl BookStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &str) -> Result<PathBuf> {
        validate_id(id)?;
        Ok(self.dir.join(format!("{}.json", id)))
    }

    /// Atomically replace the snapshot for `book.id`
    pub fn save(&self, book: &Book) -> Result<()> {
        let path = self.path_for(&book.id)?;
        let tmp = self.dir.join(format!(".{}.json.tmp", book.id));

        let content = serde_json::to_string_pretty(book)?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            ForgeError::Storage(format!("Failed to replace {}: {}", path.display(), e))
        })?;

        debug!(book = %book.id, path = %path.display(), "Saved snapshot");
        Ok(())
    }

    pub fn load(&self, id: &str) -> Result<Book> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Err(ForgeError::BookNotFound(id.to_string()));
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|e| ForgeError::Storage(format!("Corrupt snapshot {}: {}", path.display(), e)))
    }

    pub fn exists(&self, id: &str) -> bool {
        self.path_for(id).map(|p| p.exists()).unwrap_or(false)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Err(ForgeError::BookNotFound(id.to_string()));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    /// Stored books, most recently updated first. Unreadable files are skipped.
    pub fn list(&self) -> Result<Vec<BookSummary>> {
        let mut summaries = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_snapshot = path.extension().is_some_and(|ext| ext == "json")
                && !path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.'));
            if !is_snapshot {
                continue;
            }

            let book: Book = match fs::read_to_string(&path)
                .ok()
                .and_then(|c| serde_json::from_str(&c).ok())
            {
                Some(book) => book,
                None => {
                    debug!(path = %path.display(), "Skipping unreadable snapshot");
                    continue;
                }
            };
            summaries.push(BookSummary {
                progress: book.progress(),
                id: book.id,
                title: book.title,
                status: book.status,
                updated_at: book.updated_at,
            });
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}

/// Ids become file names, so only uuid-like characters are allowed
fn validate_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= 64
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ForgeError::InvalidInput(format!("invalid book id: {:?}", id)))
    }
}
