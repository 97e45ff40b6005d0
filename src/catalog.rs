//! Catalog and ledger persistence inside the output directory.
//!
//! The catalog is the full scraped library, written as a JSON array to
//! `books.js` with replacement semantics: every sync overwrites the file.
//! The ledger (`downloaded.txt`) is an append-only list of downloaded ids,
//! one per line; readers treat it as a set, so duplicate lines are legal.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, instrument};

use crate::config::{CATALOG_FILENAME, LEDGER_FILENAME};

/// One library entry as scraped from the account page.
///
/// Identity key is `id`; records are immutable once created. Serialized
/// field names match the on-disk format the original tool wrote, so existing
/// `books.js` files keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Site-assigned numeric identifier.
    #[serde(rename = "nid")]
    pub id: String,
    /// Book title.
    pub title: String,
    /// Thumbnail image URL.
    #[serde(rename = "image")]
    pub image_url: String,
    /// Detail-page URL (site-relative); its first path segment is the
    /// category used for the download directory layout.
    #[serde(rename = "page")]
    pub page_url: String,
    /// Absolute URL of the PDF asset, empty when the site offers none.
    #[serde(rename = "pdf")]
    pub pdf_url: String,
    /// Absolute URL of the EPUB asset, empty when the site offers none.
    #[serde(rename = "epub")]
    pub epub_url: String,
    /// Absolute URL of the code archive.
    #[serde(rename = "code")]
    pub code_url: String,
}

/// Errors from catalog and ledger persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No catalog file exists in the directory; run a sync first.
    #[error("no catalog found at {path}")]
    NotFound {
        /// The path that was missing.
        path: PathBuf,
    },

    /// The catalog file exists but is not a valid JSON array of records.
    #[error("malformed catalog at {path}: {source}")]
    Parse {
        /// The file that failed to deserialize.
        path: PathBuf,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// File system failure (directory creation, read, write).
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Writes the catalog to `<dir>/books.js`, creating the directory if needed.
///
/// Replacement semantics: the previous catalog is overwritten, never merged.
/// A directory that already exists is not an error.
///
/// # Errors
///
/// Returns [`StoreError::Io`] when the directory cannot be created or the
/// file cannot be written.
#[instrument(skip(catalog))]
pub async fn save(catalog: &[BookRecord], dir: &Path) -> Result<(), StoreError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| StoreError::io(dir, e))?;

    let path = dir.join(CATALOG_FILENAME);
    // Serializing a Vec of string-only records cannot fail; treat a failure
    // as an IO-class defect rather than panicking.
    let body = serde_json::to_vec_pretty(catalog)
        .map_err(|e| StoreError::io(&path, std::io::Error::other(e)))?;
    tokio::fs::write(&path, body)
        .await
        .map_err(|e| StoreError::io(&path, e))?;

    debug!(path = %path.display(), records = catalog.len(), "catalog saved");
    Ok(())
}

/// Loads the catalog from `<dir>/books.js`.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] when the file is absent,
/// [`StoreError::Parse`] when it does not deserialize, and
/// [`StoreError::Io`] for any other read failure.
#[instrument]
pub async fn load(dir: &Path) -> Result<Vec<BookRecord>, StoreError> {
    let path = dir.join(CATALOG_FILENAME);
    let body = match tokio::fs::read(&path).await {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound { path });
        }
        Err(e) => return Err(StoreError::io(&path, e)),
    };

    let catalog: Vec<BookRecord> =
        serde_json::from_slice(&body).map_err(|source| StoreError::Parse {
            path: path.clone(),
            source,
        })?;
    debug!(path = %path.display(), records = catalog.len(), "catalog loaded");
    Ok(catalog)
}

/// Appends one id to the ledger at `<dir>/downloaded.txt`.
///
/// Appends are not deduplicated; readers collapse repeats.
///
/// # Errors
///
/// Returns [`StoreError::Io`] when the file cannot be opened or written.
pub async fn append_downloaded(id: &str, dir: &Path) -> Result<(), StoreError> {
    let path = dir.join(LEDGER_FILENAME);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .map_err(|e| StoreError::io(&path, e))?;
    file.write_all(format!("{id}\n").as_bytes())
        .await
        .map_err(|e| StoreError::io(&path, e))?;
    Ok(())
}

/// Reads the ledger as a set of ids.
///
/// A missing ledger is the valid "nothing downloaded yet" state and yields
/// an empty set. Blank lines are ignored; duplicate ids collapse.
///
/// # Errors
///
/// Returns [`StoreError::Io`] for read failures other than the file being
/// absent.
#[instrument]
pub async fn read_downloaded(dir: &Path) -> Result<HashSet<String>, StoreError> {
    let path = dir.join(LEDGER_FILENAME);
    let file = match File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(HashSet::new());
        }
        Err(e) => return Err(StoreError::io(&path, e)),
    };

    let mut ids = HashSet::new();
    let mut lines = BufReader::new(file).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| StoreError::io(&path, e))?
    {
        let id = line.trim();
        if !id.is_empty() {
            ids.insert(id.to_string());
        }
    }
    debug!(path = %path.display(), ids = ids.len(), "ledger read");
    Ok(ids)
}
