//! Concurrent PDF downloads with per-task outcome reporting.
//!
//! Each selected book becomes a [`DownloadTask`] targeting
//! `<output>/<category>/<id>-<name>.pdf`, where the category is the first
//! path segment of the book's detail page. Tasks run concurrently under a
//! semaphore so a large batch never opens one stream per book. Unlike the
//! upstream tool, a failed task is never swallowed: every outcome lands in
//! the [`BatchReport`] returned to the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::future::join_all;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::catalog::{self, BookRecord, StoreError};
use crate::session::{SessionClient, SessionError};

/// Fallback category when a detail-page path has no usable segments.
const FALLBACK_CATEGORY: &str = "uncategorized";

/// Maximum number of in-flight streams, regardless of batch size.
pub const MAX_IN_FLIGHT: usize = 4;

/// Errors from a single download task.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The scraped record carries no PDF URL for this book.
    #[error("no PDF asset available for book {id}")]
    MissingAsset {
        /// The book id without an asset.
        id: String,
    },

    /// Transport failure while fetching the asset.
    #[error(transparent)]
    Transport(#[from] SessionError),

    /// File system error (directory creation, file create, write).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The download finished but the ledger append failed.
    #[error("ledger update failed: {0}")]
    Ledger(#[from] StoreError),

    /// The concurrency limiter was closed before the task could start.
    #[error("download limiter closed unexpectedly")]
    LimiterClosed,
}

impl DownloadError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// One unit of download work derived from a book record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// The book id, appended to the ledger on completion.
    pub id: String,
    /// Absolute URL of the PDF asset.
    pub source_url: String,
    /// Destination file within the per-category directory.
    pub target_path: PathBuf,
}

/// Outcome of a download batch, one entry per task.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Ids whose download completed and whose ledger append succeeded.
    pub completed: Vec<String>,
    /// Ids that failed, with the error that stopped them.
    pub failed: Vec<(String, DownloadError)>,
}

impl BatchReport {
    /// Total number of tasks in the batch.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len()
    }

    /// True when every task in the batch completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Builds the download task for one book.
///
/// # Errors
///
/// Returns [`DownloadError::MissingAsset`] when the record has no PDF URL.
pub fn build_task(book: &BookRecord, output_dir: &Path) -> Result<DownloadTask, DownloadError> {
    if book.pdf_url.is_empty() {
        return Err(DownloadError::MissingAsset {
            id: book.id.clone(),
        });
    }
    let (category, name) = split_page_path(&book.page_url, &book.id);
    let target_path = output_dir
        .join(category)
        .join(format!("{}-{}.pdf", book.id, name));
    Ok(DownloadTask {
        id: book.id.clone(),
        source_url: book.pdf_url.clone(),
        target_path,
    })
}

/// Derives (category, name) from a detail-page path such as
/// `/web-development/learning-node`: category is the first segment, name the
/// last. Absolute URLs are reduced to their path first. Both parts are
/// sanitized for use as file names.
fn split_page_path(page_url: &str, id: &str) -> (String, String) {
    let path = Url::parse(page_url)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| page_url.to_string());
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let category = segments
        .first()
        .map_or(FALLBACK_CATEGORY.to_string(), |s| sanitize_segment(s));
    let name = segments
        .last()
        .map_or_else(|| id.to_string(), |s| sanitize_segment(s));
    (category, name)
}

/// Replaces path separators and characters unsafe in file names.
fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim_matches(['-', ' ', '.']);
    if trimmed.is_empty() {
        FALLBACK_CATEGORY.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Downloads every selected book concurrently and reports each outcome.
///
/// For each book: builds the task, creates the per-category directory,
/// streams the PDF to disk, and appends the id to the ledger in
/// `output_dir` once the stream completes. At most [`MAX_IN_FLIGHT`] tasks
/// hold a connection at a time; the rest wait on the semaphore. Failures
/// are collected into the report instead of aborting siblings; a failed
/// stream leaves no partial file behind.
#[instrument(skip(session, books), fields(count = books.len()))]
pub async fn download_all(
    session: &SessionClient,
    books: &[&BookRecord],
    output_dir: &Path,
) -> BatchReport {
    let limiter = Arc::new(Semaphore::new(MAX_IN_FLIGHT));
    let runs = books.iter().map(|book| {
        let limiter = Arc::clone(&limiter);
        async move {
            let id = book.id.clone();
            // Permit is held for the whole task and released on drop.
            let outcome = match limiter.acquire().await {
                Ok(_permit) => download_one(session, book, output_dir).await,
                Err(_) => Err(DownloadError::LimiterClosed),
            };
            (id, outcome)
        }
    });

    let mut report = BatchReport::default();
    for (id, outcome) in join_all(runs).await {
        match outcome {
            Ok(path) => {
                info!(id = %id, path = %path.display(), "download complete");
                report.completed.push(id);
            }
            Err(error) => {
                warn!(id = %id, error = %error, "download failed");
                report.failed.push((id, error));
            }
        }
    }
    report
}

/// Downloads a single book's PDF and records it in the ledger.
async fn download_one(
    session: &SessionClient,
    book: &BookRecord,
    output_dir: &Path,
) -> Result<PathBuf, DownloadError> {
    let task = build_task(book, output_dir)?;

    // Parent is always output_dir/<category>; create_dir_all tolerates
    // the directory already existing.
    if let Some(parent) = task.target_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DownloadError::io(parent, e))?;
    }

    let response = session.get_response(&task.source_url).await?;
    stream_to_file(response, &task.target_path).await?;

    catalog::append_downloaded(&task.id, output_dir).await?;
    Ok(task.target_path)
}

/// Streams a response body to the target file, removing the partial file on
/// failure.
async fn stream_to_file(response: reqwest::Response, path: &Path) -> Result<(), DownloadError> {
    let url = response.url().to_string();
    let mut file = File::create(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;

    let mut stream = response.bytes_stream();
    let result = async {
        let mut bytes_written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| DownloadError::Transport(SessionError::from_reqwest(&url, e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(path, e))?;
            bytes_written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| DownloadError::io(path, e))?;
        Ok::<u64, DownloadError>(bytes_written)
    }
    .await;

    match result {
        Ok(bytes) => {
            debug!(path = %path.display(), bytes, "asset written");
            Ok(())
        }
        Err(error) => {
            debug!(path = %path.display(), "cleaning up partial file after error");
            let _ = tokio::fs::remove_file(path).await;
            Err(error)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(id: &str, page: &str, pdf: &str) -> BookRecord {
        BookRecord {
            id: id.to_string(),
            title: format!("Book {id}"),
            image_url: String::new(),
            page_url: page.to_string(),
            pdf_url: pdf.to_string(),
            epub_url: String::new(),
            code_url: String::new(),
        }
    }

    #[test]
    fn build_task_places_file_under_category_directory() {
        let book = record(
            "101",
            "/web-development/learning-node",
            "https://www.packtpub.com/ebook_download/101/pdf",
        );
        let task = build_task(&book, Path::new("/out")).unwrap();
        assert_eq!(
            task.target_path,
            Path::new("/out/web-development/101-learning-node.pdf")
        );
        assert_eq!(task.source_url, book.pdf_url);
    }

    #[test]
    fn build_task_handles_absolute_page_urls() {
        let book = record(
            "7",
            "https://www.packtpub.com/networking/wireshark-essentials",
            "https://www.packtpub.com/ebook_download/7/pdf",
        );
        let task = build_task(&book, Path::new("/out")).unwrap();
        assert_eq!(
            task.target_path,
            Path::new("/out/networking/7-wireshark-essentials.pdf")
        );
    }

    #[test]
    fn build_task_falls_back_when_page_path_is_unusable() {
        let book = record("9", "", "https://www.packtpub.com/ebook_download/9/pdf");
        let task = build_task(&book, Path::new("/out")).unwrap();
        assert_eq!(task.target_path, Path::new("/out/uncategorized/9-9.pdf"));
    }

    #[test]
    fn build_task_without_pdf_url_is_missing_asset() {
        let book = record("5", "/cat/name", "");
        let err = build_task(&book, Path::new("/out")).unwrap_err();
        assert!(matches!(err, DownloadError::MissingAsset { .. }));
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn sanitize_segment_strips_unsafe_characters() {
        assert_eq!(sanitize_segment("web:dev*?"), "web-dev");
        assert_eq!(sanitize_segment("plain-name"), "plain-name");
        assert_eq!(sanitize_segment("///"), "uncategorized");
    }

    #[test]
    fn batch_report_tracks_totals() {
        let mut report = BatchReport::default();
        assert!(report.is_complete());

        report.completed.push("1".to_string());
        report.failed.push((
            "2".to_string(),
            DownloadError::MissingAsset { id: "2".to_string() },
        ));
        assert_eq!(report.total(), 2);
        assert!(!report.is_complete());
    }
}
