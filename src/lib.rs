//! Packt library sync and download workflow.
//!
//! This library drives the publisher-site workflow end to end: session
//! establishment, login, scraping the account library into a catalog,
//! persisting that catalog alongside a ledger of downloaded ids, selecting
//! what still needs downloading, and streaming the PDF assets to disk.
//!
//! # Architecture
//!
//! - [`session`] - Cookie-bearing HTTP session against the base host
//! - [`auth`] - Login form submission with redirect-based success detection
//! - [`library`] - Account-page scraping into a catalog of book records
//! - [`catalog`] - Catalog file and download-ledger persistence
//! - [`select`] - Download-mode filtering with the batch cap
//! - [`download`] - Concurrent asset downloads with per-task outcomes
//! - [`offers`] - Free-ebook offer claiming
//! - [`config`] - Site paths, selectors, and limits as data

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod catalog;
pub mod config;
pub mod download;
pub mod library;
pub mod offers;
pub mod select;
pub mod session;

// Re-export commonly used types
pub use auth::{AuthError, login};
pub use catalog::{BookRecord, StoreError};
pub use config::{DEFAULT_BATCH_CAP, SiteConfig};
pub use download::{BatchReport, DownloadError, DownloadTask, download_all};
pub use library::{LibraryError, fetch_library, parse_library};
pub use offers::{OfferError, claim_free_ebook};
pub use select::{DownloadMode, select};
pub use session::{SessionClient, SessionError};
