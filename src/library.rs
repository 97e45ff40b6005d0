//! Library scraping: the account page becomes a catalog of book records.
//!
//! Fetching and parsing are separated so the parser can be exercised from
//! fixture HTML without a server. Every sync produces the full catalog;
//! there is no incremental merge.

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

use crate::catalog::BookRecord;
use crate::config::SiteConfig;
use crate::session::{SessionClient, SessionError};

/// Errors from the library scraping flow.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// A configured CSS selector failed to compile.
    #[error("invalid CSS selector '{css}'")]
    Selector {
        /// The selector string that failed to parse.
        css: String,
    },

    /// Transport failure while fetching the account page.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl LibraryError {
    fn selector(css: impl Into<String>) -> Self {
        Self::Selector { css: css.into() }
    }
}

/// Fetches the account library page and scrapes it into a catalog.
///
/// # Errors
///
/// Returns [`LibraryError::Session`] when the page cannot be fetched and
/// [`LibraryError::Selector`] when a configured selector is malformed.
/// Individual entries that lack an id are skipped, never an error.
#[instrument(skip(session, config))]
pub async fn fetch_library(
    session: &SessionClient,
    config: &SiteConfig,
) -> Result<Vec<BookRecord>, LibraryError> {
    let html = session.get_text(&config.library_path).await?;
    let catalog = parse_library(&html, config)?;
    info!(books = catalog.len(), "library scraped");
    Ok(catalog)
}

/// Parses account-page HTML into book records.
///
/// Entries without a non-empty id attribute are skipped silently. Asset URLs
/// are resolved against the base host; a missing format button leaves the
/// corresponding URL empty rather than failing the whole entry.
///
/// # Errors
///
/// Returns [`LibraryError::Selector`] when a configured selector does not
/// compile.
pub fn parse_library(html: &str, config: &SiteConfig) -> Result<Vec<BookRecord>, LibraryError> {
    let entry_sel = compile(&config.entry_selector)?;
    let link_sel = compile(&config.thumbnail_link_selector)?;
    let image_sel = compile(&config.thumbnail_image_selector)?;
    let pdf_sel = compile(&config.format_button_selector("pdf"))?;
    let epub_sel = compile(&config.format_button_selector("epub"))?;

    let document = Html::parse_document(html);
    let mut catalog = Vec::new();

    for entry in document.select(&entry_sel) {
        let Some(id) = entry.value().attr("nid").filter(|nid| !nid.is_empty()) else {
            debug!("skipping library entry without id");
            continue;
        };

        let image = entry.select(&image_sel).next();
        let title = image
            .and_then(|img| img.value().attr("title"))
            .unwrap_or("")
            .to_string();
        let image_url = image
            .and_then(|img| img.value().attr("src"))
            .unwrap_or("")
            .to_string();
        let page_url = entry
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .unwrap_or("")
            .to_string();

        let record = BookRecord {
            id: id.to_string(),
            title,
            image_url,
            page_url: page_url.clone(),
            pdf_url: format_link(&entry, &pdf_sel, &config.base_url),
            epub_url: format_link(&entry, &epub_sel, &config.base_url),
            code_url: config.code_url(id).map(String::from).unwrap_or_default(),
        };

        info!(id = %record.id, title = %record.title, page = %page_url, "library entry");
        catalog.push(record);
    }

    Ok(catalog)
}

/// Resolves the parent anchor of a format button into an absolute URL.
///
/// The site renders each format as a button nested inside the download
/// anchor, so the href lives on the button's parent element.
fn format_link(entry: &ElementRef<'_>, button_sel: &Selector, base: &Url) -> String {
    entry
        .select(button_sel)
        .next()
        .and_then(|button| button.parent())
        .and_then(ElementRef::wrap)
        .and_then(|anchor| anchor.value().attr("href"))
        .and_then(|href| base.join(href).ok())
        .map(String::from)
        .unwrap_or_default()
}

fn compile(css: &str) -> Result<Selector, LibraryError> {
    Selector::parse(css).map_err(|_| LibraryError::selector(css))
}
