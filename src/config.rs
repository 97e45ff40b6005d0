//! Site configuration: base host, page paths, CSS selectors, and limits.
//!
//! Everything about the publisher's site that the workflow depends on lives
//! here as data rather than as literals at the call sites. Defaults match
//! packtpub.com; integration tests swap in a mock server via
//! [`SiteConfig::with_base_url`].

use url::Url;

/// Default maximum number of downloads per invocation.
///
/// Caps how many books one run selects; the downloader additionally bounds
/// how many of them stream at once.
pub const DEFAULT_BATCH_CAP: usize = 5;

/// Filename of the persisted catalog inside the output directory.
///
/// Kept as `books.js` (a plain JSON array) for compatibility with catalogs
/// written by earlier versions of the tool.
pub const CATALOG_FILENAME: &str = "books.js";

/// Filename of the append-only ledger of downloaded ids.
pub const LEDGER_FILENAME: &str = "downloaded.txt";

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Site-specific configuration for the session, scraper, and offer flows.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Base host every relative path is resolved against.
    pub base_url: Url,
    /// CSS selector locating the login form on the landing page.
    pub login_form_selector: String,
    /// Form field carrying the account email.
    pub email_field: String,
    /// Form field carrying the account password.
    pub password_field: String,
    /// Form field carrying the submit operation.
    pub op_field: String,
    /// Value submitted in the operation field.
    pub op_value: String,
    /// Path of the account library page.
    pub library_path: String,
    /// CSS selector matching one library entry element.
    pub entry_selector: String,
    /// CSS selector (within an entry) for the detail-page anchor.
    pub thumbnail_link_selector: String,
    /// CSS selector (within an entry) for the thumbnail image.
    pub thumbnail_image_selector: String,
    /// Path template for the code archive, `{nid}` replaced by the book id.
    pub code_path_template: String,
    /// Path of the free-ebook offer page.
    pub offer_path: String,
    /// CSS selector for the claim anchor on the offer page.
    pub claim_selector: String,
    /// Maximum number of downloads per invocation.
    pub batch_cap: usize,
}

impl SiteConfig {
    /// Builds a config with the default selectors but a different base host.
    #[must_use]
    pub fn with_base_url(base_url: Url) -> Self {
        Self {
            base_url,
            ..Self::default()
        }
    }

    /// CSS selector (within an entry) for the action button of a format.
    #[must_use]
    pub fn format_button_selector(&self, format: &str) -> String {
        format!(".fake-button[format=\"{format}\"]")
    }

    /// Absolute URL of the code archive for a book id.
    ///
    /// # Errors
    ///
    /// Returns the `url` crate's parse error if the templated path does not
    /// join cleanly against the base host.
    pub fn code_url(&self, id: &str) -> Result<Url, url::ParseError> {
        self.base_url
            .join(&self.code_path_template.replace("{nid}", id))
    }
}

impl Default for SiteConfig {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://www.packtpub.com")
                .expect("static base URL must parse"),
            login_form_selector: "#packt-user-login-form".to_string(),
            email_field: "email".to_string(),
            password_field: "password".to_string(),
            op_field: "op".to_string(),
            op_value: "Login".to_string(),
            library_path: "/account/my-ebooks".to_string(),
            entry_selector: "#product-account-list .product-line".to_string(),
            thumbnail_link_selector: ".product-thumbnail a".to_string(),
            thumbnail_image_selector: ".product-thumbnail img.imagecache-thumbview".to_string(),
            code_path_template: "/code_download/{nid}".to_string(),
            offer_path: "/packt/offers/free-learning".to_string(),
            claim_selector: ".free-ebook a.twelve-days-claim".to_string(),
            batch_cap: DEFAULT_BATCH_CAP,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_at_packtpub() {
        let config = SiteConfig::default();
        assert_eq!(config.base_url.as_str(), "https://www.packtpub.com/");
        assert_eq!(config.batch_cap, DEFAULT_BATCH_CAP);
    }

    #[test]
    fn with_base_url_keeps_selectors() {
        let base = Url::parse("http://127.0.0.1:9999").unwrap();
        let config = SiteConfig::with_base_url(base.clone());
        assert_eq!(config.base_url, base);
        assert_eq!(
            config.entry_selector,
            SiteConfig::default().entry_selector
        );
    }

    #[test]
    fn format_button_selector_substitutes_format() {
        let config = SiteConfig::default();
        assert_eq!(
            config.format_button_selector("pdf"),
            ".fake-button[format=\"pdf\"]"
        );
        assert_eq!(
            config.format_button_selector("epub"),
            ".fake-button[format=\"epub\"]"
        );
    }

    #[test]
    fn code_url_templates_the_id() {
        let config = SiteConfig::default();
        let url = config.code_url("12345").unwrap();
        assert_eq!(url.as_str(), "https://www.packtpub.com/code_download/12345");
    }
}
