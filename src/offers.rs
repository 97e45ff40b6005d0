//! Free-ebook offer claiming.

use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{info, instrument};

use crate::config::SiteConfig;
use crate::session::{SessionClient, SessionError};

/// Errors from the offer-claim flow.
#[derive(Debug, Error)]
pub enum OfferError {
    /// The offer page has no claim link; there may be no active offer.
    #[error("no claim link matching '{selector}' on the offer page")]
    ClaimLinkNotFound {
        /// The selector that matched nothing.
        selector: String,
    },

    /// A configured CSS selector failed to compile.
    #[error("invalid CSS selector '{css}'")]
    Selector {
        /// The selector string that failed to parse.
        css: String,
    },

    /// Transport failure while talking to the site.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Claims the current free-ebook offer for the logged-in account.
///
/// Fetches the offer page, locates the claim anchor, and follows its href
/// through the session, which attaches the book to the account library.
///
/// # Errors
///
/// Returns [`OfferError::ClaimLinkNotFound`] when the page carries no claim
/// link and [`OfferError::Session`] on transport failures.
#[instrument(skip(session, config))]
pub async fn claim_free_ebook(
    session: &SessionClient,
    config: &SiteConfig,
) -> Result<(), OfferError> {
    let page = session.get_text(&config.offer_path).await?;
    let claim_href = find_claim_link(&page, &config.claim_selector)?;

    session.get_text(&claim_href).await?;
    info!(href = %claim_href, "free ebook claimed");
    Ok(())
}

/// Extracts the claim anchor's href from offer-page HTML.
///
/// # Errors
///
/// Returns [`OfferError::ClaimLinkNotFound`] when nothing matches and
/// [`OfferError::Selector`] when the configured selector is malformed.
pub fn find_claim_link(html: &str, claim_selector: &str) -> Result<String, OfferError> {
    let selector = Selector::parse(claim_selector).map_err(|_| OfferError::Selector {
        css: claim_selector.to_string(),
    })?;
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .next()
        .and_then(|anchor| anchor.value().attr("href"))
        .map(std::string::ToString::to_string)
        .ok_or_else(|| OfferError::ClaimLinkNotFound {
            selector: claim_selector.to_string(),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const OFFER_PAGE: &str = r#"
        <html><body>
            <div class="free-ebook">
                <a class="twelve-days-claim" href="/freelearning-claim/123/1">Claim</a>
            </div>
        </body></html>
    "#;

    #[test]
    fn find_claim_link_extracts_href() {
        let href = find_claim_link(OFFER_PAGE, ".free-ebook a.twelve-days-claim").unwrap();
        assert_eq!(href, "/freelearning-claim/123/1");
    }

    #[test]
    fn find_claim_link_missing_anchor_is_an_error() {
        let err =
            find_claim_link("<html></html>", ".free-ebook a.twelve-days-claim").unwrap_err();
        assert!(matches!(err, OfferError::ClaimLinkNotFound { .. }));
    }
}
