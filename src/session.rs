//! Cookie-bearing HTTP session against the publisher's host.
//!
//! The session owns a shared cookie jar and two `reqwest` clients built on
//! top of it: one that follows redirects (page fetches, asset downloads) and
//! one that does not (the login POST, where the redirect itself is the
//! success signal). Relative paths are resolved against the configured base
//! host before every request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder, Response};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS, SiteConfig};

/// Errors from session-level HTTP requests.
///
/// There is no retry at this layer; every failure propagates to the caller.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The path could not be resolved into a valid URL.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL or path string.
        url: String,
    },
}

impl SessionError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}

/// Authenticated HTTP session with a shared cookie jar.
///
/// Designed to be created once per run and cloned into download tasks;
/// clones share the underlying connection pool and cookie jar.
#[derive(Debug, Clone)]
pub struct SessionClient {
    base_url: Url,
    /// Follows redirects; used for page fetches and downloads.
    client: Client,
    /// Never follows redirects; used for the login POST.
    no_redirect_client: Client,
}

impl SessionClient {
    /// Creates a session for the configured base host.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builders fail with the static configuration.
    /// This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(config: &SiteConfig) -> Self {
        let jar = Arc::new(Jar::default());
        let client = builder_with_jar(&jar)
            .build()
            .expect("failed to build HTTP client with static configuration");
        let no_redirect_client = builder_with_jar(&jar)
            .redirect(Policy::none())
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self {
            base_url: config.base_url.clone(),
            client,
            no_redirect_client,
        }
    }

    /// Resolves a path or absolute URL against the base host.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidUrl`] if the value joins to nothing
    /// parseable.
    pub fn resolve(&self, path: &str) -> Result<Url, SessionError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            Url::parse(path).map_err(|_| SessionError::invalid_url(path))
        } else {
            self.base_url
                .join(path)
                .map_err(|_| SessionError::invalid_url(path))
        }
    }

    /// Fetches a page and returns its body text.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] on transport failure or a non-2xx status.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_text(&self, path: &str) -> Result<String, SessionError> {
        let url = self.resolve(path)?;
        debug!(%url, "GET page");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SessionError::from_reqwest(url.as_str(), e))?;
        let response = check_status(response, &url)?;
        response
            .text()
            .await
            .map_err(|e| SessionError::from_reqwest(url.as_str(), e))
    }

    /// Fetches a URL and returns the raw response for body streaming.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] on transport failure or a non-2xx status.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_response(&self, path: &str) -> Result<Response, SessionError> {
        let url = self.resolve(path)?;
        debug!(%url, "GET asset");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SessionError::from_reqwest(url.as_str(), e))?;
        check_status(response, &url)
    }

    /// Submits a form POST without following redirects.
    ///
    /// The response is returned as-is (redirect statuses included) so the
    /// caller can inspect the status and `Location` header.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] on transport failure. Status codes are NOT
    /// checked here.
    #[instrument(level = "debug", skip(self, form))]
    pub async fn post_form_no_redirect(
        &self,
        path: &str,
        form: &HashMap<String, String>,
    ) -> Result<Response, SessionError> {
        let url = self.resolve(path)?;
        debug!(%url, fields = form.len(), "POST form");
        self.no_redirect_client
            .post(url.clone())
            .form(form)
            .send()
            .await
            .map_err(|e| SessionError::from_reqwest(url.as_str(), e))
    }

    /// Returns the base host this session resolves against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

fn builder_with_jar(jar: &Arc<Jar>) -> ClientBuilder {
    Client::builder()
        .cookie_provider(Arc::clone(jar))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .read_timeout(Duration::from_secs(READ_TIMEOUT_SECS))
        .gzip(true)
}

fn check_status(response: Response, url: &Url) -> Result<Response, SessionError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(SessionError::http_status(url.as_str(), status.as_u16()))
    }
}
