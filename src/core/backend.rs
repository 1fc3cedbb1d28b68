use std::{fmt, str::FromStr};

use thiserror::Error;
use url::Url;

use crate::config::BackendsConfig;

/// Errors related to backend origins
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BackendError {
    /// Error when URL is invalid
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// A type-safe representation of a backend origin (scheme, host and optional port).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendUrl {
    /// The origin without a trailing slash
    url: String,
    /// Whether the URL is secure (HTTPS)
    is_secure: bool,
}

impl BackendUrl {
    /// Creates a new BackendUrl if the provided string is a valid http(s) origin
    ///
    /// # Arguments
    /// * `url` - The URL string to validate and wrap
    ///
    /// # Returns
    /// A result containing the BackendUrl or an error
    pub fn new(url: &str) -> BackendResult<Self> {
        let trimmed = url.trim().trim_end_matches('/');
        let is_secure = trimmed.starts_with("https://");
        let is_http = trimmed.starts_with("http://");

        if !is_secure && !is_http {
            return Err(BackendError::InvalidUrl(format!(
                "Backend URL must start with http:// or https://, got: {url}"
            )));
        }

        let parsed = Url::parse(trimmed)
            .map_err(|e| BackendError::InvalidUrl(format!("{url}: {e}")))?;
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(BackendError::InvalidUrl(format!(
                "Backend URL has no host: {url}"
            )));
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(BackendError::InvalidUrl(format!(
                "Backend URL must not carry a query or fragment: {url}"
            )));
        }

        Ok(BackendUrl {
            url: trimmed.to_string(),
            is_secure,
        })
    }

    /// Get the underlying URL as a string reference
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// Check if the URL is using HTTPS
    pub fn is_secure(&self) -> bool {
        self.is_secure
    }
}

impl FromStr for BackendUrl {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendUrl::new(s)
    }
}

impl fmt::Display for BackendUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Ordered, immutable list of origins the forwarder tries for every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendCandidates {
    origins: Vec<BackendUrl>,
}

impl BackendCandidates {
    pub fn new(origins: Vec<BackendUrl>) -> Self {
        Self { origins }
    }

    /// Build the candidate list from configuration, keeping priority order and
    /// dropping blank slots.
    pub fn from_config(backends: &BackendsConfig) -> BackendResult<Self> {
        let origins = backends
            .ordered()
            .map(|(_, origin)| BackendUrl::new(origin))
            .collect::<BackendResult<Vec<_>>>()?;
        Ok(Self { origins })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BackendUrl> {
        self.origins.iter()
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

impl<'a> IntoIterator for &'a BackendCandidates {
    type Item = &'a BackendUrl;
    type IntoIter = std::slice::Iter<'a, BackendUrl>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
