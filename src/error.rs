use thiserror::Error;

/// Failure of a single fetch. Carries the target URL, never the proxy URL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("rendering proxy requested but SCRAPERAPI_KEY is not set")]
    ProxyConfigMissing,
}

impl FetchError {
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout { url: url.to_string() }
        } else {
            // strip the request URL from the message, it may be the proxy URL
            FetchError::Network {
                url: url.to_string(),
                reason: err.without_url().to_string(),
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum ListingError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("unparseable listing from {url}: {reason}")]
    Parse { url: String, reason: String },
}
