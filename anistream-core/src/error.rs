use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Upstream fetch failed: {0}")]
    UpstreamFetch(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::UpstreamFetch(format!("timed out: {err}"))
        } else if err.is_status() {
            let status = err
                .status()
                .map_or_else(|| "unknown".to_string(), |s| s.to_string());
            Self::UpstreamFetch(format!("upstream returned {status}"))
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::UpstreamFetch(err.to_string())
        }
    }
}

impl Error {
    /// Whether this failure should halt a quota-limited extraction queue.
    #[must_use]
    pub const fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
