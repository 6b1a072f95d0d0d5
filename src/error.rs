use thiserror::Error;

/// Classified failure from a source adapter.
///
/// Every variant is scoped to a single (source, instrument) pair and is
/// non-fatal to an ingestion run: the engine logs it and moves on to the
/// next pair. `Unsupported` and `Authentication` are expected in normal
/// operation (not every source offers every instrument, not every source has
/// keys configured) and log at info; the transient variants log at warn and
/// rely on the next scheduled run; `Source` is the catch-all and logs at
/// error.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("unsupported instrument or interval: {0}")]
    Unsupported(String),

    #[error("authentication rejected: {0}")]
    Authentication(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("source error: {0}")]
    Source(String),
}

impl FetchError {
    /// Expected skips (info-level): the pair simply isn't fetchable from
    /// this source as configured.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::Unsupported(_) | Self::Authentication(_))
    }

    /// Transient source-side failures (warn-level): the next scheduled run
    /// retries naturally, nothing is retried within a run.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Timeout(_) | Self::Unavailable(_)
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Source(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Source(format!("malformed payload: {}", err))
    }
}
