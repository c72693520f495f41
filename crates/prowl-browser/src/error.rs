use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("script evaluation failed: {0}")]
    ScriptError(String),

    #[error("rendering session closed: {0}")]
    SessionClosed(String),
}

impl BrowserError {
    /// Errors after which the rendering session cannot serve further navigations.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionClosed(_) | Self::ChromiumError(_))
    }

    /// Failures worth retrying. A 4xx answer is final, except request
    /// timeout and rate limiting.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpStatus { status, .. } => {
                !(400..500).contains(status) || matches!(status, 408 | 429)
            }
            other => !other.is_fatal(),
        }
    }
}
