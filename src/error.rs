use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("twitter api returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unable to authenticate: {0}")]
    Auth(String),

    #[error("unable to send request: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unable to parse twitter response: {0}")]
    Parse(String),

    #[error("invalid screen name: {0:?}")]
    InvalidScreenName(String),
}

impl AnalyzerError {
    /// Errors raised by the remote API itself rather than by local setup.
    pub fn is_api_error(&self) -> bool {
        matches!(self, Self::Api { .. } | Self::Auth(_) | Self::Network(_))
    }
}
