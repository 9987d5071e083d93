use thiserror::Error;

/// Rejections raised before any network call is made.
/// The `Display` text of every variant is the prompt shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("Please upload a resume and enter a job description.")]
    MissingInput,

    #[error("Please upload a PDF file.")]
    WrongFileType,

    #[error("Server is waking up. Please wait a few seconds and try again.")]
    ServerWaking,

    #[error("Server appears to be offline. Please check your connection and try again.")]
    ServerOffline,

    #[error("Still checking server status. Please try again in a moment.")]
    ServerChecking,

    #[error("An analysis is already in progress.")]
    AlreadyInFlight,
}

/// Failures of the analyze request itself.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("Rate limited by the analysis service")]
    RateLimited,

    #[error("Analysis service returned status {status}")]
    Server {
        status: u16,
        message: Option<String>,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AnalyzeError {
    /// The server-supplied `error` string, if the failure carried one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            AnalyzeError::Server { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}
