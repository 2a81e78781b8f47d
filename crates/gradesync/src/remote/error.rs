//! Errors talking to the remote gradebook.

use thiserror::Error;

/// Failure of one gradebook request.
///
/// [`RemoteError::is_transport`] separates failures that warrant a new
/// session from those that only fail the action at hand.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The gradebook answered but refused or did not apply the request.
    #[error("Remote operation failed: {0}")]
    Operation(String),

    #[error("Transport failure: {0}")]
    Transport(#[source] reqwest::Error),

    /// A login form was served instead of the requested page.
    #[error("Session expired (login page returned for {0})")]
    SessionExpired(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Unexpected response: {0}")]
    Parse(String),

    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Transport(err)
    }
}

impl RemoteError {
    /// Returns true for network and session level failures, the ones a fresh
    /// session might cure.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RemoteError::Transport(_) | RemoteError::SessionExpired(_)
        )
    }
}

/// Result type for gradebook requests.
pub type Result<T> = std::result::Result<T, RemoteError>;
