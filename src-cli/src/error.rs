//! CLI error types and exit codes
//!
//! - 0: every planned action applied
//! - 1: fatal error (config, login, I/O)
//! - 2: the run finished but something failed, was skipped or unresolved

use gradesync::{ConfigError, RemoteError, ResolutionFailure, SecretError};
use thiserror::Error;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Password unavailable: {0}")]
    Secret(#[from] SecretError),

    #[error("Login failed: {0}")]
    Login(RemoteError),

    #[error("Could not read the gradebook: {0}")]
    Remote(#[from] RemoteError),

    #[error("Cannot determine what to delete: {0}")]
    Scope(#[from] ResolutionFailure),

    #[error("Input error: {0}")]
    Input(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Run incomplete: {0}")]
    Incomplete(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Incomplete(_) => 2,
            CliError::Cancelled => 0,
            _ => 1,
        }
    }

    /// Print the error to stderr. A cancelled prompt prints nothing.
    pub fn print(&self) {
        match self {
            CliError::Cancelled => eprintln!("Aborted."),
            CliError::Config(ConfigError::InvalidTree(errors)) => {
                eprintln!("Error: the declared gradebook is invalid:");
                for error in errors {
                    eprintln!("  - {}", error);
                }
            }
            other => eprintln!("Error: {}", other),
        }
    }
}

impl From<dialoguer::Error> for CliError {
    fn from(err: dialoguer::Error) -> Self {
        CliError::Input(err.to_string())
    }
}
