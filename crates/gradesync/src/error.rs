use std::path::PathBuf;
use thiserror::Error;

use crate::remote::RemoteError;
use crate::resolver::ResolveError;
use crate::secrets::SecretError;
use crate::tree::ValidationError;

/// Any error the library surfaces to a caller.
#[derive(Error, Debug)]
pub enum GradesyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Gradebook error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolveError),

    #[error("Credential error: {0}")]
    Secret(#[from] SecretError),
}

/// Problems with the declared gradebook file, from reading it to
/// validating its tree.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid grade tree: {}", join_errors(.0))]
    InvalidTree(Vec<ValidationError>),

    #[error("No config file found (looked in: {})", join_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },

    #[error("No password configured for '{username}' (set password, password_file or password_env)")]
    MissingCredentials { username: String },

    #[error("Refusing to overwrite existing file '{0}'")]
    AlreadyExists(PathBuf),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, GradesyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_tree_lists_every_error() {
        let err = ConfigError::InvalidTree(vec![
            ValidationError::EmptyParentName,
            ValidationError::GradePassAboveMax {
                grade_pass: 6.0,
                grade_max: 5.0,
            },
        ]);
        let message = err.to_string();
        assert!(message.starts_with("Invalid grade tree: "));
        assert_eq!(message.matches("; ").count(), 1);
    }

    #[test]
    fn test_not_found_lists_paths() {
        let err = ConfigError::NotFound {
            searched: vec![PathBuf::from("/a/datos_aules.json"), PathBuf::from("/b/datos_aules.json")],
        };
        assert!(err.to_string().contains("/a/datos_aules.json, /b/datos_aules.json"));
    }

    #[test]
    fn test_wraps_into_top_level() {
        let err: GradesyncError = ConfigError::Validation {
            message: "bad".into(),
        }
        .into();
        assert!(matches!(err, GradesyncError::Config(_)));
        assert!(err.to_string().contains("bad"));
    }
}
