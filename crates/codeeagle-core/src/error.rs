//! Error taxonomy shared by every component

use thiserror::Error;

/// One variant per error kind. Per-file parse failures are collected in
/// sync stats and never abort a sync; `Cancelled` is an outcome, not a
/// failure, and unwinds cleanly.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("storage: {0}")]
    Storage(String),

    #[error("external: {0}")]
    External(String),

    #[error("migration: {0}")]
    Migration(String),

    #[error("cancelled")]
    Cancelled,
}

impl GraphError {
    pub fn not_found(what: impl Into<String>) -> Self {
        GraphError::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        GraphError::Validation(message.into())
    }

    pub fn parse(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        GraphError::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        GraphError::Storage(err.to_string())
    }

    pub fn external(err: impl std::fmt::Display) -> Self {
        GraphError::External(err.to_string())
    }

    pub fn migration(message: impl Into<String>) -> Self {
        GraphError::Migration(message.into())
    }

    /// Bad input rather than an internal failure (exit code 1 vs 2).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            GraphError::NotFound(_) | GraphError::AlreadyExists(_) | GraphError::Validation(_)
        )
    }
}

impl From<std::io::Error> for GraphError {
    fn from(err: std::io::Error) -> Self {
        GraphError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
