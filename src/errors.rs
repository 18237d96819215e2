//! Error types for cmdc.

use std::path::PathBuf;

use crate::interrupt::INTERRUPTED_EXIT_CODE;
use crate::output::OutputError;

/// Top-level error type for cmdc operations.
#[derive(Debug, thiserror::Error)]
pub enum CmdcError {
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("no files found matching the criteria in {0}")]
    NoFilesFound(PathBuf),

    #[error("invalid configuration for {field} ({value}): {reason}")]
    InvalidConfig {
        field: String,
        value: String,
        reason: String,
    },

    #[error("configuration file already exists: {0} (use --force to overwrite)")]
    ConfigExists(PathBuf),

    #[error("operation cancelled")]
    Interrupted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("output error: {0}")]
    Output(#[from] OutputError),
}

impl CmdcError {
    pub(crate) fn invalid_config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CmdcError::InvalidConfig {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Map an error to its exit code.
pub fn exit_code(error: &CmdcError) -> i32 {
    match error {
        CmdcError::PathNotFound(_) => 3,
        CmdcError::NotADirectory(_) => 3,
        CmdcError::NoFilesFound(_) => 5,
        CmdcError::InvalidConfig { .. } => 2,
        CmdcError::ConfigExists(_) => 1,
        CmdcError::Interrupted => INTERRUPTED_EXIT_CODE,
        CmdcError::Io(_) => 1,
        CmdcError::Output(_) => 1,
    }
}
