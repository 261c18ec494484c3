//! Error types for notebook adaptation

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for notebook parsing and adaptation
#[derive(Error, Debug)]
pub enum NotebookError {
    /// Input directory does not exist or is not a directory
    #[error("Input directory not found: {}", path.display())]
    InputNotFound {
        /// Directory that was requested
        path: PathBuf,
    },

    /// Notebook file could not be read
    #[error("Failed to read notebook {}: {source}", path.display())]
    ReadError {
        /// Offending file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid notebook JSON
    #[error("Failed to parse notebook {}: {source}", path.display())]
    ParseError {
        /// Offending file
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Notebook version not supported
    #[error("Unsupported notebook version {major}.{minor} in {}", path.display())]
    UnsupportedVersion {
        /// Offending file
        path: PathBuf,
        /// Major version number
        major: u32,
        /// Minor version number
        minor: u32,
    },

    /// Output file or directory could not be written
    #[error("Failed to write notebook {}: {source}", path.display())]
    WriteError {
        /// Destination that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed below the input root
    #[error("Failed to walk {}: {source}", path.display())]
    WalkError {
        /// Root being walked
        path: PathBuf,
        /// Underlying walkdir error
        #[source]
        source: walkdir::Error,
    },

    /// Rewrite options rejected before any file was touched
    #[error("Invalid option: {0}")]
    InvalidOption(String),
}

impl NotebookError {
    /// Path of the file or directory the error refers to, if any
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::InputNotFound { path }
            | Self::ReadError { path, .. }
            | Self::ParseError { path, .. }
            | Self::UnsupportedVersion { path, .. }
            | Self::WriteError { path, .. }
            | Self::WalkError { path, .. } => Some(path),
            Self::InvalidOption(_) => None,
        }
    }
}

/// Result type alias for notebook operations
pub type Result<T> = std::result::Result<T, NotebookError>;
