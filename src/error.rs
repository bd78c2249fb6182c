//! Error types for dirsort.
//!
//! Only [`ConfigError`] and [`OrganizeError`] ever reach the caller of
//! `organize`. [`MoveError`] describes why a single entry could not be placed;
//! it is reported through events and the run report, never propagated.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading a rule configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The configuration file exists but could not be read.
    #[error("IO error reading configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Invalid TOML or JSON syntax or structure.
    #[error("Invalid configuration {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// The file extension does not name a supported format.
    #[error("Unsupported configuration format: {} (expected .toml or .json)", .0.display())]
    UnsupportedFormat(PathBuf),

    /// One or more required sections are absent.
    #[error("Missing required configuration sections: {}", .0.join(", "))]
    MissingFields(Vec<String>),
}

/// Errors that abort a whole `organize` call.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The root path is missing or not a directory.
    #[error("Invalid root directory {}: {reason}", path.display())]
    InvalidRoot { path: PathBuf, reason: String },

    /// Failed to create one of the destination directories.
    #[error("Failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The root directory could not be listed.
    #[error("Failed to read directory {}: {source}", path.display())]
    Enumeration {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Why a single move did not complete.
#[derive(Debug, Error)]
pub enum MoveError {
    /// The OS refused access. Never retried.
    #[error("Permission denied: {source}")]
    PermissionDenied {
        #[source]
        source: io::Error,
    },

    /// Every generated alternative name was already taken.
    #[error("No free name after {attempts} collision attempts")]
    CollisionsExhausted { attempts: usize },

    /// A transient error persisted through every retry.
    #[error("Still failing after {retries} retries: {source}")]
    RetriesExhausted {
        retries: u32,
        #[source]
        source: io::Error,
    },

    /// The source disappeared before it could be moved.
    #[error("Source no longer exists")]
    SourceVanished,

    /// Any other, non-transient OS error.
    #[error("{source}")]
    Io {
        #[source]
        source: io::Error,
    },

    /// The source path has no final component to preserve.
    #[error("Path has no file name component")]
    NoFileName,
}

impl MoveError {
    /// Returns true when the move failed because the source was already gone.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::SourceVanished => true,
            Self::Io { source } | Self::RetriesExhausted { source, .. } => {
                source.kind() == io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}

/// Result type for organize operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_lists_every_section() {
        let err = ConfigError::MissingFields(vec!["dir_names".into(), "ext_to_dir".into()]);
        assert_eq!(
            err.to_string(),
            "Missing required configuration sections: dir_names, ext_to_dir"
        );
    }

    #[test]
    fn test_not_found_detection() {
        assert!(MoveError::SourceVanished.is_not_found());
        let gone = MoveError::Io {
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(gone.is_not_found());
        assert!(!MoveError::CollisionsExhausted { attempts: 3 }.is_not_found());
    }
}
