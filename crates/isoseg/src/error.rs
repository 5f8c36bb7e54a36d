//! Error types for catalog loading, extraction and shuffling.
//!
//! All errors use thiserror for consistent error handling across the codebase.

use std::path::PathBuf;
use thiserror::Error;

/// Failures invoking one of the external collaborators.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The tool binary could not be started
    #[error("Failed to run {tool} ({program}): {source}")]
    Spawn {
        /// Short tool name (`scan`, `wad`, `fip`)
        tool: &'static str,
        /// Program path that was invoked
        program: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The tool ran but exited unsuccessfully
    #[error("{tool} exited with {status}: {stderr}")]
    ExitStatus {
        /// Short tool name
        tool: &'static str,
        /// Exit status as reported by the OS
        status: std::process::ExitStatus,
        /// Captured diagnostic output
        stderr: String,
    },
}

/// Errors that make a whole catalog unusable.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The scanner could not produce output
    #[error("Segment scanner failed: {0}")]
    Scanner(#[from] ToolError),

    /// Scanner output was not valid UTF-8
    #[error("Scanner output is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    /// A line could not be parsed as a segment record
    #[error("Invalid segment record on line {line}: {source}")]
    InvalidRecord {
        /// One-based line number in the scanner output
        line: usize,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// A record parsed but lacks a field it needs
    #[error("Incomplete segment record on line {line}: {reason}")]
    IncompleteRecord {
        /// One-based line number in the scanner output
        line: usize,
        /// What is missing
        reason: String,
    },
}

/// Errors that abort an extraction run.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Loading the catalog failed
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// The output directory could not be created
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The source image could not be opened
    #[error("Failed to open image {path}: {source}")]
    OpenImage {
        /// Image path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors that abort a shuffle run.
#[derive(Debug, Error)]
pub enum ShuffleError {
    /// Loading the catalog failed
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// The image could not be opened
    #[error("Failed to open image {path}: {source}")]
    OpenImage {
        /// Image path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing a payload failed
    #[error("I/O error moving {len} bytes from {source_offset:#x} to {dest_offset:#x}: {source}")]
    Move {
        /// Offset the payload was read from
        source_offset: u64,
        /// Offset the payload was written to
        dest_offset: u64,
        /// Payload length
        len: u64,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Flushing the image after the last move failed
    #[error("Failed to flush image: {0}")]
    Flush(#[source] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required configuration value
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// A value is out of range
    #[error("Invalid {field}: {reason}")]
    InvalidValue {
        /// Option name
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_error_messages() {
        let err = CatalogError::IncompleteRecord {
            line: 3,
            reason: "missing size".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Incomplete segment record on line 3: missing size"
        );
    }

    #[test]
    fn test_shuffle_error_formats_offsets_as_hex() {
        let err = ShuffleError::Move {
            source_offset: 0x100,
            dest_offset: 0x2000,
            len: 16,
            source: std::io::Error::from(std::io::ErrorKind::UnexpectedEof),
        };
        let message = err.to_string();
        assert!(message.contains("0x100"));
        assert!(message.contains("0x2000"));
    }

    #[test]
    fn test_catalog_error_conversion() {
        let tool_err = ToolError::Spawn {
            tool: "scan",
            program: PathBuf::from("scan"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let err: ExtractError = CatalogError::from(tool_err).into();
        assert!(err.to_string().contains("Segment scanner failed"));
    }
}
