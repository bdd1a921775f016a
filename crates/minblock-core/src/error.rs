//! Error types for minblock-core

use thiserror::Error;

/// Result type alias for minblock-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in minblock-core
#[derive(Error, Debug)]
pub enum Error {
    /// A comment looked like a build marker but could not be parsed
    #[error("malformed build marker at byte {offset}: {marker}")]
    MalformedMarker {
        /// Byte offset of the marker
        offset: usize,
        /// The offending text, truncated
        marker: String,
    },

    /// A start marker appeared while another block was still open
    #[error("build block at byte {offset} starts inside the block opened at byte {open}")]
    NestedBlock {
        /// Byte offset of the inner start marker
        offset: usize,
        /// Byte offset of the block that is still open
        open: usize,
    },

    /// An end marker appeared with no open block
    #[error("endbuild at byte {offset} has no matching build marker")]
    UnmatchedEnd {
        /// Byte offset of the end marker
        offset: usize,
    },

    /// The document ended while a block was still open
    #[error("build block at byte {offset} is never closed with endbuild")]
    UnterminatedBlock {
        /// Byte offset of the start marker
        offset: usize,
    },

    /// Block ranges cannot be used to slice the document
    #[error("invalid block range {start}..{end}: {message}")]
    InvalidRange {
        /// Range start
        start: usize,
        /// Range end
        end: usize,
        /// Description of the problem
        message: String,
    },

    /// Invalid asset reference pattern
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The pattern that failed
        pattern: String,
        /// Error message
        message: String,
    },

    /// Template compilation or rendering error
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Compiler backend failure
    #[error("compiler '{compiler}' failed: {message}")]
    Compiler {
        /// Name of the compiler
        compiler: String,
        /// Description of the failure
        message: String,
    },

    /// Configuration file could not be found
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched
        path: String,
    },

    /// Failed to parse YAML configuration
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Invalid configuration value
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        /// Description of what's invalid
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means the document cannot be sliced into blocks
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::MalformedMarker { .. }
                | Self::NestedBlock { .. }
                | Self::UnmatchedEnd { .. }
                | Self::UnterminatedBlock { .. }
                | Self::InvalidRange { .. }
        )
    }
}
