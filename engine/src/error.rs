//! Error types for the archive engine.
//!
//! The primary error type is `EngineError`. Every fallible operation in the
//! engine returns it, and the two places that clean up after a failure (the
//! atomic archive rewrite and the trim pipeline) hand it back unchanged.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use zip::result::ZipError;

/// Errors raised by archive rewrites, conversions and the trim pipeline.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Failed to read from a file or directory
    #[error("Failed to read: {}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write, rename or change permissions of a file
    #[error("Failed to write: {}", path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to enumerate a directory
    #[error("Failed to enumerate directory: {}", path.display())]
    EnumerationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to create a directory
    #[error("Failed to create directory: {}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Path is not valid UTF-8 or has no usable file name
    #[error("Invalid path: {} ({reason})", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    /// The zip container could not be read or written
    #[error("Archive error in {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: ZipError,
    },

    /// The external program could not be started at all
    #[error("Failed to launch {program}")]
    CommandLaunch {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The external conversion tool exited non-zero; `output` is what it printed
    #[error("Conversion of {} failed: {output}", input.display())]
    Conversion { input: PathBuf, output: String },

    /// A structural precondition on an archive did not hold
    #[error("Archive invariant violated in {}: {reason}", path.display())]
    ArchiveInvariantViolation { path: PathBuf, reason: String },

    /// Naming mode text did not match any known mode
    #[error("Unknown naming mode '{0}'. Must be 'source' or 'incrementing'")]
    UnknownNamingMode(String),

    /// Precondition text did not match any known precondition
    #[error(
        "Unknown precondition '{0}'. Must be 'single-directory', 'numbered', \
         'garbage-directories' or 'garbage-files'"
    )]
    UnknownPrecondition(String),

    /// Quality text was neither 'lossless' nor a percentage 0-100
    #[error("Invalid quality '{0}'. Must be 'lossless' or an integer from 0 to 100")]
    InvalidQuality(String),
}

impl EngineError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<u32> {
        match self {
            Self::ReadError { source, .. }
            | Self::WriteError { source, .. }
            | Self::EnumerationFailed { source, .. }
            | Self::DirectoryCreationFailed { source, .. }
            | Self::CommandLaunch { source, .. } => source.raw_os_error().map(|e| e as u32),
            _ => None,
        }
    }

    pub(crate) fn archive(path: impl Into<PathBuf>, source: ZipError) -> Self {
        EngineError::Archive {
            path: path.into(),
            source,
        }
    }
}
