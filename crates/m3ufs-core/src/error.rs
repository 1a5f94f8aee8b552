//! Error types for playlist filesystem operations.
//!
//! Every failure from manifest I/O or the real filesystem is carried up
//! unchanged; [`M3uError::to_errno`] turns it into the POSIX code the
//! transport replies with.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the core filesystem logic.
#[derive(Debug, Error)]
pub enum M3uError {
    /// The playlist file could not be opened or read.
    #[error("Manifest unavailable at {}: {source}", path.display())]
    ManifestUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The metadata donor for the virtual manifest file could not be stat'ed.
    #[error("Reference path unavailable at {}: {source}", path.display())]
    ReferenceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A real path does not exist.
    #[error("No such entry: {}", path.display())]
    NotFound { path: PathBuf },

    /// Any other real filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Startup configuration rejected.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl M3uError {
    /// Classifies an I/O error from a real path, promoting `NotFound`.
    pub fn from_real(path: impl Into<PathBuf>, e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            M3uError::NotFound { path: path.into() }
        } else {
            M3uError::Io(e)
        }
    }

    /// Converts this error to a libc error code for FUSE.
    pub fn to_errno(&self) -> i32 {
        match self {
            M3uError::ManifestUnavailable { source, .. }
            | M3uError::ReferenceUnavailable { source, .. } => io_error_to_errno(source),
            M3uError::NotFound { .. } => libc::ENOENT,
            M3uError::Io(e) => io_error_to_errno(e),
            M3uError::Config(_) => libc::EINVAL,
        }
    }
}

/// Result type for core operations.
pub type M3uResult<T> = Result<T, M3uError>;

/// Converts an I/O error to a POSIX errno value.
///
/// This extracts the raw OS error if available, otherwise returns `EIO`.
#[inline]
pub fn io_error_to_errno(e: &io::Error) -> i32 {
    e.raw_os_error().unwrap_or(libc::EIO)
}

/// Extension trait to convert errors to errno.
pub trait ToErrno {
    /// Converts this error to a libc error code.
    fn to_errno(&self) -> i32;
}

impl ToErrno for M3uError {
    fn to_errno(&self) -> i32 {
        M3uError::to_errno(self)
    }
}

impl ToErrno for io::Error {
    fn to_errno(&self) -> i32 {
        io_error_to_errno(self)
    }
}
