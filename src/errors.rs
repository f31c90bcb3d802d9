use std::io;

use thiserror::Error;

/// Error taxonomy shared by every filesystem view and the transfer engine.
#[derive(Error, Debug)]
pub enum VfsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Corrupt archive: {0}")]
    Corrupt(String),

    #[error("{failed} of {total} items failed, first error: {first}")]
    PartialBatchFailure {
        failed: usize,
        total: usize,
        first: Box<VfsError>,
    },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

pub type VfsResult<T> = Result<T, VfsError>;

impl VfsError {
    /// Map an I/O error for `path` into the taxonomy.
    pub fn from_io(err: io::Error, path: impl Into<String>) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => VfsError::NotFound(path),
            io::ErrorKind::PermissionDenied => VfsError::PermissionDenied(path),
            io::ErrorKind::Unsupported => VfsError::Unsupported(format!("{}: {}", path, err)),
            io::ErrorKind::CrossesDevices => {
                VfsError::Unsupported(format!("{}: crosses filesystem boundary", path))
            }
            io::ErrorKind::Interrupted => VfsError::Cancelled(path),
            _ => VfsError::Io { path, source: err },
        }
    }

    /// Shorthand for the read-only / capability mismatch case.
    pub fn read_only(what: &str, path: &str) -> Self {
        VfsError::Unsupported(format!("{} is read-only: {}", what, path))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, VfsError::NotFound(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, VfsError::Unsupported(_))
    }
}

/// Application-level errors for the front end binary.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Vfs(#[from] VfsError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type AppResult<T> = Result<T, AppError>;
