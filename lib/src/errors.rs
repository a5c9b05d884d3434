use std::num::ParseIntError;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Result type returned from functions that can have our `Error`s.
pub type Result<T, E = BacklightError> = std::result::Result<T, E>;

#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum BacklightError {
    #[error("Failed to read {}: {cause}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        cause: ReadCause,
    },

    #[error("Failed to write {}: {cause}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        cause: Arc<std::io::Error>,
    },

    #[error("Brightness subscription failed: {0}")]
    Subscription(#[source] Arc<notify::Error>),

    #[error("Brightness subscription closed")]
    SubscriptionClosed,

    #[error("{0}")]
    Other(String),
}

/// Why a brightness file could not be turned into a number.
#[derive(Error, Debug, Clone)]
pub enum ReadCause {
    #[error("{0}")]
    Io(#[source] Arc<std::io::Error>),

    #[error("invalid integer {content:?}: {source}")]
    Parse {
        content: String,
        source: ParseIntError,
    },

    #[error("negative maximum {0}")]
    NegativeMaximum(i64),
}

impl From<std::io::Error> for ReadCause {
    fn from(err: std::io::Error) -> Self {
        ReadCause::Io(Arc::new(err))
    }
}

impl From<notify::Error> for BacklightError {
    fn from(err: notify::Error) -> Self {
        BacklightError::Subscription(Arc::new(err))
    }
}

impl BacklightError {
    pub(crate) fn read(path: impl Into<PathBuf>, cause: impl Into<ReadCause>) -> Self {
        BacklightError::Read {
            path: path.into(),
            cause: cause.into(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, cause: std::io::Error) -> Self {
        BacklightError::Write {
            path: path.into(),
            cause: Arc::new(cause),
        }
    }

    /// Whether the watch loop stops after reporting this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BacklightError::Write { .. })
    }
}
