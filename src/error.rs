use thiserror::Error;

use crate::fetch::FetchError;

/// The stable classification of an [`Error`], for callers that need to branch on the kind of
/// failure without matching on the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FileDoesntExist,
    NetworkError,
    NotAllowed,
    NotImplemented,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(
        "There is no path {path}{}",
        .known.as_ref().map(|files| format!(" (available files: {files})")).unwrap_or_default()
    )]
    FileDoesntExist {
        path: String,
        /// The comma-separated list of indexed paths.  Only filled in by debug builds.
        known: Option<String>,
    },
    #[error("Cannot load disk metadata. Error: {source}")]
    Network {
        #[source]
        source: FetchError,
    },
    #[error("Only read-only operations are supported on a static web disk")]
    NotAllowed,
    #[error("{0} is not implemented for static web disk metadata")]
    NotImplemented(&'static str),
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::FileDoesntExist { .. } => ErrorCode::FileDoesntExist,
            Error::Network { .. } => ErrorCode::NetworkError,
            Error::NotAllowed => ErrorCode::NotAllowed,
            Error::NotImplemented(_) => ErrorCode::NotImplemented,
        }
    }

    pub(crate) fn no_such_path(path: &str) -> Self {
        Error::FileDoesntExist {
            path: path.to_string(),
            known: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
