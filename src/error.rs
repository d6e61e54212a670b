use std::path::PathBuf;
use svdface_vision::VisionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("persistence error at {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("identity store at {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: postcard::Error,
    },

    #[error("failed to encode identity store for {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: postcard::Error,
    },

    #[error("vision error: {0}")]
    Vision(VisionError),

    #[error("config error: {0}")]
    Config(String),
}

impl From<VisionError> for Error {
    fn from(e: VisionError) -> Self {
        match e {
            VisionError::InvalidInput(msg) => Error::InvalidInput(msg),
            other => Error::Vision(other),
        }
    }
}

impl Error {
    /// True for faults in the persistence layer, as opposed to caller errors.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Error::Persistence { .. } | Error::Corrupt { .. } | Error::Encode { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
