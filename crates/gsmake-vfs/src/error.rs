use thiserror::Error;

/// The VFS's error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid VFS URL: {0}")]
    Url(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("external command failed: {0}")]
    External(String),

    #[error("I/O error")]
    Io(#[source] anyhow::Error),

    #[error(transparent)]
    Store(#[from] gsmake_store::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
