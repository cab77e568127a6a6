use thiserror::Error;

/// The loader's errors: a single formatted variant plus the
/// lower layers it wraps.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Load(String),

    #[error(transparent)]
    Vfs(#[from] gsmake_vfs::Error),

    #[error("malformed manifest at '{path}'")]
    Manifest {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error")]
    Io(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
