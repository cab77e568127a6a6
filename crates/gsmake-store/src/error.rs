use thiserror::Error;

/// The metadata store's error kind. Unreadable indices surface as
/// [`Error::Io`]/[`Error::Serde`]; a missing index is not an error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("metadata store I/O error")]
    Io(#[source] anyhow::Error),

    #[error("failed to (de)serialize metadata index '{index}'")]
    Serde {
        index: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    NotFound(String),
}
