use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unregistered task '{0}'")]
    Unregistered(String),
    #[error("unknown task '{referenced}' referenced by '{by}'")]
    UnknownPrev { referenced: String, by: String },
    #[error("DCG detected: {0}")]
    Cycle(String),
    #[error(transparent)]
    Task(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
