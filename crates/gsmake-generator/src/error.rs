use thiserror::Error;

/// The three distinct failure modes the generator's caller needs to be
/// able to tell apart.
#[derive(Debug, Error)]
pub enum Error {
    #[error("template error: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("source format error: {0}")]
    Format(String),

    #[error("compile error: {0}")]
    Compile(String),

    #[error("I/O error")]
    Io(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
