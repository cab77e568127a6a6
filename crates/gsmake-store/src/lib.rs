//! The metadata store: single-writer/multi-reader access to
//! the JSON indices under `<root>/.db`, serialized by an advisory file lock
//! on `<root>/.db/locker`.
//!
//! Every read or write happens inside a [`Store::with_lock`] transaction.
//! Transactions must be short and must not perform user-visible work (no SCM
//! calls) while the lock is held -- the single-writer/multi-reader model
//! depends on it.

mod error;
mod transaction;

pub use error::Error;
pub use transaction::Transaction;

use std::path::{Path, PathBuf};

use gsmake_paths::metadata_dir;

pub type Result<T> = std::result::Result<T, Error>;

/// Handle onto one `<root>/.db` metadata directory.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Runs `body` inside a single lock transaction. `body` receives a
    /// [`Transaction`] through which it reads and writes named JSON indices;
    /// the lock is released (and, if `body` succeeded, every index touched
    /// is durably written) when this call returns.
    pub async fn with_lock<F, T>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction) -> Result<T>,
    {
        gsmake_support::fs::create_dir_all(metadata_dir(&self.root))
            .await
            .map_err(Error::Io)?;
        let mut txn = Transaction::open(&self.root).await?;
        let result = body(&mut txn);
        match result {
            Ok(value) => {
                txn.commit().await?;
                Ok(value)
            }
            Err(e) => {
                txn.abort().await;
                Err(e)
            }
        }
    }
}
