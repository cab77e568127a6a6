use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use fs4::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::error::Error;
use crate::Result;
use gsmake_paths::{index_file, lock_file};

/// A single `acquire-lock -> read-all-needed-indices -> mutate ->
/// write-all-indices -> release-lock` transaction.
///
/// Reads within a transaction go straight to disk (the lock guarantees no
/// concurrent writer); writes are buffered in memory and flushed to disk
/// only on [`Store::with_lock`](crate::Store::with_lock) success, so an
/// aborted transaction leaves no trace.
pub struct Transaction {
    root: PathBuf,
    // Held for the lifetime of the transaction; dropping it releases the lock.
    _lock: File,
    pending: BTreeMap<String, Vec<u8>>,
}

impl Transaction {
    pub(crate) async fn open(root: &Path) -> Result<Self> {
        let root = root.to_path_buf();
        let path = lock_file(&root);
        let lock = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::options()
                .create(true)
                .write(true)
                .truncate(false)
                .open(&path)?;
            FileExt::lock_exclusive(&file)?;
            Ok(file)
        })
        .await
        .map_err(|e| Error::Io(anyhow::anyhow!(e)))?
        .map_err(|e| Error::Io(anyhow::anyhow!(e)))?;

        Ok(Self {
            root,
            _lock: lock,
            pending: BTreeMap::new(),
        })
    }

    /// Reads a named index, returning `T::default()` (via an empty JSON
    /// object `{}`) if the backing file does not exist.
    pub fn read<T>(&self, index_name: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        if let Some(buffered) = self.pending.get(index_name) {
            return serde_json::from_slice(buffered).map_err(|source| Error::Serde {
                index: index_name.to_string(),
                source,
            });
        }
        let path = index_file(&self.root, index_name);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => b"{}".to_vec(),
            Err(e) => return Err(Error::Io(anyhow::Error::new(e).context(format!(
                "unable to read metadata index '{}' at '{}'",
                index_name,
                path.display()
            )))),
        };
        serde_json::from_slice(&raw).map_err(|source| Error::Serde {
            index: index_name.to_string(),
            source,
        })
    }

    /// Buffers a write to a named index. Nothing touches disk until the
    /// enclosing transaction commits.
    pub fn write<T>(&mut self, index_name: &str, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| Error::Serde {
            index: index_name.to_string(),
            source,
        })?;
        self.pending.insert(index_name.to_string(), bytes);
        Ok(())
    }

    pub(crate) async fn commit(self) -> Result<()> {
        for (index_name, bytes) in self.pending {
            let path = index_file(&self.root, &index_name);
            trace!(index = %index_name, path = %path.display(), "committing metadata index");
            if let Some(parent) = path.parent() {
                gsmake_support::fs::create_dir_all(parent)
                    .await
                    .map_err(Error::Io)?;
            }
            gsmake_support::fs::write_atomic(&path, &bytes)
                .await
                .map_err(Error::Io)?;
        }
        Ok(())
    }

    pub(crate) async fn abort(self) {
        trace!("aborting metadata transaction, discarding buffered writes");
    }
}
