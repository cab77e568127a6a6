//! Thin `anyhow`-wrapped async filesystem helpers: one wrapper function per
//! `tokio::fs` call, each adding a `.context(...)` naming the path involved.

use std::path::Path;

use anyhow::{Context, Result};

pub async fn read_to_string(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("unable to read '{}'", path.display()))
}

pub async fn read(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    tokio::fs::read(path)
        .await
        .with_context(|| format!("unable to read '{}'", path.display()))
}

pub async fn write(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
    let path = path.as_ref();
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("unable to write '{}'", path.display()))
}

/// Writes `contents` atomically by writing to a sibling temp file and
/// renaming it over `path`. Used by the metadata store so a concurrent
/// reader never observes a partially-written index.
pub async fn write_atomic(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
    let path = path.as_ref();
    let dir = path.parent().with_context(|| {
        format!("unable to find parent directory of '{}'", path.display())
    })?;
    let tmp_name = format!(".{}.tmp-{}", file_name(path), uuid::Uuid::new_v4());
    let tmp_path = dir.join(tmp_name);
    tokio::fs::write(&tmp_path, contents)
        .await
        .with_context(|| format!("unable to write '{}'", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("unable to rename into '{}'", path.display()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string())
}

pub async fn create_dir_all(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("unable to create directory '{}'", path.display()))
}

pub async fn remove_dir_all(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("unable to remove directory '{}'", path.display())),
    }
}

pub async fn remove_file(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("unable to remove file '{}'", path.display())),
    }
}

pub async fn canonicalize(path: impl AsRef<Path>) -> Result<std::path::PathBuf> {
    let path = path.as_ref();
    tokio::fs::canonicalize(path)
        .await
        .with_context(|| format!("unable to canonicalize '{}'", path.display()))
}

/// Creates `target` as a symlink to `source`. Removes any pre-existing file
/// or symlink at `target` first, matching the `file` user-FS driver's
/// idempotent `mount` semantics.
pub async fn symlink(source: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<()> {
    let source = source.as_ref();
    let target = target.as_ref();
    if let Some(parent) = target.parent() {
        create_dir_all(parent).await?;
    }
    remove_any(target).await?;
    #[cfg(unix)]
    {
        tokio::fs::symlink(source, target).await.with_context(|| {
            format!(
                "unable to symlink '{}' -> '{}'",
                target.display(),
                source.display()
            )
        })
    }
    #[cfg(windows)]
    {
        if source.is_dir() {
            tokio::fs::symlink_dir(source, target).await
        } else {
            tokio::fs::symlink_file(source, target).await
        }
        .with_context(|| {
            format!(
                "unable to symlink '{}' -> '{}'",
                target.display(),
                source.display()
            )
        })
    }
}

async fn remove_any(path: &Path) -> Result<()> {
    let meta = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).with_context(|| format!("unable to stat '{}'", path.display())),
    };
    if meta.is_dir() {
        remove_dir_all(path).await
    } else {
        remove_file(path).await
    }
}
