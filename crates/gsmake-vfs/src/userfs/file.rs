use std::path::Path;

use async_trait::async_trait;

use super::{MountContext, UserFs};
use crate::error::Result;
use crate::reference::Ref;

/// The `file` user-FS driver: `mount` removes
/// `target.Mapping` if present, creates parent directories, and symlinks
/// `src.host+src.path` (interpreted as a local path) to `target.Mapping`.
/// `update` is identical to `mount`. There is no cache semantics.
pub struct FileDriver;

#[async_trait]
impl UserFs for FileDriver {
    fn scheme(&self) -> &'static str {
        "file"
    }

    async fn mount(&self, src: &Ref, ctx: &MountContext<'_>) -> Result<()> {
        let source = local_path(src);
        gsmake_support::fs::symlink(&source, ctx.target_path)
            .await
            .map_err(crate::error::Error::Io)
    }

    async fn dismount(&self, _src: &Ref, ctx: &MountContext<'_>) -> Result<()> {
        gsmake_support::fs::remove_dir_all(ctx.target_path)
            .await
            .map_err(crate::error::Error::Io)
    }

    async fn update(&self, src: &Ref, ctx: &MountContext<'_>, _nocache: bool) -> Result<()> {
        self.mount(src, ctx).await
    }

    async fn update_cache(&self, _src: &Ref, _cache_path: &Path) -> Result<()> {
        // The file driver has no cache semantics.
        Ok(())
    }
}

fn local_path(src: &Ref) -> String {
    format!("{}{}", src.host, src.path)
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn mount_symlinks_local_path() {
        let source_dir = TempDir::new().unwrap();
        std::fs::write(source_dir.path().join("marker"), b"x").unwrap();
        let userspace = TempDir::new().unwrap();
        let target = userspace.path().join("task/src/local-pkg");

        let src = Ref::new("file", "", source_dir.path().to_str().unwrap());
        let ctx = MountContext {
            target_path: &target,
            cache_path: userspace.path(),
            tmp_dir: userspace.path(),
        };

        FileDriver.mount(&src, &ctx).await.unwrap();
        assert!(target.join("marker").exists());
    }
}
