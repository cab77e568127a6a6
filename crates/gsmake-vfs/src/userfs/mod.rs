//! Pluggable user-FS back-ends. Every driver materializes,
//! removes, and refreshes the on-disk tree for one VFS scheme.

mod file;
mod git;

pub use file::FileDriver;
pub use git::GitDriver;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::reference::Ref;

/// Context a driver needs to do its work: the resolved on-disk mount target
/// and, for drivers that cache, the shared cache directory.
pub struct MountContext<'a> {
    pub target_path: &'a Path,
    pub cache_path: &'a Path,
    pub tmp_dir: &'a Path,
}

#[async_trait]
pub trait UserFs: Send + Sync {
    fn scheme(&self) -> &'static str;

    /// Materializes `src` under `ctx.target_path`.
    async fn mount(&self, src: &Ref, ctx: &MountContext<'_>) -> Result<()>;

    /// Removes `ctx.target_path`.
    async fn dismount(&self, src: &Ref, ctx: &MountContext<'_>) -> Result<()>;

    /// Refreshes `ctx.target_path`. When `nocache` is set, the shared cache
    /// is re-pulled first.
    async fn update(&self, src: &Ref, ctx: &MountContext<'_>, nocache: bool) -> Result<()>;

    /// Refreshes the shared cache at `cache_path`, independent of any one
    /// userspace's mount.
    async fn update_cache(&self, src: &Ref, cache_path: &Path) -> Result<()>;
}
