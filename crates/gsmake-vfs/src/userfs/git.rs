use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{MountContext, UserFs};
use crate::error::{Error, Result};
use crate::reference::Ref;
use gsmake_paths::CURRENT_VERSION;
use gsmake_support::process::exec_log;

/// The `git` user-FS driver. Driven by `(remote, version)` in
/// the `src` query.
///
/// First mount: *seed cache* (clone into a scratch dir, then clone that
/// scratch dir into the shared cache -- this makes the cache itself a legal
/// remote for fast subsequent clones, the property the *populate userspace*
/// step relies on), then *populate userspace* (clone the cache into the
/// mount target and check out the requested version, mapping `"current"` to
/// `"master"`).
pub struct GitDriver;

#[async_trait]
impl UserFs for GitDriver {
    fn scheme(&self) -> &'static str {
        "git"
    }

    async fn mount(&self, src: &Ref, ctx: &MountContext<'_>) -> Result<()> {
        if !ctx.cache_path.is_dir() {
            self.seed_cache(src, ctx.tmp_dir, ctx.cache_path).await?;
        }
        self.populate(src, ctx.cache_path, ctx.target_path).await
    }

    async fn dismount(&self, _src: &Ref, ctx: &MountContext<'_>) -> Result<()> {
        gsmake_support::fs::remove_dir_all(ctx.target_path)
            .await
            .map_err(Error::Io)
    }

    async fn update(&self, src: &Ref, ctx: &MountContext<'_>, nocache: bool) -> Result<()> {
        if nocache {
            self.update_cache(src, ctx.cache_path).await?;
        }
        gsmake_support::fs::remove_dir_all(ctx.target_path)
            .await
            .map_err(Error::Io)?;
        self.populate(src, ctx.cache_path, ctx.target_path).await
    }

    async fn update_cache(&self, _src: &Ref, cache_path: &Path) -> Result<()> {
        exec_log(
            Command::new("git")
                .arg("pull")
                .arg("--all")
                .current_dir(cache_path),
        )
        .await
        .map_err(|e| Error::External(e.to_string()))
    }
}

impl GitDriver {
    async fn seed_cache(&self, src: &Ref, tmp_dir: &Path, cache_path: &Path) -> Result<()> {
        let remote = src
            .remote
            .as_deref()
            .ok_or_else(|| Error::Url(format!("'{}' has no resolvable remote", src.canonical())))?;

        gsmake_support::fs::create_dir_all(tmp_dir)
            .await
            .map_err(Error::Io)?;
        let seed = tmp_dir.join(sanitize(&src.name()));
        debug!(remote, seed = %seed.display(), "seeding git cache");
        exec_log(Command::new("git").arg("clone").arg(remote).arg(&seed))
            .await
            .map_err(|e| Error::External(e.to_string()))?;

        if let Some(parent) = cache_path.parent() {
            gsmake_support::fs::create_dir_all(parent)
                .await
                .map_err(Error::Io)?;
        }
        exec_log(
            Command::new("git")
                .arg("clone")
                .arg(&seed)
                .arg(cache_path),
        )
        .await
        .map_err(|e| Error::External(e.to_string()))
    }

    async fn populate(&self, src: &Ref, cache_path: &Path, target_path: &Path) -> Result<()> {
        gsmake_support::fs::remove_dir_all(target_path)
            .await
            .map_err(Error::Io)?;
        exec_log(
            Command::new("git")
                .arg("clone")
                .arg(cache_path)
                .arg(target_path),
        )
        .await
        .map_err(|e| Error::External(e.to_string()))?;

        let version = resolve_version(src.version_or_default());
        exec_log(
            Command::new("git")
                .arg("checkout")
                .arg(version)
                .current_dir(target_path),
        )
        .await
        .map_err(|e| Error::External(e.to_string()))
    }
}

/// Maps the reserved `"current"` version onto the SCM's notion of "default
/// branch tip" -- `master` for git.
fn resolve_version(version: &str) -> &str {
    if version == CURRENT_VERSION {
        "master"
    } else {
        version
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn current_maps_to_master() {
        assert_eq!(resolve_version("current"), "master");
        assert_eq!(resolve_version("v1.2.3"), "v1.2.3");
    }

    #[test]
    fn sanitize_replaces_path_separators() {
        assert_eq!(sanitize("github.com/a/b"), "github_com_a_b");
    }
}
