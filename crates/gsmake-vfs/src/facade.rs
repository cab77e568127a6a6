use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use gsmake_paths::{cache_key, cache_path, mount_key, mount_path, tmp_dir, Domain};
use gsmake_store::Store;

use crate::error::{Error, Result};
use crate::mount::MountEntry;
use crate::reference::{Ref, FILE_SCHEME, GSMAKE_SCHEME};
use crate::site::{default_sites, Site};
use crate::userfs::{FileDriver, GitDriver, MountContext, UserFs};

type MountIndex = BTreeMap<String, MountEntry>;
type RedirectIndex = BTreeMap<String, String>;
type SiteIndex = BTreeMap<String, Site>;
/// `"<scheme>://<name>" -> [scheme, cache_path]`
type CacheIndex = BTreeMap<String, (String, String)>;

/// The VFS façade: URL parsing, site-template expansion,
/// mount lifecycle, redirect resolution, iteration -- all scoped to one
/// userspace.
pub struct Vfs {
    store: Store,
    root: PathBuf,
    userspace_id: String,
    userspace_dir: PathBuf,
    drivers: BTreeMap<String, Arc<dyn UserFs>>,
}

impl Vfs {
    pub fn new(root: impl Into<PathBuf>, userspace_id: impl Into<String>) -> Self {
        let root = root.into();
        let userspace_id = userspace_id.into();
        let userspace_dir = gsmake_paths::userspace_dir(&root, &userspace_id);
        let store = Store::new(&root);

        let mut drivers: BTreeMap<String, Arc<dyn UserFs>> = BTreeMap::new();
        drivers.insert(FILE_SCHEME.to_string(), Arc::new(FileDriver));
        drivers.insert("git".to_string(), Arc::new(GitDriver));

        Self {
            store,
            root,
            userspace_id,
            userspace_dir,
            drivers,
        }
    }

    pub fn userspace_id(&self) -> &str {
        &self.userspace_id
    }

    pub fn userspace_dir(&self) -> &Path {
        &self.userspace_dir
    }

    fn mount_index_name(&self) -> String {
        format!("{}/mount", self.userspace_id)
    }

    fn driver_for(&self, scheme: &str) -> Result<Arc<dyn UserFs>> {
        self.drivers
            .get(scheme)
            .cloned()
            .ok_or_else(|| Error::Url(format!("no user-FS driver registered for scheme '{scheme}'")))
    }

    /// Looks up the site table entry for `host`, falling back to `"git"`.
    pub async fn protocol(&self, host: &str) -> Result<String> {
        let sites = self.sites().await?;
        Ok(sites
            .get(host)
            .map(|site| site.scm.clone())
            .unwrap_or_else(|| "git".to_string()))
    }

    async fn sites(&self) -> Result<SiteIndex> {
        let sites: SiteIndex = self.store.with_lock(|txn| txn.read("sites")).await?;
        if sites.is_empty() {
            let seeded = default_sites();
            self.store
                .with_lock(|txn| txn.write("sites", &seeded))
                .await?;
            Ok(seeded)
        } else {
            Ok(sites)
        }
    }

    /// Resolves `src`'s `remote` query parameter when absent, for non-`file`,
    /// non-`gsmake` schemes: the site table is consulted by `host`, and the
    /// matching site's pattern is applied to `host+path` to synthesize
    /// `remote`. A site miss is an [`Error::Url`].
    async fn resolve_remote(&self, src: &Ref) -> Result<Ref> {
        if src.is_file() || src.is_gsmake() || src.remote.is_some() {
            return Ok(src.clone());
        }
        ensure_version_present(src)?;
        let sites = self.sites().await?;
        let site = sites
            .get(&src.host)
            .ok_or_else(|| Error::Url(format!("no known site for host '{}'", src.host)))?;
        let remote = site.expand(&src.name())?;
        Ok(src.clone().with_remote(remote))
    }

    /// Applies the process-wide redirect map to `src`, following at most one
    /// hop.
    async fn apply_redirect(&self, src: &Ref) -> Result<Ref> {
        let redirects: RedirectIndex = self.store.with_lock(|txn| txn.read("redirect")).await?;
        match redirects.get(&src.canonical()) {
            Some(to) => Ref::parse(to),
            None => Ok(src.clone()),
        }
    }

    /// `mount(src, target)`: idempotent when `src` is already mounted at
    /// `target`; otherwise dismounts any prior mount first, invokes the
    /// driver's `mount`, then records the entry.
    pub async fn mount(&self, src: Ref, target: Ref) -> Result<()> {
        ensure_gsmake_target(&target)?;
        let domain = target
            .domain
            .clone()
            .ok_or_else(|| Error::Url(format!("'{}' has no domain query parameter", target.canonical())))?;

        let redirected = self.apply_redirect(&src).await?;
        let resolved = self.resolve_remote(&redirected).await?;

        let key = mount_key(&domain, target.name());
        let name = self.mount_index_name();

        let existing: Option<MountEntry> = self
            .store
            .with_lock(|txn| {
                let index: MountIndex = txn.read(&name)?;
                Ok(index.get(&key).cloned())
            })
            .await?;

        if let Some(existing) = &existing {
            if existing.src.canonical() == resolved.canonical() {
                debug!(key, "mount already up to date, skipping");
                return Ok(());
            }
            self.dismount(target.clone()).await?;
        }

        let target_path = mount_path(&self.userspace_dir, &domain, target.name());
        let cache = self.cache_root(&resolved).await?;
        let tmp = tmp_dir(&self.userspace_dir, &domain);
        let driver = self.driver_for(&resolved.scheme)?;

        let ctx = MountContext {
            target_path: &target_path,
            cache_path: &cache,
            tmp_dir: &tmp,
        };
        driver.mount(&resolved, &ctx).await?;

        let entry = MountEntry {
            src: resolved,
            target: target.clone(),
        };
        self.store
            .with_lock(|txn| {
                let mut index: MountIndex = txn.read(&name)?;
                index.insert(key.clone(), entry.clone());
                txn.write(&name, &index)
            })
            .await?;
        info!(key, "mounted");
        Ok(())
    }

    /// `dismount(target)`: not-found is success.
    pub async fn dismount(&self, target: Ref) -> Result<()> {
        ensure_gsmake_target(&target)?;
        let domain = target
            .domain
            .clone()
            .ok_or_else(|| Error::Url(format!("'{}' has no domain query parameter", target.canonical())))?;
        let key = mount_key(&domain, target.name());
        let name = self.mount_index_name();

        let entry: Option<MountEntry> = self
            .store
            .with_lock(|txn| {
                let index: MountIndex = txn.read(&name)?;
                Ok(index.get(&key).cloned())
            })
            .await?;

        let Some(entry) = entry else {
            return Ok(());
        };

        let target_path = mount_path(&self.userspace_dir, &domain, target.name());
        let cache = self.cache_root(&entry.src).await?;
        let tmp = tmp_dir(&self.userspace_dir, &domain);
        let driver = self.driver_for(&entry.src.scheme)?;
        let ctx = MountContext {
            target_path: &target_path,
            cache_path: &cache,
            tmp_dir: &tmp,
        };
        driver.dismount(&entry.src, &ctx).await?;

        self.store
            .with_lock(|txn| {
                let mut index: MountIndex = txn.read(&name)?;
                index.remove(&key);
                txn.write(&name, &index)
            })
            .await?;
        info!(key, "dismounted");
        Ok(())
    }

    /// `update(target, nocache)`: re-resolves the mount entry (honoring
    /// redirects), delegating to the driver.
    pub async fn update(&self, target: Ref, nocache: bool) -> Result<()> {
        let entry = self.open(&target).await?;
        let domain = target
            .domain
            .clone()
            .ok_or_else(|| Error::Url(format!("'{}' has no domain query parameter", target.canonical())))?;
        let target_path = mount_path(&self.userspace_dir, &domain, target.name());
        let cache = self.cache_root(&entry.src).await?;
        let tmp = tmp_dir(&self.userspace_dir, &domain);
        let driver = self.driver_for(&entry.src.scheme)?;
        let ctx = MountContext {
            target_path: &target_path,
            cache_path: &cache,
            tmp_dir: &tmp,
        };
        driver.update(&entry.src, &ctx, nocache).await
    }

    /// `update_all(nocache)`: iterates all registered caches (if `nocache`),
    /// then all of this userspace's mounts. Skips userspaces under the OS
    /// temp dir.
    pub async fn update_all(&self, nocache: bool) -> Result<()> {
        if gsmake_paths::is_under_temp_dir(&self.userspace_dir) {
            debug!("skipping update_all for temp-bound userspace");
            return Ok(());
        }

        if nocache {
            let caches: CacheIndex = self.store.with_lock(|txn| txn.read("cached")).await?;
            for (key, (scheme, path)) in caches {
                debug!(key, "refreshing cache");
                let driver = self.driver_for(&scheme)?;
                driver
                    .update_cache(&Ref::new(scheme.clone(), "", ""), Path::new(&path))
                    .await?;
            }
        }

        let name = self.mount_index_name();
        let index: MountIndex = self.store.with_lock(|txn| txn.read(&name)).await?;
        for entry in index.values() {
            self.update(entry.target.clone(), false).await?;
        }
        Ok(())
    }

    /// `open(url)`: resolves a `gsmake://` target to its mount entry.
    pub async fn open(&self, target: &Ref) -> Result<MountEntry> {
        ensure_gsmake_target(target)?;
        let domain = target
            .domain
            .clone()
            .ok_or_else(|| Error::Url(format!("'{}' has no domain query parameter", target.canonical())))?;
        let key = mount_key(&domain, target.name());
        let name = self.mount_index_name();
        let index: MountIndex = self.store.with_lock(|txn| txn.read(&name)).await?;
        index
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("no mount for '{key}'")))
    }

    /// `list(fn)`: iterates mount entries, early-exiting when `f` returns
    /// `false`.
    pub async fn list(&self, mut f: impl FnMut(&MountEntry) -> bool) -> Result<()> {
        let name = self.mount_index_name();
        let index: MountIndex = self.store.with_lock(|txn| txn.read(&name)).await?;
        for entry in index.values() {
            if !f(entry) {
                break;
            }
        }
        Ok(())
    }

    /// `mounted(src, target)`: true iff `open(target).src.canonical ==
    /// src.canonical`.
    pub async fn mounted(&self, src: &Ref, target: &Ref) -> Result<bool> {
        match self.open(target).await {
            Ok(entry) => Ok(entry.src.canonical() == src.canonical()),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// `redirect(from, to, enable)`: adds or removes a redirect edge.
    /// Neither endpoint may be a `gsmake://` URL.
    pub async fn redirect(&self, from: Ref, to: Ref, enable: bool) -> Result<()> {
        if from.is_gsmake() || to.is_gsmake() {
            return Err(Error::Url(
                "redirect endpoints may not be gsmake:// URLs".to_string(),
            ));
        }
        self.store
            .with_lock(|txn| {
                let mut redirects: RedirectIndex = txn.read("redirect")?;
                if enable {
                    redirects.insert(from.canonical(), to.canonical());
                } else {
                    redirects.remove(&from.canonical());
                }
                txn.write("redirect", &redirects)
            })
            .await?;
        Ok(())
    }

    /// The shared cache directory for `src`, registering it in the `cached`
    /// index the first time it is observed.
    pub async fn cache_root(&self, src: &Ref) -> Result<PathBuf> {
        if src.is_file() {
            // The file driver has no cache semantics; any stable path works
            // since it is never read from.
            return Ok(self.userspace_dir.join(".no-cache"));
        }
        let path = cache_path(&self.root, &src.scheme, src.name());
        let key = cache_key(&src.scheme, src.name());
        self.store
            .with_lock(|txn| {
                let mut cached: CacheIndex = txn.read("cached")?;
                cached
                    .entry(key.clone())
                    .or_insert_with(|| (src.scheme.clone(), path.to_string_lossy().to_string()));
                txn.write("cached", &cached)
            })
            .await?;
        Ok(path)
    }

    pub async fn clear(&self) -> Result<()> {
        let name = self.mount_index_name();
        self.store
            .with_lock(|txn| {
                let index: MountIndex = BTreeMap::new();
                txn.write(&name, &index)
            })
            .await?;
        Ok(())
    }
}

fn ensure_gsmake_target(target: &Ref) -> Result<()> {
    if !target.is_gsmake() {
        return Err(Error::Url(format!(
            "'{}' is not a gsmake:// target URL",
            target.canonical()
        )));
    }
    Ok(())
}

fn ensure_version_present(src: &Ref) -> Result<()> {
    if src.version.is_none() {
        return Err(Error::Url(format!(
            "'{}' requires a version query parameter",
            src.canonical()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use gsmake_paths::Domain;
    use tempfile::TempDir;

    fn target(domain: &Domain, name: &str) -> Ref {
        let (host, path) = name.split_once('/').unwrap_or((name, ""));
        Ref::new(GSMAKE_SCHEME, host, format!("/{path}")).with_domain(domain.clone())
    }

    #[tokio::test]
    async fn mount_is_idempotent() {
        let root = TempDir::new().unwrap();
        let source = TempDir::new().unwrap();
        std::fs::write(source.path().join("f"), b"x").unwrap();

        let vfs = Vfs::new(root.path(), "u1");
        let domain = Domain::task();
        let src = Ref::new(FILE_SCHEME, "", source.path().to_str().unwrap());
        let tgt = target(&domain, "local/pkg");

        vfs.mount(src.clone(), tgt.clone()).await.unwrap();
        vfs.mount(src.clone(), tgt.clone()).await.unwrap();

        let mut count = 0;
        vfs.list(|_| {
            count += 1;
            true
        })
        .await
        .unwrap();
        assert_eq!(count, 1);

        vfs.dismount(tgt.clone()).await.unwrap();
        let err = vfs.open(&tgt).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn redirect_changes_resolved_src() {
        let root = TempDir::new().unwrap();
        let vfs = Vfs::new(root.path(), "u1");

        let original = Ref::new("git", "github.com", "/a/b").with_version("v1");
        let replacement = Ref::new("git", "github.com", "/a/c").with_version("v1");

        vfs.redirect(original.clone(), replacement.clone(), true)
            .await
            .unwrap();
        let resolved = vfs.apply_redirect(&original).await.unwrap();
        assert_eq!(resolved.canonical(), replacement.canonical());

        vfs.redirect(original.clone(), replacement, false)
            .await
            .unwrap();
        let resolved = vfs.apply_redirect(&original).await.unwrap();
        assert_eq!(resolved.canonical(), original.canonical());
    }

    #[tokio::test]
    async fn redirect_rejects_gsmake_endpoints() {
        let root = TempDir::new().unwrap();
        let vfs = Vfs::new(root.path(), "u1");
        let domain = Domain::task();
        let gsmake_ref = target(&domain, "a/b");
        let other = Ref::new("git", "github.com", "/a/b").with_version("v1");
        assert!(vfs.redirect(gsmake_ref, other, true).await.is_err());
    }

    #[tokio::test]
    async fn protocol_falls_back_to_git() {
        let root = TempDir::new().unwrap();
        let vfs = Vfs::new(root.path(), "u1");
        assert_eq!(vfs.protocol("unknown-host.example").await.unwrap(), "git");
        assert_eq!(vfs.protocol("github.com").await.unwrap(), "git");
    }

    #[tokio::test]
    async fn protocol_sees_a_non_default_seeded_site_on_first_call() {
        let root = TempDir::new().unwrap();
        let vfs = Vfs::new(root.path(), "u1");

        let mut seeded = SiteIndex::new();
        seeded.insert(
            "example.hg".to_string(),
            Site {
                scm: "hg".to_string(),
                url_template: "https://${host_and_path}".to_string(),
                name_pattern: "^(?P<host_and_path>.*)$".to_string(),
            },
        );
        vfs.store
            .with_lock(|txn| txn.write("sites", &seeded))
            .await
            .unwrap();

        // `protocol` must consult the same lazily-seeded table `resolve_remote`
        // does, not a second direct read that would miss a site written before
        // the defaults were ever seeded.
        assert_eq!(vfs.protocol("example.hg").await.unwrap(), "hg");
    }
}
