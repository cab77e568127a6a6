use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_recursion::async_recursion;
use tracing::{debug, info, instrument, trace, warn};

use gsmake_paths::{
    Domain, DomainSet, ANONYMOUS_PACKAGE, BOOTSTRAP_PACKAGE_NAME, BOOTSTRAP_PACKAGE_SCM,
    BOOTSTRAP_PACKAGE_VERSION,
};
use gsmake_vfs::{FILE_SCHEME, GSMAKE_SCHEME};

use crate::error::{Error, Result};
use crate::manifest::{Package, MANIFEST_FILENAME};

/// `(name, domain)` -- the loader's primary key. A loaded package's
/// `(name, domain)` appears at most once.
pub type PackageKey = (String, String);

/// A [`Package`] augmented with resolution metadata.
#[derive(Debug, Clone)]
pub struct LoadedPackage {
    pub manifest: Package,
    pub version_resolved: String,
    pub load_path: Vec<String>,
}

fn key(name: &str, domain: &Domain) -> PackageKey {
    (name.to_string(), domain.as_str().to_string())
}

/// Resolves a project's transitive import closure across domains.
pub struct Loader<'a> {
    vfs: &'a gsmake_vfs::Vfs,
    userspace_dir: PathBuf,
    loaded: BTreeMap<PackageKey, LoadedPackage>,
}

impl<'a> Loader<'a> {
    pub fn new(vfs: &'a gsmake_vfs::Vfs, userspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            vfs,
            userspace_dir: userspace_dir.into(),
            loaded: BTreeMap::new(),
        }
    }

    /// Loads `root_manifest`, rooted at `root_path` on the native
    /// filesystem, recursively resolving its transitive import closure for
    /// every domain in its domain list (always including `"task"`), then
    /// force-loads the self-hosting bootstrap package and garbage-collects
    /// stale mounts.
    #[instrument(skip(self, root_manifest), fields(root = %root_name))]
    pub async fn load(
        mut self,
        root_name: &str,
        root_path: &Path,
        root_manifest: Package,
    ) -> Result<BTreeMap<PackageKey, LoadedPackage>> {
        let domains = if root_manifest.domain.is_empty() {
            DomainSet::default_set()
        } else {
            DomainSet::parse(&root_manifest.domain)
                .map_err(|e| Error::Load(format!("'{root_name}': {e}")))?
                .with_task()
        };

        for domain in domains.iter() {
            self.load_root(root_name, root_path, &root_manifest, domain)
                .await?;
        }

        if domains.contains(&Domain::task()) {
            self.force_load_bootstrap().await?;
        }

        self.gc_stale_mounts().await?;
        Ok(self.loaded)
    }

    async fn load_root(
        &mut self,
        root_name: &str,
        root_path: &Path,
        root_manifest: &Package,
        domain: &Domain,
    ) -> Result<()> {
        let k = key(root_name, domain);
        if self.loaded.contains_key(&k) {
            return Ok(());
        }

        let target = gsmake_vfs::Ref::new(GSMAKE_SCHEME, "", format!("/{root_name}"))
            .with_domain(domain.clone());
        let src = gsmake_vfs::Ref::new(FILE_SCHEME, "", root_path.to_string_lossy().to_string());
        self.vfs.mount(src, target).await?;

        info!(domain = %domain, "mounted root package");
        self.loaded.insert(
            k,
            LoadedPackage {
                manifest: root_manifest.clone(),
                version_resolved: gsmake_paths::CURRENT_VERSION.to_string(),
                load_path: vec![root_name.to_string()],
            },
        );

        let mut stack = vec![root_name.to_string()];
        for import in &root_manifest.import {
            self.load_import(import, domain, &mut stack).await?;
        }
        Ok(())
    }

    /// Walks one import edge depth-first, holding the DCG check stack.
    /// `stack` names the current chain of ancestors;
    /// a redirect hop does not push an extra frame onto it.
    #[async_recursion]
    async fn load_import(
        &mut self,
        import: &crate::manifest::Import,
        parent_domain: &Domain,
        stack: &mut Vec<String>,
    ) -> Result<()> {
        if let Some(declared) = &import.domain {
            let declared = DomainSet::parse(declared)
                .map_err(|e| Error::Load(format!("'{}': {e}", import.name)))?;
            if !declared.contains(parent_domain) {
                trace!(name = %import.name, domain = %parent_domain, "import does not participate in this domain, skipping");
                return Ok(());
            }
        }

        let version = import
            .version
            .clone()
            .unwrap_or_else(|| gsmake_paths::CURRENT_VERSION.to_string());

        // A name already on the DCG stack is a cycle regardless of whether
        // it also happens to be present in `loaded` -- a package is
        // inserted into `loaded` as soon as its own manifest is parsed,
        // before its imports are walked, so an in-progress ancestor is
        // visible in both places at once.
        if stack.iter().any(|n| n == &import.name) {
            return Err(Error::Load(format!(
                "circular package import: {}",
                join_path(stack, &import.name)
            )));
        }

        let k = key(&import.name, parent_domain);
        if let Some(existing) = self.loaded.get(&k) {
            if existing.version_resolved != version {
                return Err(Error::Load(format!(
                    "version conflict for '{}' (domain '{}'): '{}' via [{}] vs '{}' via [{}]",
                    import.name,
                    parent_domain,
                    existing.version_resolved,
                    existing.load_path.join(" -> "),
                    version,
                    join_path(stack, &import.name),
                )));
            }
            trace!(name = %import.name, "already loaded at matching version, skipping");
            return Ok(());
        }

        stack.push(import.name.clone());
        let result = self
            .mount_and_recurse(&import.name, &version, import.scm.as_deref(), parent_domain, stack)
            .await;
        stack.pop();
        result
    }

    async fn mount_and_recurse(
        &mut self,
        name: &str,
        version: &str,
        scm: Option<&str>,
        domain: &Domain,
        stack: &mut Vec<String>,
    ) -> Result<()> {
        let (host, path) = split_name(name);
        let scm = match scm {
            Some(s) => s.to_string(),
            None => self.vfs.protocol(host).await?,
        };

        let target = gsmake_vfs::Ref::new(GSMAKE_SCHEME, "", format!("/{name}")).with_domain(domain.clone());
        let mut src = gsmake_vfs::Ref::new(scm.clone(), host, path).with_version(version);

        let manifest = loop {
            debug!(name, %scm, version, "mounting import");
            self.vfs.mount(src.clone(), target.clone()).await?;
            let manifest = self.read_manifest(domain, name).await?;
            match &manifest.redirect {
                Some(to) => {
                    trace!(name, to, "following manifest redirect");
                    src = gsmake_vfs::Ref::parse(to)?;
                }
                None => break manifest,
            }
        };

        info!(name, domain = %domain, "loaded package");
        self.loaded.insert(
            key(name, domain),
            LoadedPackage {
                manifest: manifest.clone(),
                version_resolved: version.to_string(),
                load_path: stack.clone(),
            },
        );

        for import in &manifest.import {
            self.load_import(import, domain, stack).await?;
        }
        Ok(())
    }

    async fn read_manifest(&self, domain: &Domain, name: &str) -> Result<Package> {
        let mount_root = gsmake_paths::mount_path(&self.userspace_dir, domain, name);
        let manifest_path = mount_root.join(MANIFEST_FILENAME);
        let text = match gsmake_support::fs::read_to_string(&manifest_path).await {
            Ok(text) => text,
            Err(_) => {
                trace!(name, "no manifest present, treating as leaf package");
                return Ok(Package::anonymous(name));
            }
        };
        Package::parse(&text).map_err(|source| Error::Manifest {
            path: manifest_path.to_string_lossy().to_string(),
            source,
        })
    }

    /// Force-loads the self-hosting bootstrap package into the `task`
    /// domain if it has not already been reached through the ordinary
    /// import graph.
    async fn force_load_bootstrap(&mut self) -> Result<()> {
        let task = Domain::task();
        if self.loaded.contains_key(&key(BOOTSTRAP_PACKAGE_NAME, &task)) {
            return Ok(());
        }
        info!(package = BOOTSTRAP_PACKAGE_NAME, "force-loading self-hosting bootstrap package");
        let mut stack = Vec::new();
        self.mount_and_recurse(
            BOOTSTRAP_PACKAGE_NAME,
            BOOTSTRAP_PACKAGE_VERSION,
            Some(BOOTSTRAP_PACKAGE_SCM),
            &task,
            &mut stack,
        )
        .await
    }

    /// Dismounts every mount entry whose `(name, domain)` is not in the
    /// loaded-package table.
    async fn gc_stale_mounts(&self) -> Result<()> {
        let mut stale = Vec::new();
        self.vfs
            .list(|entry| {
                let domain = entry
                    .target
                    .domain
                    .clone()
                    .map(|d| d.as_str().to_string())
                    .unwrap_or_default();
                let name = entry.target.name();
                if !self.loaded.contains_key(&(name.clone(), domain)) {
                    stale.push(entry.target.clone());
                }
                true
            })
            .await?;

        for target in stale {
            warn!(target = %target.canonical(), "dismounting stale mount");
            self.vfs.dismount(target).await?;
        }
        Ok(())
    }
}

fn split_name(name: &str) -> (&str, &str) {
    match name.split_once('/') {
        Some((host, rest)) => (host, rest),
        None => (name, ""),
    }
}

fn join_path(stack: &[String], last: &str) -> String {
    let mut parts = stack.to_vec();
    parts.push(last.to_string());
    parts.join(" -> ")
}

/// Synthesizes the minimal manifest used for manifest-less invocations.
pub fn synthesize_anonymous_manifest() -> Package {
    Package::anonymous(ANONYMOUS_PACKAGE)
}
