//! Pure, I/O-free path and naming policy (spec §4.A).
//!
//! Every function here is a deterministic string/path computation. No file is
//! read or written in this crate; callers in `gsmake-store` and `gsmake-vfs`
//! are responsible for turning these paths into actual directories.

mod domain;

pub use domain::{Domain, DomainSet, DEFAULT_DOMAINS, TASK_DOMAIN};

use std::path::{Path, PathBuf};

/// `<root>/userspace/<id>`
pub fn userspace_dir(root: impl AsRef<Path>, userspace_id: impl AsRef<str>) -> PathBuf {
    root.as_ref().join("userspace").join(userspace_id.as_ref())
}

/// `<userspace_dir>/<domain>/src/<name>`
///
/// The domain segment sits above `src/` so that the whole domain subtree
/// (`<userspace_dir>/<domain>`) can be handed to a tool invocation as a single
/// search root.
pub fn mount_path(userspace_dir: impl AsRef<Path>, domain: &Domain, name: impl AsRef<str>) -> PathBuf {
    userspace_dir
        .as_ref()
        .join(domain.as_str())
        .join("src")
        .join(name.as_ref())
}

/// `<root>/cache/<scheme>/<name>`
pub fn cache_path(root: impl AsRef<Path>, scheme: impl AsRef<str>, name: impl AsRef<str>) -> PathBuf {
    root.as_ref()
        .join("cache")
        .join(scheme.as_ref())
        .join(name.as_ref())
}

/// `<userspace_dir>/<domain>/tmp`
pub fn tmp_dir(userspace_dir: impl AsRef<Path>, domain: &Domain) -> PathBuf {
    userspace_dir.as_ref().join(domain.as_str()).join("tmp")
}

/// `<root>/.db`
pub fn metadata_dir(root: impl AsRef<Path>) -> PathBuf {
    root.as_ref().join(".db")
}

/// `<root>/.db/locker`
pub fn lock_file(root: impl AsRef<Path>) -> PathBuf {
    metadata_dir(root).join("locker")
}

/// `<root>/.db/<name>.id`
pub fn index_file(root: impl AsRef<Path>, index_name: impl AsRef<str>) -> PathBuf {
    metadata_dir(root).join(format!("{}.id", index_name.as_ref()))
}

/// The name a mount entry is keyed by within a userspace's mount index:
/// `"<domain>/<name>"`.
pub fn mount_key(domain: &Domain, name: impl AsRef<str>) -> String {
    format!("{}/{}", domain.as_str(), name.as_ref())
}

/// The key a populated cache is registered under: `"<scheme>://<name>"`.
pub fn cache_key(scheme: impl AsRef<str>, name: impl AsRef<str>) -> String {
    format!("{}://{}", scheme.as_ref(), name.as_ref())
}

/// The reserved package version meaning "default branch / head".
pub const CURRENT_VERSION: &str = "current";

/// The implementation-defined anonymous package name used when a project has
/// no manifest of its own.
pub const ANONYMOUS_PACKAGE: &str = "gsmake.anonymous";

/// The pinned self-hosting bootstrap package, force-loaded into the `task`
/// domain of every project so that built-in tasks (`update`, `cache`,
/// `setup`, `list`, ...) are always available.
pub const BOOTSTRAP_PACKAGE_NAME: &str = "github.com/gsmake/gsmake-builtins";
pub const BOOTSTRAP_PACKAGE_VERSION: &str = "v1";
pub const BOOTSTRAP_PACKAGE_SCM: &str = "git";

/// True if `path` is (or is under) the OS temp directory. Used to identify
/// userspaces that back ad-hoc/anonymous invocations so they can be
/// garbage-collected on the next coordinator start.
pub fn is_under_temp_dir(path: impl AsRef<Path>) -> bool {
    let temp = std::env::temp_dir();
    let temp = temp.canonicalize().unwrap_or(temp);
    let path = path.as_ref();
    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    path.starts_with(&temp)
}
