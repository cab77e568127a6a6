//! Recursive resolution of a project's manifest and its transitive import
//! graph across domains.

mod error;
mod loader;
mod manifest;

pub use error::{Error, Result};
pub use loader::{synthesize_anonymous_manifest, LoadedPackage, Loader, PackageKey};
pub use manifest::{Import, Package, TaskDecl, MANIFEST_FILENAME};

#[cfg(test)]
mod test {
    use super::*;
    use gsmake_paths::Domain;
    use gsmake_vfs::{Vfs, FILE_SCHEME};
    use tempfile::TempDir;

    async fn write_manifest(dir: &std::path::Path, contents: &str) {
        tokio::fs::write(dir.join(MANIFEST_FILENAME), contents)
            .await
            .unwrap();
    }

    /// Every `load()` call force-loads the self-hosting bootstrap package
    /// into the `task` domain. Tests redirect its real `git` source onto a
    /// local fixture so loading stays offline and deterministic.
    async fn stub_bootstrap(vfs: &Vfs) -> TempDir {
        use gsmake_paths::{BOOTSTRAP_PACKAGE_NAME, BOOTSTRAP_PACKAGE_VERSION};

        let fixture = TempDir::new().unwrap();
        write_manifest(
            fixture.path(),
            &format!(r#"{{"name":"{BOOTSTRAP_PACKAGE_NAME}","domain":"task"}}"#),
        )
        .await;

        let (host, path) = BOOTSTRAP_PACKAGE_NAME.split_once('/').unwrap();
        let src = gsmake_vfs::Ref::new("git", host, format!("/{path}")).with_version(BOOTSTRAP_PACKAGE_VERSION);
        let real = gsmake_vfs::Ref::new(FILE_SCHEME, "", fixture.path().to_str().unwrap());
        vfs.redirect(src, real, true).await.unwrap();
        fixture
    }

    #[tokio::test]
    async fn loads_a_single_package_with_no_imports() {
        let store_root = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        write_manifest(
            project.path(),
            r#"{"name":"local/p","domain":"task","task":{"hello":{"prev":"","description":"hi"}}}"#,
        )
        .await;

        let vfs = Vfs::new(store_root.path(), "u1");
        let _bootstrap = stub_bootstrap(&vfs).await;
        let loader = Loader::new(&vfs, vfs.userspace_dir());
        let root_manifest = Package::parse(
            &tokio::fs::read_to_string(project.path().join(MANIFEST_FILENAME))
                .await
                .unwrap(),
        )
        .unwrap();

        let loaded = loader
            .load("local/p", project.path(), root_manifest)
            .await
            .unwrap();

        assert!(loaded.contains_key(&("local/p".to_string(), "task".to_string())));
        assert!(loaded.contains_key(&(
            gsmake_paths::BOOTSTRAP_PACKAGE_NAME.to_string(),
            "task".to_string()
        )));
    }

    #[tokio::test]
    async fn detects_import_cycle() {
        let store_root = TempDir::new().unwrap();
        let proj_p = TempDir::new().unwrap();
        let proj_q = TempDir::new().unwrap();

        write_manifest(
            proj_p.path(),
            &format!(
                r#"{{"name":"local/p","domain":"task","import":[{{"name":"local/q","version":"current","scm":"file"}}]}}"#
            ),
        )
        .await;
        write_manifest(
            proj_q.path(),
            r#"{"name":"local/q","domain":"task","import":[{"name":"local/p","version":"current","scm":"file"}]}"#,
        )
        .await;

        let vfs = Vfs::new(store_root.path(), "u2");
        // `local/q`'s import declares `scm: file`, which the `file` driver
        // interprets as a literal local path -- redirect it onto the real
        // fixture directory so the mount actually succeeds and its manifest
        // (which imports `local/p` right back) gets read.
        let q_src = gsmake_vfs::Ref::new(FILE_SCHEME, "local", "/q").with_version("current");
        let q_real = gsmake_vfs::Ref::new(FILE_SCHEME, "", proj_q.path().to_str().unwrap());
        vfs.redirect(q_src, q_real, true).await.unwrap();

        let loader = Loader::new(&vfs, vfs.userspace_dir());
        let root_manifest = Package::parse(
            &tokio::fs::read_to_string(proj_p.path().join(MANIFEST_FILENAME))
                .await
                .unwrap(),
        )
        .unwrap();

        let err = loader
            .load("local/p", proj_p.path(), root_manifest)
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("circular package import"), "{message}");
    }

    #[test]
    fn domain_key_helper_round_trips() {
        let d = Domain::task();
        assert_eq!(d.as_str(), "task");
    }

    #[tokio::test]
    async fn version_conflict_reports_both_load_paths() {
        let store_root = TempDir::new().unwrap();
        let proj_p = TempDir::new().unwrap();
        let proj_x = TempDir::new().unwrap();
        let proj_y = TempDir::new().unwrap();

        // Root imports `local/x@v1` directly, and `local/y`, whose own
        // manifest imports `local/x@v2` -- two paths reaching the same
        // `(name, domain)` at different versions.
        write_manifest(
            proj_p.path(),
            r#"{"name":"local/p","domain":"task","import":[
                {"name":"local/x","version":"v1","scm":"file"},
                {"name":"local/y","version":"current","scm":"file"}
            ]}"#,
        )
        .await;
        write_manifest(proj_x.path(), r#"{"name":"local/x","domain":"task"}"#).await;
        write_manifest(
            proj_y.path(),
            r#"{"name":"local/y","domain":"task","import":[
                {"name":"local/x","version":"v2","scm":"file"}
            ]}"#,
        )
        .await;

        let vfs = Vfs::new(store_root.path(), "u3");
        let _bootstrap = stub_bootstrap(&vfs).await;

        let x_src = gsmake_vfs::Ref::new(FILE_SCHEME, "local", "/x").with_version("v1");
        let x_real = gsmake_vfs::Ref::new(FILE_SCHEME, "", proj_x.path().to_str().unwrap());
        vfs.redirect(x_src, x_real, true).await.unwrap();

        let y_src = gsmake_vfs::Ref::new(FILE_SCHEME, "local", "/y").with_version("current");
        let y_real = gsmake_vfs::Ref::new(FILE_SCHEME, "", proj_y.path().to_str().unwrap());
        vfs.redirect(y_src, y_real, true).await.unwrap();

        let loader = Loader::new(&vfs, vfs.userspace_dir());
        let root_manifest = Package::parse(
            &tokio::fs::read_to_string(proj_p.path().join(MANIFEST_FILENAME))
                .await
                .unwrap(),
        )
        .unwrap();

        let err = loader
            .load("local/p", proj_p.path(), root_manifest)
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("version conflict"), "{message}");
        assert!(message.contains("local/p -> local/x"), "{message}");
        assert!(message.contains("local/p -> local/y -> local/x"), "{message}");
    }

    #[tokio::test]
    async fn a_second_load_with_a_shrunk_import_set_gcs_the_dropped_mount() {
        let store_root = TempDir::new().unwrap();
        let proj_p = TempDir::new().unwrap();
        let proj_a = TempDir::new().unwrap();
        let proj_b = TempDir::new().unwrap();

        write_manifest(proj_a.path(), r#"{"name":"local/a","domain":"task"}"#).await;
        write_manifest(proj_b.path(), r#"{"name":"local/b","domain":"task"}"#).await;

        let vfs = Vfs::new(store_root.path(), "u4");
        let _bootstrap = stub_bootstrap(&vfs).await;

        let a_src = gsmake_vfs::Ref::new(FILE_SCHEME, "local", "/a").with_version("current");
        let a_real = gsmake_vfs::Ref::new(FILE_SCHEME, "", proj_a.path().to_str().unwrap());
        vfs.redirect(a_src, a_real, true).await.unwrap();

        let b_src = gsmake_vfs::Ref::new(FILE_SCHEME, "local", "/b").with_version("current");
        let b_real = gsmake_vfs::Ref::new(FILE_SCHEME, "", proj_b.path().to_str().unwrap());
        vfs.redirect(b_src, b_real, true).await.unwrap();

        write_manifest(
            proj_p.path(),
            r#"{"name":"local/p","domain":"task","import":[
                {"name":"local/a","version":"current","scm":"file"},
                {"name":"local/b","version":"current","scm":"file"}
            ]}"#,
        )
        .await;
        let first_manifest = Package::parse(
            &tokio::fs::read_to_string(proj_p.path().join(MANIFEST_FILENAME))
                .await
                .unwrap(),
        )
        .unwrap();
        Loader::new(&vfs, vfs.userspace_dir())
            .load("local/p", proj_p.path(), first_manifest)
            .await
            .unwrap();

        let mut mounted_names = std::collections::BTreeSet::new();
        vfs.list(|entry| {
            mounted_names.insert(entry.target.name());
            true
        })
        .await
        .unwrap();
        assert!(mounted_names.contains("local/a"));
        assert!(mounted_names.contains("local/b"));

        // Second run: same project, manifest now references only `a`.
        write_manifest(
            proj_p.path(),
            r#"{"name":"local/p","domain":"task","import":[
                {"name":"local/a","version":"current","scm":"file"}
            ]}"#,
        )
        .await;
        let second_manifest = Package::parse(
            &tokio::fs::read_to_string(proj_p.path().join(MANIFEST_FILENAME))
                .await
                .unwrap(),
        )
        .unwrap();
        let loaded = Loader::new(&vfs, vfs.userspace_dir())
            .load("local/p", proj_p.path(), second_manifest)
            .await
            .unwrap();

        let mut mounted_names = std::collections::BTreeSet::new();
        vfs.list(|entry| {
            mounted_names.insert(entry.target.name());
            true
        })
        .await
        .unwrap();
        assert!(mounted_names.contains("local/a"));
        assert!(!mounted_names.contains("local/b"));

        // Every remaining mount entry corresponds to exactly one loaded
        // package, and vice versa.
        assert_eq!(mounted_names.len(), loaded.len());
    }
}
