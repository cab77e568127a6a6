use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, info, instrument};

use gsmake_loader::{synthesize_anonymous_manifest, Import, Loader, Package, MANIFEST_FILENAME};
use gsmake_store::Store;
use gsmake_vfs::Vfs;

use crate::cli::Args;

/// The `gsmake-runner` crate the generated driver links against: a sibling
/// of this binary crate within the workspace.
const RUNNER_CRATE_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../crates/gsmake-runner");

/// Glues components A-G: bootstraps the VFS, loads the import graph,
/// generates the task driver, then runs it.
#[instrument(skip(args))]
pub async fn run(args: Args) -> Result<()> {
    let root = resolve_root(&args)?;
    let project_path = std::env::current_dir().context("unable to determine current directory")?;

    let store = Store::new(&root);
    gsmake_vfs::purge_temp_bound(&store)
        .await
        .context("unable to purge temp-bound userspaces")?;

    let userspace_id = gsmake_vfs::allocate_userspace(&store, &project_path)
        .await
        .context("unable to allocate userspace")?;
    let vfs = Vfs::new(&root, &userspace_id);

    if args.clear {
        info!("clearing resolved userspace");
        vfs.clear().await.context("unable to clear userspace")?;
    }

    let mut manifest = read_project_manifest(&project_path).await?;
    for json in &args.imports {
        let import: Import =
            serde_json::from_str(json).with_context(|| format!("malformed -I import '{json}'"))?;
        manifest.import.push(import);
    }

    let project_name = if manifest.name.is_empty() {
        project_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| manifest.name.clone())
    } else {
        manifest.name.clone()
    };

    debug!(project = %project_name, userspace = %userspace_id, "loading import graph");
    let loader = Loader::new(&vfs, vfs.userspace_dir());
    let loaded = loader
        .load(&project_name, &project_path, manifest)
        .await
        .context("unable to load import graph")?;

    let generator = gsmake_generator::Generator::new(RUNNER_CRATE_PATH);
    let driver = generator
        .generate(&loaded, &project_name, &project_path, vfs.userspace_dir())
        .await
        .context("unable to generate task driver")?;

    run_driver(&driver, &args).await
}

fn resolve_root(args: &Args) -> Result<PathBuf> {
    args.root
        .clone()
        .ok_or_else(|| anyhow::anyhow!("a metadata root is required: pass --root or set $GSMAKE_HOME"))
}

async fn read_project_manifest(project_path: &Path) -> Result<Package> {
    let manifest_path = project_path.join(MANIFEST_FILENAME);
    match gsmake_support::fs::read_to_string(&manifest_path).await {
        Ok(text) => Package::parse(&text)
            .with_context(|| format!("malformed manifest at '{}'", manifest_path.display())),
        Err(_) => {
            debug!("no project manifest, using the anonymous project");
            Ok(synthesize_anonymous_manifest())
        }
    }
}

#[instrument(skip(args))]
async fn run_driver(driver: &Path, args: &Args) -> Result<()> {
    let mut cmd = tokio::process::Command::new(driver);
    if args.verbose {
        cmd.arg("-v");
    }
    if let Some(task) = &args.task {
        cmd.arg(task);
        cmd.args(&args.args);
    }

    let status = cmd.status().await.context("unable to run task driver")?;
    if !status.success() {
        bail!("task driver exited with status {}", status.code().unwrap_or(1));
    }
    Ok(())
}
