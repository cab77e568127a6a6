use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde_json::json;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use gsmake_loader::{LoadedPackage, PackageKey};
use gsmake_paths::Domain;
use gsmake_support::process::exec_log;

use crate::error::{Error, Result};

const TEMPLATE_CARGO_TOML: &str = include_str!("../templates/cargo_toml.hbs");
const TEMPLATE_ENTRY_POINT: &str = include_str!("../templates/entry_point.rs.hbs");
const TEMPLATE_REGISTRATION: &str = include_str!("../templates/registration.rs.hbs");
const TEMPLATE_REGISTRATIONS_MOD: &str = include_str!("../templates/registrations_mod.rs.hbs");

/// The name every generated driver binary is built under
/// (`<userspace>/task/tmp/runner[.exe]`, ).
#[cfg(windows)]
const DRIVER_BINARY_NAME: &str = "runner.exe";
#[cfg(not(windows))]
const DRIVER_BINARY_NAME: &str = "runner";

/// Builds a native task driver from a loaded package set.
pub struct Generator {
    engine: Handlebars<'static>,
    /// Absolute path to the `gsmake-runner` crate the generated driver links
    /// against. The coordinator supplies this (its own install location);
    /// conventionally its own `CARGO_MANIFEST_DIR`-relative sibling.
    runner_crate_path: PathBuf,
}

impl Generator {
    pub fn new(runner_crate_path: impl Into<PathBuf>) -> Self {
        let mut engine = Handlebars::new();
        engine.set_strict_mode(true);
        engine
            .register_template_string("cargo_toml", TEMPLATE_CARGO_TOML)
            .expect("built-in template is valid");
        engine
            .register_template_string("entry_point", TEMPLATE_ENTRY_POINT)
            .expect("built-in template is valid");
        engine
            .register_template_string("registration", TEMPLATE_REGISTRATION)
            .expect("built-in template is valid");
        engine
            .register_template_string("registrations_mod", TEMPLATE_REGISTRATIONS_MOD)
            .expect("built-in template is valid");
        Self {
            engine,
            runner_crate_path: runner_crate_path.into(),
        }
    }

    /// Renders, formats, and compiles the driver, returning the path to the
    /// resulting executable.
    #[instrument(skip(self, loaded), fields(project = %project_name))]
    pub async fn generate(
        &self,
        loaded: &BTreeMap<PackageKey, LoadedPackage>,
        project_name: &str,
        root_path: &Path,
        userspace_dir: &Path,
    ) -> Result<PathBuf> {
        let task = Domain::task();
        let source_root = gsmake_paths::mount_path(userspace_dir, &task, "runner");
        let tmp_dir = gsmake_paths::tmp_dir(userspace_dir, &task);

        gsmake_support::fs::remove_dir_all(&source_root)
            .await
            .map_err(Error::Io)?;
        gsmake_support::fs::create_dir_all(&source_root)
            .await
            .map_err(Error::Io)?;
        gsmake_support::fs::create_dir_all(&tmp_dir)
            .await
            .map_err(Error::Io)?;

        let contributors = task_contributors(loaded, userspace_dir);

        self.render_cargo_toml(&source_root, &contributors).await?;
        self.render_entry_point(&source_root, project_name, root_path, userspace_dir)
            .await?;
        self.render_registrations(&source_root, &contributors).await?;

        let mut dir = tokio::fs::read_dir(&source_root)
            .await
            .map_err(|e| Error::Io(anyhow::anyhow!(e)))?;
        while let Some(entry) = dir.next_entry().await.map_err(|e| Error::Io(anyhow::anyhow!(e)))? {
            if entry.path().extension().and_then(|e| e.to_str()) == Some("rs") {
                self.format_source(&entry.path()).await?;
            }
        }

        self.compile(&source_root, &tmp_dir, userspace_dir).await
    }

    async fn render_cargo_toml(&self, source_root: &Path, contributors: &[Contributor]) -> Result<()> {
        let package_deps: Vec<_> = contributors
            .iter()
            .map(|c| json!({"crate_name": c.crate_name, "path": c.path.to_string_lossy()}))
            .collect();
        let rendered = self.engine.render(
            "cargo_toml",
            &json!({
                "runner_crate_path": self.runner_crate_path.to_string_lossy(),
                "package_deps": package_deps,
            }),
        )?;
        gsmake_support::fs::write(source_root.join("Cargo.toml"), rendered)
            .await
            .map_err(Error::Io)
    }

    async fn render_entry_point(
        &self,
        source_root: &Path,
        project_name: &str,
        root_path: &Path,
        userspace_dir: &Path,
    ) -> Result<()> {
        let rendered = self.engine.render(
            "entry_point",
            &json!({
                "project_name": project_name,
                "root_path": root_path.to_string_lossy(),
                "userspace_path": userspace_dir.to_string_lossy(),
            }),
        )?;
        gsmake_support::fs::write(source_root.join("main.rs"), rendered)
            .await
            .map_err(Error::Io)
    }

    async fn render_registrations(&self, source_root: &Path, contributors: &[Contributor]) -> Result<()> {
        let mut modules = Vec::new();
        for c in contributors {
            let module_name = format!("register_{}", c.crate_ident);
            let tasks: Vec<_> = c
                .tasks
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "prev": t.prev,
                        "domain": t.domain,
                        "fn_ident": t.fn_ident,
                    })
                })
                .collect();
            let rendered = self.engine.render(
                "registration",
                &json!({
                    "package_name": c.package_name,
                    "crate_ident": c.crate_ident,
                    "tasks": tasks,
                }),
            )?;
            gsmake_support::fs::write(source_root.join(format!("{module_name}.rs")), rendered)
                .await
                .map_err(Error::Io)?;
            modules.push(module_name);
        }

        let rendered = self
            .engine
            .render("registrations_mod", &json!({"modules": modules}))?;
        gsmake_support::fs::write(source_root.join("registrations.rs"), rendered)
            .await
            .map_err(Error::Io)
    }

    async fn format_source(&self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), "formatting generated source");
        exec_log(Command::new("rustfmt").arg(path))
            .await
            .map_err(|e| Error::Format(e.to_string()))
    }

    async fn compile(&self, source_root: &Path, tmp_dir: &Path, userspace_dir: &Path) -> Result<PathBuf> {
        let target_dir = tmp_dir.join("target");
        let search_path = userspace_dir.join(Domain::task().as_str());

        let mut cmd = Command::new("cargo");
        cmd.current_dir(source_root)
            .arg("build")
            .arg("--release")
            .arg("--target-dir")
            .arg(&target_dir)
            .env("GSMAKE_TASK_PATH", &search_path);

        info!("compiling generated task driver");
        exec_log(&mut cmd)
            .await
            .map_err(|e| Error::Compile(e.to_string()))?;

        let built = target_dir.join("release").join(DRIVER_BINARY_NAME);
        let dest = tmp_dir.join(DRIVER_BINARY_NAME);
        gsmake_support::fs::remove_file(&dest).await.map_err(Error::Io)?;
        tokio::fs::copy(&built, &dest)
            .await
            .map_err(|e| Error::Compile(format!("unable to stage driver binary: {e}")))?;
        Ok(dest)
    }
}

struct Contributor {
    package_name: String,
    crate_ident: String,
    crate_name: String,
    path: PathBuf,
    tasks: Vec<TaskEntry>,
}

struct TaskEntry {
    name: String,
    description: String,
    prev: String,
    domain: String,
    fn_ident: String,
}

/// Every `task`-domain package with a non-empty `task{}` map.
fn task_contributors(loaded: &BTreeMap<PackageKey, LoadedPackage>, userspace_dir: &Path) -> Vec<Contributor> {
    let task = Domain::task();
    let mut contributors = Vec::new();
    for ((name, domain), lp) in loaded {
        if domain != task.as_str() || lp.manifest.task.is_empty() {
            continue;
        }
        let tasks = lp
            .manifest
            .task
            .iter()
            .map(|(task_name, decl)| TaskEntry {
                name: task_name.clone(),
                description: decl.description.clone(),
                prev: decl.prev.clone(),
                domain: decl
                    .domain
                    .clone()
                    .unwrap_or_else(|| lp.manifest.domain.clone())
                    .to_string(),
                fn_ident: format!("task_{}", sanitize_ident(task_name)),
            })
            .collect();
        contributors.push(Contributor {
            package_name: name.clone(),
            crate_ident: sanitize_ident(name),
            crate_name: sanitize_crate_name(name),
            path: gsmake_paths::mount_path(userspace_dir, &task, name),
            tasks,
        });
    }
    contributors
}

fn sanitize_ident(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

fn sanitize_crate_name(name: &str) -> String {
    sanitize_ident(name).replace('_', "-")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sanitizes_package_names_into_idents_and_crate_names() {
        assert_eq!(sanitize_ident("github.com/u/p"), "github_com_u_p");
        assert_eq!(sanitize_crate_name("github.com/u/p"), "github-com-u-p");
    }
}
