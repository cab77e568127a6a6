use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use gsmake_loader::{Package, MANIFEST_FILENAME};
use gsmake_paths::Domain;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::group::{Mark, TaskGroup};
use crate::task::TaskSpec;

/// Hosts the task DAG and the services task bodies are invoked with.
/// Constructed once by the generated driver's `main`,
/// populated via [`Runner::register`], then driven by [`Runner::run`].
pub struct Runner {
    name: String,
    start_dir: PathBuf,
    rootfs: PathBuf,
    groups: Vec<TaskGroup>,
    index: HashMap<String, usize>,
    dcg_stack: Vec<String>,
}

impl Runner {
    pub fn new(name: impl Into<String>, root_path: PathBuf, userspace_path: PathBuf) -> Self {
        Self {
            name: name.into(),
            start_dir: root_path,
            rootfs: userspace_path,
            groups: Vec::new(),
            index: HashMap::new(),
            dcg_stack: Vec::new(),
        }
    }

    /// The project name passed at generation time.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The directory the coordinator was invoked against.
    pub fn start_dir(&self) -> &Path {
        &self.start_dir
    }

    /// The userspace root every domain's mounted tree lives under.
    pub fn rootfs(&self) -> &Path {
        &self.rootfs
    }

    /// The mounted source path of `name` within `domain`'s tree, whether or
    /// not anything is actually mounted there.
    pub fn path(&self, domain: &str, name: &str) -> Option<PathBuf> {
        let domain = Domain::new(domain).ok()?;
        Some(gsmake_paths::mount_path(&self.rootfs, &domain, name))
    }

    /// Reads a dotted property path out of `package`'s manifest within
    /// `domain`. `None` if the manifest is missing, malformed, or the path
    /// doesn't resolve.
    pub fn property<T: serde::de::DeserializeOwned>(&self, domain: &str, package: &str, path: &str) -> Option<T> {
        let root = self.path(domain, package)?;
        let text = std::fs::read_to_string(root.join(MANIFEST_FILENAME))
            .map_err(|e| debug!(package, domain, error = %e, "no manifest to read property from"))
            .ok()?;
        let manifest = Package::parse(&text)
            .map_err(|e| warn!(package, domain, error = %e, "malformed manifest"))
            .ok()?;
        manifest.property(path)
    }

    /// The SCM that governs the invoking project's own root, inferred from
    /// its working tree. Underlying protocol details are out of scope
    /// beyond this identification.
    pub fn scm(&self) -> &'static str {
        if self.start_dir.join(".git").exists() {
            "git"
        } else {
            "file"
        }
    }

    /// Registers one package's contribution to a task, creating the task's
    /// group on first use.
    pub fn register(&mut self, spec: TaskSpec) {
        let idx = *self.index.entry(spec.name.clone()).or_insert_with(|| {
            self.groups.push(TaskGroup::new(spec.name.clone()));
            self.groups.len() - 1
        });
        self.groups[idx].group.push(spec);
    }

    /// Prints every registered task name, one per line.
    pub fn print_task_list(&self) {
        for group in &self.groups {
            println!("{}", group.name);
        }
    }

    /// Resolves `task` (optionally `domain:task`) to a topological order over
    /// its predecessor chain, then invokes each group's contributions in
    /// insertion order. The first error halts the run.
    #[instrument(skip(self, args), fields(task = %task))]
    pub fn run(&mut self, task: &str, args: &[String]) -> Result<()> {
        let (domain_filter, task_name) = match task.split_once(':') {
            Some((d, n)) => (Some(d.to_string()), n.to_string()),
            None => (None, task.to_string()),
        };

        let order = self.topo_sort(&task_name)?;
        for idx in order {
            self.invoke_group(idx, domain_filter.as_deref(), args)?;
        }
        Ok(())
    }

    fn topo_sort(&mut self, start: &str) -> Result<Vec<usize>> {
        for group in &mut self.groups {
            group.mark = Mark::White;
        }
        self.dcg_stack.clear();

        let idx = *self.index.get(start).ok_or_else(|| Error::Unregistered(start.to_string()))?;
        self.visit(idx)
    }

    /// Depth-first visit with white/gray/black coloring. Predecessors come
    /// from every contributing task's `prev` field, visited once per
    /// contribution (duplicates are harmless: a black node returns
    /// immediately).
    fn visit(&mut self, idx: usize) -> Result<Vec<usize>> {
        match self.groups[idx].mark {
            Mark::Black => return Ok(Vec::new()),
            Mark::Gray => {
                let name = self.groups[idx].name.clone();
                let pos = self.dcg_stack.iter().position(|n| n == &name).unwrap_or(0);
                let mut chain = self.dcg_stack[pos..].to_vec();
                chain.push(name);
                return Err(Error::Cycle(chain.join(" -> ")));
            }
            Mark::White => {}
        }

        self.groups[idx].mark = Mark::Gray;
        self.dcg_stack.push(self.groups[idx].name.clone());

        let prevs: Vec<String> = self.groups[idx]
            .group
            .iter()
            .map(|t| t.prev.clone())
            .filter(|p| !p.is_empty())
            .collect();

        let mut order = Vec::new();
        for prev in prevs {
            let pidx = match self.index.get(&prev) {
                Some(&i) => i,
                None => {
                    self.dcg_stack.pop();
                    return Err(Error::UnknownPrev {
                        referenced: prev,
                        by: self.groups[idx].name.clone(),
                    });
                }
            };
            order.extend(self.visit(pidx)?);
        }

        self.groups[idx].mark = Mark::Black;
        self.dcg_stack.pop();
        order.push(idx);
        Ok(order)
    }

    fn invoke_group(&self, idx: usize, domain_filter: Option<&str>, args: &[String]) -> Result<()> {
        for task in &self.groups[idx].group {
            if !task.matches_domain(domain_filter) {
                debug!(task = %task.name, domain = %task.domain, package = %task.package, "skipped (domain filter)");
                continue;
            }
            let start = Instant::now();
            (task.func)(self, args)?;
            info!(task = %task.name, package = %task.package, elapsed = ?start.elapsed(), "task completed");
        }
        Ok(())
    }
}
