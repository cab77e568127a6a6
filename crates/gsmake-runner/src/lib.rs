//! Task registration, DAG-coloring topological sort, and domain-scoped
//! invocation. Linked into every generated
//! driver binary as well as used at generation time to emit registration
//! calls.

mod error;
mod group;
mod runner;
mod task;

pub use error::{Error, Result};
pub use runner::Runner;
pub use task::{TaskFn, TaskSpec};

#[cfg(test)]
mod test {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static CALLS: AtomicUsize = AtomicUsize::new(0);
    static ORDER: std::sync::Mutex<Vec<&str>> = std::sync::Mutex::new(Vec::new());

    fn reset() {
        CALLS.store(0, Ordering::SeqCst);
        ORDER.lock().unwrap().clear();
    }

    fn record(name: &'static str) -> anyhow::Result<()> {
        CALLS.fetch_add(1, Ordering::SeqCst);
        ORDER.lock().unwrap().push(name);
        Ok(())
    }

    fn task_a(_: &Runner, _: &[String]) -> anyhow::Result<()> {
        record("a")
    }
    fn task_b(_: &Runner, _: &[String]) -> anyhow::Result<()> {
        record("b")
    }
    fn task_c(_: &Runner, _: &[String]) -> anyhow::Result<()> {
        record("c")
    }

    fn new_runner() -> Runner {
        Runner::new("demo", PathBuf::from("/start"), PathBuf::from("/rootfs"))
    }

    fn spec(name: &str, prev: &str, domain: &str, func: TaskFn) -> TaskSpec {
        TaskSpec {
            name: name.to_string(),
            description: String::new(),
            prev: prev.to_string(),
            package: "pkg".to_string(),
            domain: domain.to_string(),
            func,
        }
    }

    #[test]
    fn runs_predecessors_before_the_requested_task() {
        reset();
        let mut runner = new_runner();
        runner.register(spec("a", "", "task", task_a));
        runner.register(spec("b", "a", "task", task_b));
        runner.register(spec("c", "b", "task", task_c));

        runner.run("c", &[]).unwrap();
        assert_eq!(*ORDER.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn detects_a_cycle_and_reports_its_edges() {
        reset();
        let mut runner = new_runner();
        runner.register(spec("a", "b", "task", task_a));
        runner.register(spec("b", "a", "task", task_b));

        let err = runner.run("a", &[]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("DCG detected"));
        assert!(msg.contains("a"));
        assert!(msg.contains("b"));
    }

    #[test]
    fn unknown_prev_is_reported_with_both_names() {
        reset();
        let mut runner = new_runner();
        runner.register(spec("a", "ghost", "task", task_a));

        let err = runner.run("a", &[]).unwrap_err();
        assert!(matches!(err, Error::UnknownPrev { ref referenced, ref by } if referenced == "ghost" && by == "a"));
    }

    #[test]
    fn unregistered_task_is_an_error() {
        reset();
        let mut runner = new_runner();
        runner.register(spec("a", "", "task", task_a));
        assert!(matches!(runner.run("nope", &[]), Err(Error::Unregistered(_))));
    }

    #[test]
    fn domain_prefix_filters_contributions_in_the_same_group() {
        reset();
        let mut runner = new_runner();
        runner.register(spec("build", "", "golang", task_a));
        runner.register(spec("build", "", "node", task_b));

        runner.run("golang:build", &[]).unwrap();
        assert_eq!(*ORDER.lock().unwrap(), vec!["a"]);
    }

    #[test]
    fn domain_all_always_matches() {
        reset();
        let mut runner = new_runner();
        runner.register(spec("build", "", "all", task_a));

        runner.run("golang:build", &[]).unwrap();
        assert_eq!(*ORDER.lock().unwrap(), vec!["a"]);
    }

    #[test]
    fn no_domain_prefix_runs_every_contribution_in_insertion_order() {
        reset();
        let mut runner = new_runner();
        runner.register(spec("build", "", "golang", task_a));
        runner.register(spec("build", "", "node", task_b));

        runner.run("build", &[]).unwrap();
        assert_eq!(*ORDER.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn diamond_dependency_runs_each_predecessor_once() {
        reset();
        let mut runner = new_runner();
        runner.register(spec("a", "", "task", task_a));
        runner.register(spec("b", "a", "task", task_b));
        runner.register(spec("c", "a", "task", task_c));
        runner.register(spec("d", "b", "task", |_, _| Ok(())));
        runner.register(spec("d", "c", "task", |_, _| Ok(())));

        runner.run("d", &[]).unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 3);
        assert_eq!(*ORDER.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn first_error_halts_the_chain() {
        reset();
        fn fails(_: &Runner, _: &[String]) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
        let mut runner = new_runner();
        runner.register(spec("a", "", "task", fails));
        runner.register(spec("b", "a", "task", task_b));

        let err = runner.run("b", &[]).unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn services_expose_constructor_state() {
        let runner = new_runner();
        assert_eq!(runner.name(), "demo");
        assert_eq!(runner.start_dir(), PathBuf::from("/start"));
        assert_eq!(runner.rootfs(), PathBuf::from("/rootfs"));
        assert_eq!(
            runner.path("task", "github.com/a/b"),
            Some(PathBuf::from("/rootfs/task/src/github.com/a/b"))
        );
    }

    #[test]
    fn property_reads_through_a_real_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let rootfs = dir.path().join("rootfs");
        let pkg_dir = rootfs.join("task").join("src").join("local/p");
        std::fs::create_dir_all(&pkg_dir).unwrap();
        std::fs::write(
            pkg_dir.join(gsmake_loader::MANIFEST_FILENAME),
            r#"{"name":"local/p","properties":{"build":{"target":"release"}}}"#,
        )
        .unwrap();

        let runner = Runner::new("demo", dir.path().to_path_buf(), rootfs);
        let target: Option<String> = runner.property("task", "local/p", "build.target");
        assert_eq!(target.as_deref(), Some("release"));
        assert_eq!(runner.property::<String>("task", "local/p", "build.missing"), None);
    }
}
