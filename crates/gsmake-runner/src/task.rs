use crate::runner::Runner;

/// A registered task body. Generated registration code casts a plain
/// function item to this type before handing it to [`Runner::register`].
pub type TaskFn = fn(&Runner, &[String]) -> anyhow::Result<()>;

/// One package's contribution to a named task.
///
/// Several packages may contribute a `Task` under the same `name`; all of
/// them share a single [`crate::group::TaskGroup`] and are invoked together,
/// in insertion order, once that group is reached in the topological sort.
#[derive(Clone)]
pub struct TaskSpec {
    pub name: String,
    pub description: String,
    pub prev: String,
    pub package: String,
    pub domain: String,
    pub func: TaskFn,
}

impl TaskSpec {
    /// True if this contribution should run given an invocation-time domain
    /// filter (the `domain:` prefix on the requested task name, if any).
    /// `domain` is pipe-separated; `"all"` always matches.
    pub(crate) fn matches_domain(&self, filter: Option<&str>) -> bool {
        let Some(filter) = filter else { return true };
        self.domain.split('|').any(|d| d == filter || d == "all")
    }
}
