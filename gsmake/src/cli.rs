use std::path::PathBuf;

use clap::Parser;

/// `<tool> [--root PATH] [-v] [--clear] [-I <json-import>] [--version] <task>
/// [args...]`.
#[derive(Debug, Parser)]
#[command(name = "gsmake", about, long_about = None, version)]
pub struct Args {
    /// Metadata/cache root. Falls back to `$GSMAKE_HOME`; one of the two is
    /// required.
    #[arg(long, env = "GSMAKE_HOME")]
    pub root: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Clears the resolved userspace before loading.
    #[arg(long)]
    pub clear: bool,

    /// Appends a JSON import ref to the root manifest in memory. Repeatable.
    #[arg(short = 'I', long = "import", value_name = "json")]
    pub imports: Vec<String>,

    /// The task to run, optionally prefixed `domain:`. Omit to list tasks.
    pub task: Option<String>,

    /// Arguments forwarded to the task.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}
