use anyhow::Result;
use clap::Parser;

mod cli;
mod coordinator;

use cli::Args;

/// `anyhow` renders a formatted error chain via `Debug`, so the error path
/// just returns a `Result` from `main`.
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);
    coordinator::run(args).await
}

/// Uses `RUST_LOG` if set and `-v` was not passed; otherwise uses `-v` (or
/// its absence) to pick a default level for this crate. Mirrors the
/// precedence of most `env_logger`-based CLIs in this workspace, adapted to
/// `tracing`.
fn init_logger(verbose: bool) {
    match (std::env::var("RUST_LOG").ok(), verbose) {
        (Some(_), false) => {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .init();
        }
        _ => {
            let level = if verbose { "debug" } else { "info" };
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new(level))
                .init();
        }
    }
}
