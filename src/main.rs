//! docent command-line entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use docent::cli::{Cli, execute};

/// Installs the stderr log subscriber.
///
/// `DOCENT_LOG` wins over `RUST_LOG`; `-v` raises the default to `debug`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = std::env::var("DOCENT_LOG")
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[allow(clippy::print_stdout)]
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = execute(&cli)?;
    if !output.is_empty() {
        println!("{}", output.trim_end());
    }
    Ok(())
}
