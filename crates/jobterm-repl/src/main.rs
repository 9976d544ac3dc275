//! jobterm CLI entry point.
//!
//! Usage:
//!   jobterm                    # Interactive REPL
//!   jobterm -c <command>       # Dispatch one line and exit

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> ExitCode {
    // Diagnostics go to stderr so they never mix with command output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        None => {
            jobterm_repl::run()?;
            Ok(ExitCode::SUCCESS)
        }

        Some("--help" | "-h") => {
            print_help();
            Ok(ExitCode::SUCCESS)
        }

        Some("--version" | "-V") => {
            println!(
                "jobterm {} ({} {})",
                env!("CARGO_PKG_VERSION"),
                env!("JOBTERM_GIT_REV"),
                env!("JOBTERM_BUILD_DATE")
            );
            Ok(ExitCode::SUCCESS)
        }

        Some("-c") => {
            let cmd = args.get(2).context("-c requires a command argument")?;
            jobterm_repl::run_command(cmd)?;
            Ok(ExitCode::SUCCESS)
        }

        Some(unknown) => {
            eprintln!("Unknown option: {unknown}");
            eprintln!("Run 'jobterm --help' for usage.");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_help() {
    println!(
        r#"jobterm v{}

Usage:
  jobterm                      Interactive REPL
  jobterm -c <command>         Dispatch one line and exit

Options:
  -c <command>                 Run a command line (pipelines, redirection,
                               builtins, multiWatch) and exit
  -h, --help                   Show this help
  -V, --version                Show version

Configuration is read from $XDG_CONFIG_HOME/jobterm/config.toml.
Set RUST_LOG=jobterm_kernel=debug for diagnostics on stderr.

Examples:
  jobterm -c 'ls | wc -l'
  jobterm -c 'multiWatch ["date", "uptime"]'
"#,
        env!("CARGO_PKG_VERSION")
    );
}
