//! lambdagen - Command-line tool for generating AWS Lambda entry points.
//!
//! Scans modules of a Rust crate for annotated services and writes one `lambda_http` entry
//! point plus a `spec.json` route descriptor per handler.
//!
//! # Usage
//!
//! ```bash
//! lambdagen [OPTIONS] <MODULE>...
//! ```
//!
//! # Examples
//!
//! Generate entry points for one module:
//! ```bash
//! lambdagen --project ./hr-service src/employees
//! ```
//!
//! Panic on unconvertible path or query values and skip formatting:
//! ```bash
//! lambdagen --on-coercion-failure abort --no-format src/employees src/payroll.rs
//! ```

use anyhow::Result;
use clap::Parser;
use lambdagen::cli;
use log::info;

fn main() -> Result<()> {
    // Parse once to get the verbose flag before the logger exists, validate afterwards
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("lambdagen starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;
    let summary = cli::run(args)?;

    if summary.modules_failed > 0 {
        info!("{} module(s) failed, see errors above", summary.modules_failed);
    }

    Ok(())
}
