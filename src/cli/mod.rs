//! The Storycase Command-Line Interface.
//!
//! This module is the entry point for the binary: it parses arguments, sets up
//! logging, resolves settings and the credential, and drives the pipeline.

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::args::StorycaseArgs;
use crate::cli::output::{print_report, ConsoleProgress};
use crate::config::{resolve_api_key, Settings};
use crate::diagnostics::{print_error, Result};
use crate::generator::{GeminiClient, SystemContext, TestCaseGenerator};
use crate::pipeline::{run_to_workbook, RunReport};
use crate::reader::StoryTable;
use crate::writer::OutputTarget;

pub mod args;
pub mod output;

/// The main entry point for the CLI. Returns the process exit code.
pub fn run() -> i32 {
    let args = StorycaseArgs::parse();
    init_logging(args.verbose);

    match execute(&args) {
        Ok(report) => {
            print_report(&report);
            if report.succeeded() {
                0
            } else {
                1
            }
        }
        Err(e) => {
            print_error(e);
            1
        }
    }
}

/// Runs one invocation. Every startup check (settings, output path and directory,
/// credential, input sheet) happens before the first request.
pub fn execute(args: &StorycaseArgs) -> Result<RunReport> {
    let settings = args.apply_to(Settings::load(args.config.as_deref())?);
    debug!(?settings, "settings resolved");

    let target = match &args.output {
        Some(path) => OutputTarget::new(path)?,
        None => OutputTarget::timestamped(),
    };
    target.check_directory()?;
    let api_key = resolve_api_key(&settings.api_key_var, &settings.env_file)?;
    let table = StoryTable::open_sheet(&args.input, settings.sheet.as_deref())?;

    let context = SystemContext::load(settings.system_info.as_deref());
    let generator = TestCaseGenerator::new(GeminiClient::new(&settings, api_key)?, context);

    let mut progress = ConsoleProgress::new(table.len());
    run_to_workbook(
        table.stories(),
        &generator,
        settings.failure_policy(),
        &target,
        &mut progress,
    )
}

/// Structured logging to stderr. `RUST_LOG` wins; otherwise `warn`, or `debug` with
/// `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .try_init();
}
