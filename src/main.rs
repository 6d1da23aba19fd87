//! devbox-updater - GitHub Action that keeps Devbox packages up to date
//!
//! Scans devbox.json, looks up the newest package versions, regenerates
//! devbox.lock and opens or refreshes a single update pull request.

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use devbox_updater::cli::{input_error, ActionInputs};
use devbox_updater::orchestrator::{Orchestrator, RunReport};
use devbox_updater::output::{error_command, write_outputs};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let inputs = match ActionInputs::try_parse() {
        Ok(inputs) => inputs,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => e.exit(),
            _ => {
                init_logging(false);
                let _ = e.print();
                return finish(&RunReport::rejected(input_error(&e)));
            }
        },
    };

    init_logging(inputs.verbose);
    let report = Orchestrator::new(inputs).run().await;
    finish(&report)
}

fn init_logging(verbose: bool) {
    // RUST_LOG wins over the verbose input
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("devbox_updater=debug,info")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn finish(report: &RunReport) -> ExitCode {
    match publish(report) {
        Ok(()) if report.is_success() => ExitCode::SUCCESS,
        Ok(()) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Write outputs and, for failed runs, the error annotation
fn publish(report: &RunReport) -> anyhow::Result<()> {
    let output_file = std::env::var_os("GITHUB_OUTPUT")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);

    let mut stdout = io::stdout().lock();
    write_outputs(&report.outputs, output_file.as_deref(), &mut stdout)
        .with_context(|| match &output_file {
            Some(path) => format!("failed to write outputs to {}", path.display()),
            None => "failed to write outputs to stdout".to_string(),
        })?;

    if let Some(message) = &report.outputs.error_message {
        writeln!(stdout, "{}", error_command(message)).context("failed to write error annotation")?;
    }
    stdout.flush()?;
    Ok(())
}
