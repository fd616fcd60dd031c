//! mdltex CLI - build, extract and replace Half-Life model textures

pub mod commands;
pub mod progress;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use commands::Commands;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "mdltex")]
#[command(about = "Half-Life MDL texture tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Do not write a log file next to the input
    #[arg(long, global = true)]
    no_log_file: bool,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Run the mdltex CLI
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_file = (!cli.no_log_file).then(|| log_file_path(cli.command.input_path()));
    init_logging(log_file.as_deref(), cli.verbose)?;

    cli.command.execute()
}

/// Report a failed run on stderr and pick the process exit code: 2 for
/// usage errors, 1 otherwise
#[must_use]
pub fn report_error(error: &anyhow::Error) -> ExitCode {
    if let Some(crate::Error::InvalidUsage(message)) = error.downcast_ref::<crate::Error>() {
        eprintln!("ERROR: {message}");
        return ExitCode::from(2);
    }

    tracing::error!("{error:#}");
    eprintln!("ERROR: {error:#}");
    ExitCode::FAILURE
}

/// `mdltex - <input name>.log`, in the directory that contains the input
fn log_file_path(input: &Path) -> PathBuf {
    let input = std::path::absolute(input).unwrap_or_else(|_| input.to_path_buf());
    let name = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let directory = input.parent().unwrap_or_else(|| Path::new("."));
    directory.join(format!("mdltex - {name}.log"))
}

fn init_logging(log_file: Option<&Path>, verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false).without_time())
        .with(file_layer)
        .with(level)
        .init();
    Ok(())
}
