//! abc-git-log - print the modification history of alembic-git archives.
//!
//! Prints one JSON history document per file. With `-r` each archive is
//! opened first, so files left open by a writer or holding an unsupported
//! format version are rejected. Any failing file is reported on stderr
//! and makes the process exit with status 1.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use alembic_git::history::{archive_history, path_history};
use alembic_git::ArchiveReader;
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Print the commit history of alembic-git archives
#[derive(Parser, Debug)]
#[command(name = "abc-git-log")]
#[command(version)]
struct Cli {
    /// Open and validate each archive before listing its history
    #[arg(short, long)]
    read: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Archive repositories to inspect
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn history(path: &Path, read: bool) -> Result<String> {
    if read {
        let archive = ArchiveReader::open(path)
            .with_context(|| format!("{}: cannot open archive", path.display()))?;
        archive_history(&archive).with_context(|| format!("{}: cannot read history", path.display()))
    } else {
        path_history(path).with_context(|| format!("{}: not an alembic-git archive", path.display()))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut failed = false;
    for path in &cli.files {
        match history(path, cli.read) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("abc-git-log: {e:#}");
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
