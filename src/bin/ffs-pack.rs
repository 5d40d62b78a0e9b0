//! ffs-pack command line
//!
//! Packs a folder into a flash filesystem image, header and load script

use anyhow::{Context, Result};
use clap::Parser;
use ffs_pack::config::USAGE;
use ffs_pack::{ErrorKind, PackConfig, PackError, PackReport, Packer};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ffs-pack")]
#[command(about = "Pack a folder into a flash filesystem image with a C manifest and load script")]
#[command(after_help = USAGE)]
struct Args {
    /// TOML build configuration (replaces the positional form)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Write a JSON build report
    #[arg(long)]
    report: Option<PathBuf>,

    /// Extra placement rule, applied after those already given (repeatable)
    #[arg(long = "rule", value_name = "GLOB=DIRECTIVES")]
    rules: Vec<String>,

    /// Log per-file placement decisions
    #[arg(short, long)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// <folder> <output_h> <output_script> <output_bin> <partition_table>
    /// <partition_name> <increment> [rules...]
    #[arg(value_name = "ARGS")]
    positional: Vec<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.quiet {
        tracing::Level::WARN
    } else if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(report) => {
            println!("FFS files found: {:?}", report.file_paths());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {:#}", err);
            exit_code(&err)
        }
    }
}

fn run(args: Args) -> Result<PackReport> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = PackConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            // Positionals are extra rules in config mode
            config.rules.extend(args.positional.iter().cloned());
            config
        }
        None => PackConfig::from_args(&args.positional)?,
    };

    config.rules.extend(args.rules);
    if args.report.is_some() {
        config.report = args.report;
    }

    info!(
        "Packing {} into partition '{}'",
        config.source.display(),
        config.partition
    );

    let packer = Packer::from_config(&config)?;
    Ok(packer.pack()?)
}

/// 2 for config and lookup errors, 3 for capacity errors, 1 otherwise
fn exit_code(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<PackError>().map(PackError::kind) {
        Some(ErrorKind::Config) | Some(ErrorKind::Lookup) => ExitCode::from(2),
        Some(ErrorKind::Capacity) => ExitCode::from(3),
        Some(ErrorKind::Io) | None => ExitCode::from(1),
    }
}
