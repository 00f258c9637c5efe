//! Stagehand CLI - file staging around batch commands
//!
//! Stages a job's files per a manifest, runs the job command against the
//! working copies, and copies the products to their destinations.

use clap::Parser;
use stagehand::config::{CliArgs, Commands, FinishMode, StageConfig};
use stagehand::copy::{ResilientCopier, RetryPolicy};
use stagehand::error::Result;
use stagehand::stage::{JobManifest, StageSet};
use stagehand::summary::{JobSummary, SUMMARY_FILE_ENV};
use stagehand::{hash, runner};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = CliArgs::parse();

    // Initialize logging; -v flags set the default level, RUST_LOG wins
    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn run(args: CliArgs) -> Result<i32> {
    match args.command {
        Commands::Copy {
            source,
            destination,
            attempts,
            min_wait,
            max_wait,
        } => {
            let copier = ResilientCopier::with_policy(RetryPolicy {
                max_attempts: attempts,
                min_backoff: Duration::from_secs(min_wait),
                max_backoff: Duration::from_secs(max_wait),
            });
            let stats = copier.copy(&source, &destination)?;
            println!(
                "Copied {} in {:.2?} ({} attempt{})",
                humansize::format_size(stats.bytes_copied, humansize::BINARY),
                stats.duration,
                stats.attempts,
                if stats.attempts == 1 { "" } else { "s" },
            );
            Ok(0)
        }

        Commands::Checksum { path } => {
            let sum = hash::hash_file(&path)?;
            println!("{sum}");
            Ok(0)
        }

        Commands::Run {
            manifest,
            stage_name,
            stage_area,
            finish_mode,
            checksums,
            command,
        } => cmd_run(
            &manifest,
            stage_name,
            stage_area,
            finish_mode,
            checksums,
            &command,
        ),
    }
}

fn cmd_run(
    manifest_path: &std::path::Path,
    stage_name: Option<String>,
    stage_area: Option<PathBuf>,
    finish_mode: FinishMode,
    checksums: bool,
    command: &[String],
) -> Result<i32> {
    let manifest = JobManifest::load(manifest_path)?;

    let config = StageConfig {
        stage_name,
        stage_area,
        ..StageConfig::default()
    };
    let mut set = StageSet::new(config)?;

    // Stage everything, remembering real -> working substitutions for
    // the command line.
    let mut mapping: Vec<(String, String)> = Vec::with_capacity(manifest.len());
    for input in &manifest.inputs {
        let staged = set.stage_in(input);
        mapping.push((input.clone(), staged));
    }
    for output in &manifest.outputs {
        let mirrors: Vec<&str> = output.mirrors.iter().map(String::as_str).collect();
        let staged = set.stage_out(&output.path, &mirrors);
        mapping.push((output.path.clone(), staged));
    }
    for path in &manifest.modify {
        let staged = set.stage_mod(path);
        mapping.push((path.clone(), staged));
    }

    let argv: Vec<String> = command
        .iter()
        .map(|arg| {
            mapping
                .iter()
                .find(|(real, _)| real == arg)
                .map(|(_, staged)| staged.clone())
                .unwrap_or_else(|| arg.clone())
        })
        .collect();
    let (program, prog_args) = argv
        .split_first()
        .ok_or_else(|| stagehand::StageError::config("no command given"))?;

    let status = runner::run(program, prog_args)?;

    if checksums {
        for sum in set.checksums() {
            println!("{sum}");
        }
    }

    let stage_rc = set.finish(finish_mode);

    if std::env::var_os(SUMMARY_FILE_ENV).is_some() {
        let mut summary = JobSummary::from_env();
        summary.add("JobExitCode", &status.code.to_string());
        summary.add("StageFailures", &stage_rc.to_string());
        summary.write()?;
    }

    if !status.success() {
        Ok(status.code)
    } else if stage_rc != 0 {
        eprintln!("staging reported {stage_rc} failure(s); output may be incomplete");
        Ok(1)
    } else {
        Ok(0)
    }
}
