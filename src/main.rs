//! Command-line front end.
//!
//! Usage:
//!   adb-rebuild backup.ab [fixed_backup.ab] [shared_data.tar]
//!
//! Exit codes: 0 success, 1 usage, 2 bad header, 3 input not openable,
//! 5 no tar data found, 6 chunk framing, 7 other I/O. Code 4 is reserved.

use adb_rebuild::{rebuild_files, RebuildError, RebuildEvent, RebuildOptions, StreamRole};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const EXIT_USAGE: u8 = 1;
const EXIT_HEADER: u8 = 2;
const EXIT_OPEN_INPUT: u8 = 3;
const EXIT_TAR_NOT_FOUND: u8 = 5;
const EXIT_FRAMING: u8 = 6;
const EXIT_IO: u8 = 7;

#[derive(Debug, Parser)]
#[command(
    name = "adb-rebuild",
    version,
    about = "Rebuild ADB backups corrupted by --shared on Android 4.0.x"
)]
struct Cli {
    /// Corrupted backup to read.
    #[arg(value_name = "BACKUP")]
    input: PathBuf,

    /// Where to write the rebuilt backup.
    #[arg(value_name = "FIXED_BACKUP", default_value = RebuildOptions::DEFAULT_REPAIRED_OUTPUT)]
    repaired_output: PathBuf,

    /// Where to write the extracted shared storage tar.
    #[arg(value_name = "SHARED_TAR", default_value = RebuildOptions::DEFAULT_TAR_OUTPUT)]
    tar_output: PathBuf,

    /// Leave output files in place if the rebuild fails part way.
    #[arg(long)]
    keep_partial: bool,

    /// Suppress progress output.
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .compact()
        .try_init()
    {
        eprintln!("warning: failed to initialize logger: {err}");
    }
}

/// Operator-facing progress text.
struct Progress<'a> {
    options: &'a RebuildOptions,
    quiet: bool,
    /// "Searching..." printed without its result yet.
    line_open: bool,
}

impl Progress<'_> {
    fn on_event(&mut self, event: &RebuildEvent<'_>) {
        if let RebuildEvent::HeaderRead { warnings, .. } = event {
            for warning in *warnings {
                eprintln!("Warning: {warning}");
            }
        }
        if self.quiet {
            return;
        }

        match event {
            RebuildEvent::HeaderRead { header, .. } => {
                println!("ADB Backup Version: {}", header.manifest_version);
                println!("ADB Compression: {}", header.compression_flag);
                println!("ADB Encryption: {}", header.encryption);
            }
            RebuildEvent::Scanning => {
                print!("Searching for uncompressed TAR data... ");
                let _ = io::stdout().flush();
                self.line_open = true;
            }
            RebuildEvent::TarLocated { tar_offset } => {
                self.line_open = false;
                println!("found at byte {tar_offset}");
                println!(
                    "Beginning rebuild of backup into: {}",
                    self.options.repaired_output.display()
                );
            }
            RebuildEvent::HeadCopied { .. } => {
                println!(
                    "Extracting uncompressed TAR into: {}",
                    self.options.tar_output.display()
                );
            }
            RebuildEvent::TarExtracted { stats } => {
                println!("Offset after TAR extraction: {}", stats.end_offset);
                println!("Continuing rebuild of backup");
            }
            RebuildEvent::TailCopied { .. } => {}
            RebuildEvent::Done { .. } => {
                println!("ADB backup rebuild complete.");
                println!("Exiting.");
            }
        }
    }

    fn on_error(&mut self, err: &RebuildError) {
        if self.line_open {
            self.line_open = false;
            println!("not found.");
        }
        eprintln!("{err}");
        eprintln!("Exiting.");
    }
}

fn exit_code(err: &RebuildError) -> u8 {
    match err {
        RebuildError::HeaderParse { .. } => EXIT_HEADER,
        RebuildError::Open {
            role: StreamRole::Input,
            ..
        } => EXIT_OPEN_INPUT,
        RebuildError::PatternNotFound { .. } => EXIT_TAR_NOT_FOUND,
        RebuildError::ChunkFraming { .. } => EXIT_FRAMING,
        RebuildError::Open { .. } | RebuildError::UnexpectedEof { .. } | RebuildError::Io(_) => {
            EXIT_IO
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_logging();

    let options = RebuildOptions {
        input: cli.input,
        repaired_output: cli.repaired_output,
        tar_output: cli.tar_output,
        keep_partial: cli.keep_partial,
    };
    let mut progress = Progress {
        options: &options,
        quiet: cli.quiet,
        line_open: false,
    };

    let result = rebuild_files(&options, |event| progress.on_event(event));
    match result {
        Ok(report) => {
            tracing::debug!(
                tar_offset = report.tar_offset,
                tar_bytes = report.tar.payload_bytes,
                repaired_bytes = report.repaired_len(),
                "rebuild complete"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            progress.on_error(&err);
            ExitCode::from(exit_code(&err))
        }
    }
}
