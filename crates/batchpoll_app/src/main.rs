mod config;
mod logging;
mod runner;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use batchpoll_core::{ItemStatus, ItemTransition, Notice, ProgressView};
use batchpoll_engine::{check_upload, EngineHandle, FileAnalysis, FileSummary, ItemId};
use batchpoll_logging::batch_debug;
use chrono::{DateTime, NaiveDateTime};
use clap::{Parser, Subcommand};

use config::AppConfig;
use logging::LogDestination;
use runner::{Coordinator, ProgressReporter, RunOutcome};

/// Submit uploaded files for batch processing and follow them to completion.
#[derive(Parser, Debug)]
#[command(name = "batchpoll")]
#[command(version)]
struct Args {
    /// Config file (defaults to ./batchpoll.ron when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Service root, overrides the config file
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Maximum status queries per batch, overrides the config file
    #[arg(long, global = true)]
    max_ticks: Option<u32>,

    /// Where log output goes, overrides the config file
    #[arg(long, value_enum, global = true)]
    log: Option<LogDestination>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the files known to the service
    List,
    /// Upload a txt, pdf, wav, mp3 or amr file (50 MB at most)
    Upload {
        path: PathBuf,
    },
    /// Delete one of your files
    Delete {
        id: ItemId,
    },
    /// Analyse a single file and print the transcript, sentiment, entities and speakers
    Process {
        id: ItemId,
    },
    /// Process files as one batch and poll until every file settles
    Submit {
        /// File ids to process
        #[arg(required_unless_present = "all")]
        ids: Vec<ItemId>,

        /// Process every listed file
        #[arg(long, conflicts_with = "ids")]
        all: bool,
    },
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(max_ticks) = args.max_ticks {
        config.max_ticks = max_ticks;
    }
    if let Some(log) = args.log {
        config.log = log;
    }
    config.validate()?;
    logging::initialize(config.log, args.verbose);

    let engine = EngineHandle::new(config.api_settings()).context("starting engine")?;
    let mut coordinator = Coordinator::new(engine, config.poll_settings(), config.stall_timeout())
        .with_process_wait(config.process_wait());

    match args.command {
        Command::List => {
            let files = coordinator.list_files().context("listing files")?;
            print_files(&files);
            Ok(ExitCode::SUCCESS)
        }
        Command::Upload { path } => {
            let (filename, contents) = read_upload(&path)?;
            let uploaded = coordinator
                .upload_file(filename, contents)
                .with_context(|| format!("uploading {}", path.display()))?;
            println!(
                "Uploaded {} as file {} ({})",
                uploaded.filename,
                uploaded.id,
                uploaded.size.as_deref().unwrap_or("size unknown")
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Delete { id } => {
            coordinator
                .delete_file(id)
                .with_context(|| format!("deleting file {id}"))?;
            println!("Deleted file {id}.");
            Ok(ExitCode::SUCCESS)
        }
        Command::Process { id } => {
            let analysis = coordinator
                .process_file(id)
                .with_context(|| format!("processing file {id}"))?;
            print_analysis(&analysis);
            Ok(ExitCode::SUCCESS)
        }
        Command::Submit { ids, all } => {
            let ids = if all {
                coordinator
                    .list_files()
                    .context("listing files")?
                    .into_iter()
                    .map(|file| file.id)
                    .collect()
            } else {
                ids
            };
            let outcome = coordinator.run_batch(ids, &mut ConsoleReporter);
            batch_debug!("run ended {:?}; view {:?}", outcome, coordinator.state().view());
            Ok(exit_code(&outcome))
        }
    }
}

fn exit_code(outcome: &RunOutcome) -> ExitCode {
    match outcome {
        RunOutcome::Finished { .. } => ExitCode::SUCCESS,
        RunOutcome::EmptySelection | RunOutcome::NothingQueued { .. } => ExitCode::from(2),
        RunOutcome::SubmissionFailed { .. } => ExitCode::from(3),
        RunOutcome::TimedOut { .. } => ExitCode::from(4),
        RunOutcome::Cancelled => ExitCode::from(5),
    }
}

fn print_files(files: &[FileSummary]) {
    if files.is_empty() {
        println!("No files uploaded.");
        return;
    }
    println!("{:>6}  {:<6}  {:>10}  {:<16}  NAME", "ID", "TYPE", "SIZE", "CREATED");
    for file in files {
        println!(
            "{:>6}  {:<6}  {:>10}  {:<16}  {}",
            file.id,
            file.filetype.as_deref().unwrap_or("-"),
            file.size.map_or_else(|| "-".to_string(), |size| size.to_string()),
            file.created_at
                .as_deref()
                .map_or_else(|| "-".to_string(), format_created_at),
            file.filename
        );
    }
}

/// Checks the service's upload rules against the file on disk before reading it.
fn read_upload(path: &Path) -> Result<(String, Vec<u8>)> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("{} has no usable file name", path.display()))?
        .to_string();
    let metadata = fs::metadata(path).with_context(|| format!("reading {}", path.display()))?;
    check_upload(&filename, metadata.len())?;
    let contents = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok((filename, contents))
}

fn print_analysis(analysis: &FileAnalysis) {
    println!("Transcript:\n{}\n", analysis.transcript.trim());
    let sentiment = &analysis.sentiment;
    println!(
        "Sentiment: {:+.2} (positive {:.2}, neutral {:.2}, negative {:.2})",
        sentiment.compound, sentiment.pos, sentiment.neu, sentiment.neg
    );

    if analysis.entities.is_empty() {
        println!("Entities: none");
    } else {
        println!("Entities:");
        for entity in &analysis.entities {
            println!("  {:<10} {}", entity.label, entity.text);
        }
    }

    // Text files carry no speaker data.
    if let Some(speakers) = analysis.speakers.as_ref().filter(|speakers| !speakers.is_empty()) {
        println!("Speakers:");
        for (speaker, segments) in speakers {
            let first = segments.first().copied().unwrap_or_default();
            println!("  {speaker}: {} segments, first at {first:.1}s", segments.len());
        }
    }
}

/// The service emits naive ISO-8601 timestamps; RFC 3339 is accepted too.
fn format_created_at(raw: &str) -> String {
    const DISPLAY: &str = "%Y-%m-%d %H:%M";
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return parsed.format(DISPLAY).to_string();
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.format(DISPLAY).to_string();
    }
    raw.to_string()
}

struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_transition(&mut self, transition: &ItemTransition, detail: Option<&str>) {
        match (transition.to, detail) {
            (ItemStatus::Failed, Some(detail)) => {
                println!("  file {:>6}: {} ({detail})", transition.id, transition.to.display());
            }
            _ => println!("  file {:>6}: {}", transition.id, transition.to.display()),
        }
    }

    fn on_progress(&mut self, progress: &ProgressView) {
        println!(
            "progress {:>3}% ({}/{})",
            progress.percent, progress.completed, progress.total
        );
    }

    fn on_notice(&mut self, notice: &Notice) {
        match notice {
            Notice::EmptySelection => eprintln!("Nothing selected."),
            Notice::SessionActive => eprintln!("A batch is already being processed."),
            Notice::SubmissionFailed { message } => eprintln!("Submission failed: {message}"),
            Notice::NothingQueued { rejected } => {
                eprintln!("The service queued none of the files {rejected:?}.")
            }
            Notice::PartiallyQueued { rejected } => {
                println!("Not queued by the service: {rejected:?}")
            }
            Notice::PollingTimedOut { pending } => {
                eprintln!("Gave up waiting; still pending: {pending:?}. Selection kept for retry.")
            }
            Notice::BatchFinished { succeeded, failed } => {
                println!("Batch finished: {succeeded} completed, {failed} failed.")
            }
            Notice::PollingCancelled => eprintln!("Polling cancelled."),
        }
    }
}
