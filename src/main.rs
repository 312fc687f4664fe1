// src/main.rs

mod aggregate;
mod analyzer;
mod bridge;
mod cli;
mod comments;
mod config;
mod detector;
mod driver;
mod error;
mod lifecycle;
mod logging;
mod model;
mod output;
mod process;
mod registry;

use anyhow::{Context, Result};
use analyzer::CommitStream;
use bridge::{BlockLocator, DisabledLocator};
use clap::Parser;
use cli::{Args, Command, MineArgs, SummarizeArgs};
use config::{FileConfig, MineSettings};
use driver::{Tracker, TrackerOptions};
use indicatif::ProgressBar;
use model::Project;
use output::CsvSink;
use std::path::Path;
use std::time::Instant;
use tracing::info;

const SUMMARY_FILE: &str = "satd_summary.csv";
const PROJECTS_FILE: &str = "projects_details.csv";

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logging(&args.log_level, args.log_file.as_deref())?;
    let start_time = Instant::now();

    match &args.command {
        Command::Mine(mine) => run_mine(mine)?,
        Command::Summarize(summarize) => run_summarize(summarize)?,
    }

    println!("Total time: {:.2?}", start_time.elapsed());
    Ok(())
}

fn run_mine(args: &MineArgs) -> Result<()> {
    let file_config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => FileConfig::default(),
    };
    let settings = MineSettings::resolve(args, file_config);

    let detector = detector::build(&settings.detector)?;
    let locator: Box<dyn BlockLocator> = match settings.block_service.clone() {
        Some(service) => {
            info!(jar = %service.jar.display(), "block association enabled");
            Box::new(service)
        }
        None => {
            info!("no block jar configured, block association disabled");
            Box::new(DisabledLocator)
        }
    };

    let stream = CommitStream::open(&args.repo, args.repo_url.as_deref())
        .with_context(|| format!("failed to open repository {}", args.repo))?;
    let project = Project::new(stream.link_base());

    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    let file_name = format!(
        "{}.{}.{stamp}.csv",
        output::repo_label(stream.link_base()),
        settings.detector.kind
    );
    let mut sink = CsvSink::create(
        settings.output_dir.join("comments").join(&file_name),
        settings.output_dir.join("tracked").join(&file_name),
    )?;

    let mut tracker = Tracker::new(
        project.clone(),
        detector,
        locator,
        TrackerOptions {
            extension: settings.extension.clone(),
            merge_adjacent: settings.merge_adjacent,
        },
    );

    let progress = if settings.show_progress {
        ProgressBar::new(0)
    } else {
        ProgressBar::hidden()
    };

    let mine_start = Instant::now();
    let extension = settings.extension.as_str();
    let commits = stream.walk(
        |name| driver::has_extension(name, extension),
        &progress,
        |record| tracker.process_commit(&record, &mut sink),
    )?;
    println!(
        "Mining finished in {:.2?}. {} commits, {} file touches, {} comments, {} SATD events.",
        mine_start.elapsed(),
        commits,
        tracker.files_seen(),
        sink.comment_rows,
        sink.event_rows
    );
    println!(
        "{} SATD comments still live in {} of {} tracked files.",
        tracker.registry().live_count(),
        tracker.registry().file_count(),
        tracker.files().len()
    );
    println!("Comments written to {}", sink.comments_path.display());
    println!("Tracked SATD written to {}", sink.events_path.display());

    let summary = summarize_into(&sink.events_path, &settings.output_dir)?;
    let stats = aggregate::project_stats(&project.url, sink.comment_rows, sink.event_rows, &summary);
    output::append_project_stats(&settings.output_dir.join(PROJECTS_FILE), &stats)?;
    println!(
        "{} distinct SATD: {} addressed, {} not addressed, {} in deleted files.",
        stats.num_distinct, stats.addressed, stats.not_addressed, stats.file_deleted
    );
    Ok(())
}

fn run_summarize(args: &SummarizeArgs) -> Result<()> {
    let summary = summarize_into(&args.events, &args.output)?;
    println!("Summarized {} SATD comments.", summary.len());
    Ok(())
}

fn summarize_into(events_path: &Path, output_dir: &Path) -> Result<Vec<output::SummaryRow>> {
    let events = output::read_events(events_path)
        .with_context(|| format!("failed to read events from {}", events_path.display()))?;
    let summary = aggregate::summarize(&events);
    let summary_path = output_dir.join(SUMMARY_FILE);
    output::append_summary(&summary_path, &summary)?;
    info!(rows = summary.len(), path = %summary_path.display(), "summary appended");
    Ok(summary)
}
