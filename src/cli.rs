// src/cli.rs

use crate::detector::DetectorKind;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Track SATD comments across the history of a repository
    Mine(MineArgs),
    /// Rebuild lifecycle summaries from an existing tracked-SATD CSV
    Summarize(SummarizeArgs),
}

#[derive(ClapArgs, Debug, Default)]
pub struct MineArgs {
    /// Path to a local repository, or a URL to clone
    pub repo: String,

    /// Which classifier decides what counts as SATD
    #[arg(long, value_enum)]
    pub detector: Option<DetectorKind>,

    /// Directory receiving the CSV outputs [default: data]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// File extension to track, without the dot [default: tf]
    #[arg(long)]
    pub extension: Option<String>,

    /// Base URL for deep links, e.g. https://github.com/org/repo
    #[arg(long)]
    pub repo_url: Option<String>,

    /// Block analysis jar; block association is disabled without it
    #[arg(long)]
    pub block_jar: Option<PathBuf>,

    /// Timeout for one block analysis run, in seconds [default: 60]
    #[arg(long)]
    pub block_timeout_secs: Option<u64>,

    /// SATD detector model jar, used with `--detector model`
    #[arg(long)]
    pub model_jar: Option<PathBuf>,

    /// Merge comments on consecutive lines into one comment
    #[arg(long)]
    pub merge_adjacent: bool,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(ClapArgs, Debug)]
pub struct SummarizeArgs {
    /// Tracked-SATD CSV produced by `mine`
    pub events: PathBuf,

    /// Directory holding satd_summary.csv
    #[arg(short, long, default_value = "data")]
    pub output: PathBuf,
}
