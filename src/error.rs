// src/error.rs

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Fatal errors: any of these stops the run.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported change type: {0}")]
    UnsupportedChange(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Failure running an external helper process
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("process i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("process timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure of the block-association service. Never fatal: callers degrade
/// to "no block".
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("block service is not configured")]
    Disabled,

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("scratch file i/o failed: {0}")]
    Scratch(#[from] std::io::Error),

    #[error("block service exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("block service produced no result at {0}")]
    MissingResult(PathBuf),

    #[error("malformed block service result: {0}")]
    Malformed(String),
}

/// Failure classifying a single comment with the external model
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("unrecognized detector output: {0}")]
    Unrecognized(String),
}
