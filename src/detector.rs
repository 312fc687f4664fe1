// src/detector.rs

use crate::error::{ClassifyError, TrackerError};
use crate::model::Comment;
use crate::process::run_with_timeout;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use tracing::{debug, warn};

/// Task markers that usually flag deferred work
pub const KEYWORDS_1: &[&str] = &[
    "todo", "to do", "fixme", "fix me", "xxx", "hack", "workaround", "work around",
    "temporary", "temp fix", "kludge", "refactor", "not ideal", "for now",
];

/// Classic self-admitted technical debt phrases
pub const KEYWORDS_2: &[&str] = &[
    "hack", "retarded", "at a loss", "stupid", "remove this code", "ugly", "take care",
    "something's gone wrong", "nuke", "is problematic", "may cause problem", "hacky",
    "unknown why we ever experience this", "treat this as a soft error", "silly",
    "workaround for bug", "kludge", "fixme", "this isn't quite right", "trial and error",
    "give up", "this is wrong", "hang our heads in shame", "temporary solution",
    "causes issue", "something bad is going on", "cause for issue",
    "this doesn't look right", "is this next line safe",
    "this indicates a more fundamental problem", "temporary crutch", "this can be a mess",
    "this isn't very solid", "this is temporary and will go away",
    "is this line really safe", "there is a problem", "some fatal error",
    "something serious is wrong", "don't use this", "get rid of this",
    "doubt that this would work", "this is bs", "give up and go away",
    "risk of this blowing up", "just abandon it", "prolly a bug", "probably a bug",
    "hope everything will work", "toss it", "barf", "something bad happened",
    "fix this crap", "yuck", "certainly buggy", "remove me before production",
    "you can be unhappy now", "this is uncool", "bail out", "it doesn't work yet", "crap",
    "inconsistency", "abandon all hope", "kaboom",
];

/// Which classifier decides what counts as SATD
#[derive(clap::ValueEnum, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// Keyword list 1 (task markers)
    Keywords1,
    /// Keyword list 2 (classic SATD phrases)
    Keywords2,
    /// Either keyword list
    Keywords,
    /// External SATD detector model
    Model,
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetectorKind::Keywords1 => "keywords1",
            DetectorKind::Keywords2 => "keywords2",
            DetectorKind::Keywords => "keywords",
            DetectorKind::Model => "model",
        };
        f.write_str(name)
    }
}

/// Splits SATD comments out of a comment list.
///
/// Destructive: every comment classified as SATD is removed from `remaining`
/// and returned, both sides keeping their original order.
pub trait SatdDetector {
    fn detect(&self, remaining: &mut Vec<Comment>) -> Vec<Comment>;
}

fn split_off<F>(remaining: &mut Vec<Comment>, mut is_satd: F) -> Vec<Comment>
where
    F: FnMut(&Comment) -> bool,
{
    let (satd, rest): (Vec<_>, Vec<_>) = remaining.drain(..).partition(|c| is_satd(c));
    *remaining = rest;
    satd
}

/// Case-insensitive substring match against keyword lists
#[derive(Debug, Clone)]
pub struct KeywordDetector {
    keywords: Vec<String>,
}

impl KeywordDetector {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

impl SatdDetector for KeywordDetector {
    fn detect(&self, remaining: &mut Vec<Comment>) -> Vec<Comment> {
        split_off(remaining, |c| self.matches(&c.text))
    }
}

/// Asks the external SATD detector jar about one comment at a time
#[derive(Debug, Clone)]
pub struct ModelDetector {
    pub java: String,
    pub jar: PathBuf,
    pub timeout: Duration,
}

impl ModelDetector {
    pub fn classify(&self, text: &str) -> Result<bool, ClassifyError> {
        let flattened = text.replace('\n', "");
        let mut cmd = Command::new(&self.java);
        cmd.args(["--add-opens", "java.base/java.lang=ALL-UNNAMED", "-jar"])
            .arg(&self.jar)
            .arg("test");
        let output = run_with_timeout(&mut cmd, Some(&format!("{flattened}\n/exit\n")), self.timeout)?;
        parse_verdict(&output.stdout)
    }
}

fn parse_verdict(stdout: &str) -> Result<bool, ClassifyError> {
    if stdout.contains(">SATD") {
        Ok(true)
    } else if stdout.contains(">Not SATD") {
        Ok(false)
    } else {
        Err(ClassifyError::Unrecognized(stdout.trim().to_string()))
    }
}

impl SatdDetector for ModelDetector {
    fn detect(&self, remaining: &mut Vec<Comment>) -> Vec<Comment> {
        split_off(remaining, |c| match self.classify(&c.text) {
            Ok(verdict) => {
                debug!(line = c.line, satd = verdict, "model verdict");
                verdict
            }
            Err(e) => {
                warn!(line = c.line, error = %e, "SATD model failed, treating comment as not SATD");
                false
            }
        })
    }
}

/// Detector settings resolved from CLI and config file
#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub kind: DetectorKind,
    pub keywords1: Vec<String>,
    pub keywords2: Vec<String>,
    pub java: String,
    pub model_jar: PathBuf,
    pub model_timeout: Duration,
}

/// Builds the configured detector. A model detector whose jar is missing is a
/// configuration error, reported before any commit is processed.
pub fn build(settings: &DetectorSettings) -> Result<Box<dyn SatdDetector>, TrackerError> {
    let detector: Box<dyn SatdDetector> = match settings.kind {
        DetectorKind::Keywords1 => Box::new(KeywordDetector::new(&settings.keywords1)),
        DetectorKind::Keywords2 => Box::new(KeywordDetector::new(&settings.keywords2)),
        DetectorKind::Keywords => Box::new(KeywordDetector::new(
            settings.keywords1.iter().chain(settings.keywords2.iter()),
        )),
        DetectorKind::Model => {
            if !settings.model_jar.is_file() {
                return Err(TrackerError::Config(format!(
                    "SATD model jar not found at {}",
                    settings.model_jar.display()
                )));
            }
            Box::new(ModelDetector {
                java: settings.java.clone(),
                jar: settings.model_jar.clone(),
                timeout: settings.model_timeout,
            })
        }
    };
    Ok(detector)
}
