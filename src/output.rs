// src/output.rs

use crate::error::TrackerError;
use crate::model::{MutationCode, SatdId};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

pub const COMMENT_HEADERS: [&str; 11] = [
    "RepoURL", "OldPath", "NewPath", "CommentText", "LineID", "NumLines", "CommitHash",
    "CommitMsg", "DevEmail", "CommitDate", "IsSATD",
];

pub const EVENT_HEADERS: [&str; 15] = [
    "RepoURL", "SatdId", "OldPath", "NewPath", "CommentText", "Context", "Block", "BlockType",
    "LineID", "NumLines", "CommitHash", "CommitMsg", "DevEmail", "CommitDate", "MutationCode",
];

pub const SUMMARY_HEADERS: [&str; 21] = [
    "RepoURL", "SatdId", "FirstPath", "LastPath", "Renamed", "Comment", "Context",
    "FirstBlock", "FirstBlockType", "LastBlock", "LastBlockType", "FirstLine", "LastLine",
    "FirstCommit", "LastCommit", "FirstLink", "LastLink", "IntroTime", "LastTime",
    "EventCount", "ResolutionState",
];

pub const PROJECT_HEADERS: [&str; 8] = [
    "RepoURL", "NumComments", "NumSatdEvents", "SatdPercentage", "NumDistinctSatd",
    "Addressed", "NotAddressed", "FileDeleted",
];

/// CSV #1: one row per extracted comment per file touch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRow {
    #[serde(rename = "RepoURL")]
    pub repo_url: String,
    #[serde(rename = "OldPath")]
    pub old_path: String,
    #[serde(rename = "NewPath")]
    pub new_path: String,
    #[serde(rename = "CommentText")]
    pub comment: String,
    #[serde(rename = "LineID")]
    pub line: usize,
    #[serde(rename = "NumLines")]
    pub num_lines: usize,
    #[serde(rename = "CommitHash")]
    pub commit_hash: String,
    #[serde(rename = "CommitMsg")]
    pub commit_msg: String,
    #[serde(rename = "DevEmail")]
    pub dev_email: String,
    #[serde(rename = "CommitDate")]
    pub commit_date: String,
    #[serde(rename = "IsSATD")]
    pub is_satd: u8,
}

/// CSV #2: one lifecycle event of one SATD comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatdEvent {
    #[serde(rename = "RepoURL")]
    pub repo_url: String,
    #[serde(rename = "SatdId")]
    pub satd_id: SatdId,
    #[serde(rename = "OldPath")]
    pub old_path: String,
    #[serde(rename = "NewPath")]
    pub new_path: String,
    #[serde(rename = "CommentText")]
    pub comment: String,
    #[serde(rename = "Context")]
    pub context: String,
    #[serde(rename = "Block")]
    pub block: String,
    #[serde(rename = "BlockType")]
    pub block_type: String,
    #[serde(rename = "LineID")]
    pub line: usize,
    #[serde(rename = "NumLines")]
    pub num_lines: usize,
    #[serde(rename = "CommitHash")]
    pub commit_hash: String,
    #[serde(rename = "CommitMsg")]
    pub commit_msg: String,
    #[serde(rename = "DevEmail")]
    pub dev_email: String,
    #[serde(rename = "CommitDate")]
    pub commit_date: String,
    #[serde(rename = "MutationCode")]
    pub code: MutationCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionState {
    NotAddressed,
    Addressed,
    FileDeleted,
}

/// CSV #3: lifecycle summary of one SATD comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    #[serde(rename = "RepoURL")]
    pub repo_url: String,
    #[serde(rename = "SatdId")]
    pub satd_id: SatdId,
    #[serde(rename = "FirstPath")]
    pub first_path: String,
    #[serde(rename = "LastPath")]
    pub last_path: String,
    #[serde(rename = "Renamed")]
    pub renamed: u8,
    #[serde(rename = "Comment")]
    pub comment: String,
    #[serde(rename = "Context")]
    pub context: String,
    #[serde(rename = "FirstBlock")]
    pub first_block: String,
    #[serde(rename = "FirstBlockType")]
    pub first_block_type: String,
    #[serde(rename = "LastBlock")]
    pub last_block: String,
    #[serde(rename = "LastBlockType")]
    pub last_block_type: String,
    #[serde(rename = "FirstLine")]
    pub first_line: usize,
    #[serde(rename = "LastLine")]
    pub last_line: Option<usize>,
    #[serde(rename = "FirstCommit")]
    pub first_commit: String,
    #[serde(rename = "LastCommit")]
    pub last_commit: String,
    #[serde(rename = "FirstLink")]
    pub first_link: String,
    #[serde(rename = "LastLink")]
    pub last_link: String,
    #[serde(rename = "IntroTime")]
    pub intro_time: String,
    #[serde(rename = "LastTime")]
    pub last_time: String,
    #[serde(rename = "EventCount")]
    pub event_count: usize,
    #[serde(rename = "ResolutionState")]
    pub resolution: ResolutionState,
}

/// Per-run totals appended to the project details file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectStats {
    #[serde(rename = "RepoURL")]
    pub repo_url: String,
    #[serde(rename = "NumComments")]
    pub num_comments: usize,
    #[serde(rename = "NumSatdEvents")]
    pub num_satd_events: usize,
    #[serde(rename = "SatdPercentage")]
    pub satd_percentage: String,
    #[serde(rename = "NumDistinctSatd")]
    pub num_distinct: usize,
    #[serde(rename = "Addressed")]
    pub addressed: usize,
    #[serde(rename = "NotAddressed")]
    pub not_addressed: usize,
    #[serde(rename = "FileDeleted")]
    pub file_deleted: usize,
}

/// Where the tracker sends its rows
pub trait EventSink {
    fn comment(&mut self, row: CommentRow) -> Result<(), TrackerError>;
    fn event(&mut self, row: SatdEvent) -> Result<(), TrackerError>;
}

fn csv_writer(path: &Path, headers: &[&str], append: bool) -> Result<csv::Writer<File>, TrackerError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let existed = path.exists() && fs::metadata(path)?.len() > 0;
    let file = if append {
        OpenOptions::new().create(true).append(true).open(path)?
    } else {
        File::create(path)?
    };
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if !(append && existed) {
        writer.write_record(headers)?;
        writer.flush()?;
    }
    Ok(writer)
}

/// Streams comment rows and SATD events to the two per-run CSV files.
/// Every row is flushed before the next one is accepted.
pub struct CsvSink {
    comments: csv::Writer<File>,
    events: csv::Writer<File>,
    pub comments_path: PathBuf,
    pub events_path: PathBuf,
    pub comment_rows: usize,
    pub event_rows: usize,
}

impl CsvSink {
    pub fn create(comments_path: PathBuf, events_path: PathBuf) -> Result<Self, TrackerError> {
        Ok(Self {
            comments: csv_writer(&comments_path, &COMMENT_HEADERS, false)?,
            events: csv_writer(&events_path, &EVENT_HEADERS, false)?,
            comments_path,
            events_path,
            comment_rows: 0,
            event_rows: 0,
        })
    }
}

impl EventSink for CsvSink {
    fn comment(&mut self, row: CommentRow) -> Result<(), TrackerError> {
        self.comments.serialize(row)?;
        self.comments.flush()?;
        self.comment_rows += 1;
        Ok(())
    }

    fn event(&mut self, row: SatdEvent) -> Result<(), TrackerError> {
        self.events.serialize(row)?;
        self.events.flush()?;
        self.event_rows += 1;
        Ok(())
    }
}

/// Collects rows in memory
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    pub comments: Vec<CommentRow>,
    pub events: Vec<SatdEvent>,
}

#[cfg(test)]
impl EventSink for MemorySink {
    fn comment(&mut self, row: CommentRow) -> Result<(), TrackerError> {
        self.comments.push(row);
        Ok(())
    }

    fn event(&mut self, row: SatdEvent) -> Result<(), TrackerError> {
        self.events.push(row);
        Ok(())
    }
}

pub fn read_events(path: &Path) -> Result<Vec<SatdEvent>, TrackerError> {
    let mut reader = csv::Reader::from_path(path)?;
    let events = reader.deserialize().collect::<Result<Vec<SatdEvent>, _>>()?;
    Ok(events)
}

pub fn append_summary(path: &Path, rows: &[SummaryRow]) -> Result<(), TrackerError> {
    let mut writer = csv_writer(path, &SUMMARY_HEADERS, true)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn append_project_stats(path: &Path, stats: &ProjectStats) -> Result<(), TrackerError> {
    let mut writer = csv_writer(path, &PROJECT_HEADERS, true)?;
    writer.serialize(stats)?;
    writer.flush()?;
    Ok(())
}

/// File-name label for a repository: scheme, host prefix and slashes removed
pub fn repo_label(repo: &str) -> String {
    let without_scheme = repo.split_once("://").map_or(repo, |(_, rest)| rest);
    let trimmed = without_scheme
        .strip_prefix("github.com/")
        .unwrap_or(without_scheme)
        .trim_end_matches(".git")
        .trim_matches('/');
    trimmed
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: SatdId, code: MutationCode) -> SatdEvent {
        SatdEvent {
            repo_url: "https://github.com/org/infra".into(),
            satd_id: id,
            old_path: String::new(),
            new_path: "main.tf".into(),
            comment: "# TODO fix, \"quoted\"".into(),
            context: "# TODO fix".into(),
            block: "resource \"a\" \"b\" {\n}\n".into(),
            block_type: "resource".into(),
            line: 1,
            num_lines: 3,
            commit_hash: "a1".into(),
            commit_msg: "Add main\n\nbody".into(),
            dev_email: "dev@example.com".into(),
            commit_date: "2024-01-01 00:00:00+00:00".into(),
            code,
        }
    }

    #[test]
    fn events_survive_a_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::create(
            dir.path().join("comments/x.csv"),
            dir.path().join("tracked/x.csv"),
        )
        .unwrap();
        sink.event(event(1, MutationCode::Introduced)).unwrap();
        sink.event(event(1, MutationCode::Removed)).unwrap();
        assert_eq!(sink.event_rows, 2);

        let back = read_events(&sink.events_path).unwrap();
        assert_eq!(back, vec![event(1, MutationCode::Introduced), event(1, MutationCode::Removed)]);
    }

    #[test]
    fn new_files_start_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::create(dir.path().join("c.csv"), dir.path().join("e.csv")).unwrap();
        drop(sink);
        let header = fs::read_to_string(dir.path().join("c.csv")).unwrap();
        assert_eq!(header.trim_end(), COMMENT_HEADERS.join(","));
        let header = fs::read_to_string(dir.path().join("e.csv")).unwrap();
        assert_eq!(header.trim_end(), EVENT_HEADERS.join(","));
    }

    #[test]
    fn appended_files_keep_a_single_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projects_details.csv");
        let stats = ProjectStats {
            repo_url: "r".into(),
            num_comments: 4,
            num_satd_events: 2,
            satd_percentage: "50.000 %".into(),
            num_distinct: 1,
            addressed: 1,
            not_addressed: 0,
            file_deleted: 0,
        };
        append_project_stats(&path, &stats).unwrap();
        append_project_stats(&path, &stats).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], PROJECT_HEADERS.join(","));
        assert_eq!(lines[1], "r,4,2,50.000 %,1,1,0,0");
    }

    #[test]
    fn unknown_mutation_code_fails_to_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        let mut row = EVENT_HEADERS.join(",");
        row.push_str("\nr,1,,main.tf,c,c,,,1,1,a1,m,e,d,9\n");
        fs::write(&path, row).unwrap();
        assert!(matches!(read_events(&path), Err(TrackerError::Csv(_))));
    }

    #[test]
    fn labels_strip_scheme_and_host() {
        assert_eq!(repo_label("https://github.com/org/infra"), "org_infra");
        assert_eq!(repo_label("https://gitlab.com/org/infra.git"), "gitlab.com_org_infra");
        assert_eq!(repo_label("/tmp/work/infra/"), "tmp_work_infra");
    }
}
