// src/model.rs

use crate::error::TrackerError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Uniquely identifies a tracked file across renames, scoped to one run
pub type FileId = usize;

/// Uniquely identifies a SATD comment from its introduction to its resolution
pub type SatdId = u64;

/// Run-scoped id source. One instance is owned by the tracker so two runs
/// (or two tests) never share counters.
#[derive(Debug)]
pub struct IdAllocator {
    next_file: FileId,
    next_satd: SatdId,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next_file: 0, next_satd: 1 }
    }

    pub fn file(&mut self) -> FileId {
        let id = self.next_file;
        self.next_file += 1;
        id
    }

    pub fn satd(&mut self) -> SatdId {
        let id = self.next_satd;
        self.next_satd += 1;
        id
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// The repository being mined
#[derive(Debug, Clone)]
pub struct Project {
    /// Base used for deep links, e.g. `https://github.com/org/repo`
    pub url: String,
}

impl Project {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn blob_link(&self, commit: &str, path: &str, line: Option<usize>) -> String {
        let base = self.url.trim_end_matches('/');
        match line {
            Some(line) => format!("{base}/blob/{commit}/{path}#L{line}"),
            None => format!("{base}/blob/{commit}/{path}"),
        }
    }
}

/// A traversed commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub hash: String,
    pub message: String,
    pub author_email: String,
    pub date: String,
}

impl Commit {
    /// First line of the commit message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// How a file was touched by a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Modify,
    Rename,
    Delete,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Add => "ADD",
            ChangeKind::Modify => "MODIFY",
            ChangeKind::Rename => "RENAME",
            ChangeKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<git2::Delta> for ChangeKind {
    type Error = TrackerError;

    fn try_from(delta: git2::Delta) -> Result<Self, Self::Error> {
        match delta {
            git2::Delta::Added | git2::Delta::Copied => Ok(ChangeKind::Add),
            git2::Delta::Modified | git2::Delta::Typechange => Ok(ChangeKind::Modify),
            git2::Delta::Renamed => Ok(ChangeKind::Rename),
            git2::Delta::Deleted => Ok(ChangeKind::Delete),
            other => Err(TrackerError::UnsupportedChange(format!("{other:?}"))),
        }
    }
}

/// One file entry of a commit as delivered by the commit stream
#[derive(Debug, Clone)]
pub struct ModifiedFile {
    pub filename: String,
    pub change: ChangeKind,
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    /// Post-change content; `None` for deletions and unloaded blobs
    pub content: Option<String>,
    /// The post-change blob could not be read as text
    pub binary: bool,
}

impl ModifiedFile {
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    pub fn old_path(&self) -> &str {
        self.old_path.as_deref().unwrap_or("")
    }

    pub fn new_path(&self) -> &str {
        self.new_path.as_deref().unwrap_or("")
    }
}

/// One commit with every file it touched, in stream order
#[derive(Debug, Clone)]
pub struct CommitRecord {
    pub commit: Commit,
    pub files: Vec<ModifiedFile>,
}

/// Snapshot of a logical file as of the latest commit that touched it.
/// A new snapshot replaces the previous one on every touch.
#[derive(Debug, Clone)]
pub struct FileState {
    pub id: FileId,
    pub filename: String,
    pub old_path: String,
    pub new_path: String,
    pub content: String,
    pub num_lines: usize,
    pub last_change: ChangeKind,
    pub commit: Commit,
}

/// An extracted source comment. Transient: lives for one file touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    /// 1-based
    pub line: usize,
}

impl Comment {
    pub fn new(text: impl Into<String>, line: usize) -> Self {
        Self {
            text: text.into(),
            line,
        }
    }
}

/// Transition of a SATD comment at a given commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum MutationCode {
    Removed = 0,
    Introduced = 1,
    Persisted = 2,
    FileDeleted = 3,
}

impl From<MutationCode> for u8 {
    fn from(code: MutationCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for MutationCode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MutationCode::Removed),
            1 => Ok(MutationCode::Introduced),
            2 => Ok(MutationCode::Persisted),
            3 => Ok(MutationCode::FileDeleted),
            other => Err(format!("unknown mutation code {other}")),
        }
    }
}

/// Structural block enclosing a comment, as reported by the block service
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDescriptor {
    pub start: usize,
    pub end: usize,
    pub kind: String,
    /// Opaque identifier that survives line shifts of the enclosing construct
    pub identifier: Option<serde_json::Value>,
}

/// A comment classified as self-admitted technical debt.
///
/// Identity is the exact comment text: two entries with equal `text` under one
/// file are the same SATD item. `id` is assigned at introduction and carried
/// unchanged through every later event of the item.
#[derive(Debug, Clone, PartialEq)]
pub struct SatdComment {
    pub id: SatdId,
    pub text: String,
    pub line: usize,
    pub code: MutationCode,
    pub block: Option<BlockDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_is_scoped_per_instance() {
        let mut a = IdAllocator::new();
        let mut b = IdAllocator::new();
        assert_eq!(a.satd(), 1);
        assert_eq!(a.satd(), 2);
        assert_eq!(b.satd(), 1);
        assert_eq!(a.file(), 0);
        assert_eq!(a.file(), 1);
    }

    #[test]
    fn change_kind_displays_upper_case() {
        assert_eq!(ChangeKind::Rename.to_string(), "RENAME");
        assert_eq!(ChangeKind::Delete.as_str(), "DELETE");
    }

    #[test]
    fn unknown_git_delta_is_rejected() {
        assert_eq!(
            ChangeKind::try_from(git2::Delta::Copied).unwrap(),
            ChangeKind::Add
        );
        assert!(ChangeKind::try_from(git2::Delta::Conflicted).is_err());
    }

    #[test]
    fn mutation_code_round_trips_through_u8() {
        assert_eq!(u8::from(MutationCode::FileDeleted), 3);
        assert_eq!(MutationCode::try_from(0).unwrap(), MutationCode::Removed);
        assert!(MutationCode::try_from(7).is_err());
    }

    #[test]
    fn commit_summary_is_first_line() {
        let commit = Commit {
            hash: "a1".into(),
            message: "Fix things\n\nLonger body".into(),
            author_email: "dev@example.com".into(),
            date: "2024-01-01 00:00:00+00:00".into(),
        };
        assert_eq!(commit.summary(), "Fix things");
    }

    #[test]
    fn blob_link_omits_fragment_without_line() {
        let project = Project::new("https://github.com/org/infra/");
        assert_eq!(
            project.blob_link("abc", "main.tf", Some(4)),
            "https://github.com/org/infra/blob/abc/main.tf#L4"
        );
        assert_eq!(
            project.blob_link("abc", "main.tf", None),
            "https://github.com/org/infra/blob/abc/main.tf"
        );
    }
}
