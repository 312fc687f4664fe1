// src/driver.rs

use crate::bridge::{BlockLocator, BlockResolver};
use crate::comments;
use crate::detector::SatdDetector;
use crate::error::TrackerError;
use crate::lifecycle::{Env, Executor};
use crate::model::{
    ChangeKind, Comment, Commit, CommitRecord, FileId, FileState, IdAllocator, ModifiedFile,
    Project,
};
use crate::output::{CommentRow, EventSink};
use crate::registry::SatdCommentList;
use tracing::{debug, warn};

pub fn has_extension(filename: &str, extension: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext == extension)
}

/// Latest known state of every tracked path
#[derive(Debug, Default)]
pub struct FileTable {
    files: Vec<FileState>,
}

impl FileTable {
    pub fn find_by_new_path(&self, path: &str) -> Option<FileId> {
        self.files.iter().find(|f| f.new_path == path).map(|f| f.id)
    }

    pub fn find_by_old_path(&self, path: &str) -> Option<FileId> {
        self.files.iter().find(|f| f.old_path == path).map(|f| f.id)
    }

    pub fn get(&self, id: FileId) -> Option<&FileState> {
        self.files.iter().find(|f| f.id == id)
    }

    /// Stores `state` as the current snapshot for its file id
    pub fn put(&mut self, state: FileState) {
        match self.files.iter_mut().find(|f| f.id == state.id) {
            Some(slot) => *slot = state,
            None => self.files.push(state),
        }
    }

    pub fn remove(&mut self, id: FileId) -> Option<FileState> {
        let pos = self.files.iter().position(|f| f.id == id)?;
        Some(self.files.remove(pos))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}

#[derive(Debug, Clone)]
pub struct TrackerOptions {
    /// Tracked file extension, without the dot
    pub extension: String,
    pub merge_adjacent: bool,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            extension: "tf".to_string(),
            merge_adjacent: false,
        }
    }
}

/// Drives the lifecycle engine over a chronological commit stream.
///
/// Owns the registry and the per-path file table; commits must be fed oldest
/// first because every transition depends on the outcome of earlier ones.
pub struct Tracker {
    project: Project,
    registry: SatdCommentList,
    files: FileTable,
    ids: IdAllocator,
    detector: Box<dyn SatdDetector>,
    locator: Box<dyn BlockLocator>,
    options: TrackerOptions,
    files_seen: usize,
}

impl Tracker {
    pub fn new(
        project: Project,
        detector: Box<dyn SatdDetector>,
        locator: Box<dyn BlockLocator>,
        options: TrackerOptions,
    ) -> Self {
        Self {
            project,
            registry: SatdCommentList::new(),
            files: FileTable::default(),
            ids: IdAllocator::new(),
            detector,
            locator,
            options,
            files_seen: 0,
        }
    }

    pub fn registry(&self) -> &SatdCommentList {
        &self.registry
    }

    pub fn files(&self) -> &FileTable {
        &self.files
    }

    pub fn files_seen(&self) -> usize {
        self.files_seen
    }

    pub fn tracks(&self, filename: &str) -> bool {
        has_extension(filename, &self.options.extension)
    }

    pub fn process_commit(
        &mut self,
        record: &CommitRecord,
        sink: &mut dyn EventSink,
    ) -> Result<(), TrackerError> {
        for modified in &record.files {
            if !self.tracks(&modified.filename) {
                continue;
            }
            self.files_seen += 1;
            self.process_file(&record.commit, modified, sink)?;
        }
        Ok(())
    }

    fn process_file(
        &mut self,
        commit: &Commit,
        modified: &ModifiedFile,
        sink: &mut dyn EventSink,
    ) -> Result<(), TrackerError> {
        if modified.binary && modified.change != ChangeKind::Delete {
            warn!(path = %modified.new_path(), commit = %commit.hash, "content is not text, skipping file");
            return Ok(());
        }

        let content = modified.text();
        let num_lines = comments::count_lines(content);
        let mut extracted = if content.is_empty() {
            Vec::new()
        } else {
            comments::extract(content)
        };
        if self.options.merge_adjacent {
            extracted = comments::merge_adjacent(extracted);
        }
        let mut remaining = extracted.clone();
        let satd = self.detector.detect(&mut remaining);

        let Some((executor, state)) = self.transition(commit, modified, num_lines) else {
            debug!(path = %modified.old_path(), change = %modified.change, "untracked path, nothing to apply");
            return self.emit_comments(commit, modified, num_lines, &extracted, &remaining, sink);
        };

        {
            let mut env = Env {
                project: &self.project,
                registry: &mut self.registry,
                ids: &mut self.ids,
                sink: &mut *sink,
                blocks: BlockResolver::new(&mut *self.locator, &state.content),
            };
            executor.run(&mut env, &state, satd)?;
        }

        if executor == Executor::Delete {
            self.files.remove(state.id);
        } else {
            self.files.put(state);
        }

        self.emit_comments(commit, modified, num_lines, &extracted, &remaining, sink)
    }

    /// Picks the executor for this touch and builds the file's new snapshot
    fn transition(
        &mut self,
        commit: &Commit,
        modified: &ModifiedFile,
        num_lines: usize,
    ) -> Option<(Executor, FileState)> {
        let new_path = modified.new_path();
        let old_path = modified.old_path();

        let (executor, id, old, new, last_change) = match modified.change {
            ChangeKind::Add => match self.files.find_by_new_path(new_path) {
                None => (Executor::Add, self.ids.file(), String::new(), new_path.to_string(), ChangeKind::Add),
                Some(id) => (Executor::Modify, id, new_path.to_string(), new_path.to_string(), ChangeKind::Modify),
            },
            ChangeKind::Modify => {
                let known = self
                    .files
                    .find_by_new_path(new_path)
                    .or_else(|| self.files.find_by_old_path(new_path));
                match known {
                    Some(id) => (Executor::Modify, id, old_path.to_string(), new_path.to_string(), ChangeKind::Modify),
                    None => {
                        debug!(path = %new_path, "modify of a path never seen, treating as add");
                        (Executor::Add, self.ids.file(), String::new(), new_path.to_string(), ChangeKind::Add)
                    }
                }
            }
            ChangeKind::Rename => match self.files.find_by_new_path(old_path) {
                Some(id) => (Executor::Rename, id, old_path.to_string(), new_path.to_string(), ChangeKind::Rename),
                None => (Executor::Add, self.ids.file(), String::new(), new_path.to_string(), ChangeKind::Add),
            },
            ChangeKind::Delete => {
                let id = self.files.find_by_new_path(old_path)?;
                let previous = self.files.get(id)?;
                // Content is gone; keep the last known text so identifier
                // lookups still have something to analyze.
                let state = FileState {
                    filename: modified.filename.clone(),
                    old_path: old_path.to_string(),
                    new_path: new_path.to_string(),
                    last_change: ChangeKind::Delete,
                    commit: commit.clone(),
                    num_lines,
                    ..previous.clone()
                };
                return Some((Executor::Delete, state));
            }
        };

        Some((
            executor,
            FileState {
                id,
                filename: modified.filename.clone(),
                old_path: old,
                new_path: new,
                content: modified.text().to_string(),
                num_lines,
                last_change,
                commit: commit.clone(),
            },
        ))
    }

    fn emit_comments(
        &self,
        commit: &Commit,
        modified: &ModifiedFile,
        num_lines: usize,
        extracted: &[Comment],
        remaining: &[Comment],
        sink: &mut dyn EventSink,
    ) -> Result<(), TrackerError> {
        for comment in extracted {
            let is_satd = !remaining.contains(comment);
            sink.comment(CommentRow {
                repo_url: self.project.url.clone(),
                old_path: modified.old_path().to_string(),
                new_path: modified.new_path().to_string(),
                comment: comment.text.clone(),
                line: comment.line,
                num_lines,
                commit_hash: commit.hash.clone(),
                commit_msg: commit.summary().to_string(),
                dev_email: commit.author_email.clone(),
                commit_date: commit.date.clone(),
                is_satd: u8::from(is_satd),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate;
    use crate::bridge::testing::FixedLocator;
    use crate::bridge::BLOCK_GONE;
    use crate::detector::{KeywordDetector, KEYWORDS_1};
    use crate::model::MutationCode;
    use crate::output::{MemorySink, ResolutionState};

    fn tracker() -> Tracker {
        Tracker::new(
            Project::new("https://github.com/org/infra"),
            Box::new(KeywordDetector::new(KEYWORDS_1)),
            Box::new(FixedLocator::default()),
            TrackerOptions::default(),
        )
    }

    fn commit(hash: &str, day: u32) -> Commit {
        Commit {
            hash: hash.to_string(),
            message: format!("change {hash}\n\ndetails"),
            author_email: "dev@example.com".into(),
            date: format!("2024-01-{day:02} 10:00:00+00:00"),
        }
    }

    fn file(change: ChangeKind, old: Option<&str>, new: Option<&str>, content: Option<&str>) -> ModifiedFile {
        let name = new.or(old).unwrap_or_default();
        ModifiedFile {
            filename: name.rsplit('/').next().unwrap_or(name).to_string(),
            change,
            old_path: old.map(str::to_string),
            new_path: new.map(str::to_string),
            content: content.map(str::to_string),
            binary: false,
        }
    }

    fn record(hash: &str, day: u32, files: Vec<ModifiedFile>) -> CommitRecord {
        CommitRecord {
            commit: commit(hash, day),
            files,
        }
    }

    fn events(sink: &MemorySink) -> Vec<(&str, &str, MutationCode)> {
        sink.events
            .iter()
            .map(|e| (e.commit_hash.as_str(), e.comment.as_str(), e.code))
            .collect()
    }

    #[test]
    fn add_then_edit_away_is_addressed() {
        let mut t = tracker();
        let mut sink = MemorySink::default();
        t.process_commit(
            &record("a1", 1, vec![file(ChangeKind::Add, None, Some("main.tf"), Some("# TODO fix this\nresource \"a\" \"b\" {}\n"))]),
            &mut sink,
        )
        .unwrap();
        t.process_commit(
            &record("a2", 2, vec![file(ChangeKind::Modify, Some("main.tf"), Some("main.tf"), Some("resource \"a\" \"b\" {}\n"))]),
            &mut sink,
        )
        .unwrap();

        assert_eq!(
            events(&sink),
            vec![
                ("a1", "# TODO fix this", MutationCode::Introduced),
                ("a2", "# TODO fix this", MutationCode::Removed),
            ]
        );

        let summary = aggregate::summarize(&sink.events);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].event_count, 2);
        assert_eq!(summary[0].resolution, ResolutionState::Addressed);
        assert_eq!(summary[0].renamed, 0);
        assert!(t.registry().live_comments_of(0).is_empty());
    }

    #[test]
    fn rename_then_removal_marks_summary_renamed() {
        let mut t = tracker();
        let mut sink = MemorySink::default();
        let src = "# TODO fix this\nresource \"a\" \"b\" {}\n";
        t.process_commit(&record("a1", 1, vec![file(ChangeKind::Add, None, Some("main.tf"), Some(src))]), &mut sink)
            .unwrap();
        t.process_commit(
            &record("a3", 3, vec![file(ChangeKind::Rename, Some("main.tf"), Some("core.tf"), Some(src))]),
            &mut sink,
        )
        .unwrap();
        t.process_commit(
            &record("a4", 4, vec![file(ChangeKind::Modify, Some("core.tf"), Some("core.tf"), Some("resource \"a\" \"b\" {}\n"))]),
            &mut sink,
        )
        .unwrap();

        assert_eq!(
            events(&sink),
            vec![
                ("a1", "# TODO fix this", MutationCode::Introduced),
                ("a3", "# TODO fix this", MutationCode::Persisted),
                ("a4", "# TODO fix this", MutationCode::Removed),
            ]
        );
        assert!(sink.events.iter().all(|e| e.satd_id == 1));

        let summary = aggregate::summarize(&sink.events);
        assert_eq!(summary[0].first_path, "main.tf");
        assert_eq!(summary[0].last_path, "core.tf");
        assert_eq!(summary[0].renamed, 1);
        assert_eq!(summary[0].resolution, ResolutionState::Addressed);
    }

    #[test]
    fn delete_marks_file_deleted_and_forgets_path() {
        let mut t = tracker();
        let mut sink = MemorySink::default();
        t.process_commit(&record("a1", 1, vec![file(ChangeKind::Add, None, Some("main.tf"), Some("# TODO x\n"))]), &mut sink)
            .unwrap();
        t.process_commit(&record("a2", 2, vec![file(ChangeKind::Delete, Some("main.tf"), None, None)]), &mut sink)
            .unwrap();

        assert_eq!(
            events(&sink),
            vec![
                ("a1", "# TODO x", MutationCode::Introduced),
                ("a2", "# TODO x", MutationCode::FileDeleted),
            ]
        );
        assert_eq!(t.files().len(), 0);
        assert_eq!(t.registry().live_count(), 0);
        assert_eq!(aggregate::summarize(&sink.events)[0].resolution, ResolutionState::FileDeleted);
    }

    #[test]
    fn rename_then_delete_falls_back_to_sentinel() {
        let mut t = tracker();
        let mut sink = MemorySink::default();
        let src = "# TODO x\n";
        t.process_commit(&record("a1", 1, vec![file(ChangeKind::Add, None, Some("main.tf"), Some(src))]), &mut sink)
            .unwrap();
        t.process_commit(
            &record("a2", 2, vec![file(ChangeKind::Rename, Some("main.tf"), Some("core.tf"), Some(src))]),
            &mut sink,
        )
        .unwrap();
        t.process_commit(&record("a3", 3, vec![file(ChangeKind::Delete, Some("core.tf"), None, None)]), &mut sink)
            .unwrap();

        let last = sink.events.last().unwrap();
        assert_eq!(last.code, MutationCode::FileDeleted);
        assert_eq!(last.block, BLOCK_GONE);
        assert_eq!(last.old_path, "core.tf");
    }

    #[test]
    fn rename_of_untracked_path_is_a_birth() {
        let mut t = tracker();
        let mut sink = MemorySink::default();
        t.process_commit(
            &record("a1", 1, vec![file(ChangeKind::Rename, Some("main.txt"), Some("main.tf"), Some("# TODO x\n"))]),
            &mut sink,
        )
        .unwrap();

        assert_eq!(events(&sink), vec![("a1", "# TODO x", MutationCode::Introduced)]);
        assert_eq!(sink.events[0].old_path, "");
        assert_eq!(sink.events[0].new_path, "main.tf");
    }

    #[test]
    fn repeated_add_of_known_path_reconciles() {
        let mut t = tracker();
        let mut sink = MemorySink::default();
        let add = |content: &str| file(ChangeKind::Add, None, Some("main.tf"), Some(content));
        t.process_commit(&record("a1", 1, vec![add("# TODO x\n")]), &mut sink).unwrap();
        t.process_commit(&record("a2", 2, vec![add("# TODO x\n# FIXME y\n")]), &mut sink).unwrap();

        assert_eq!(
            events(&sink),
            vec![
                ("a1", "# TODO x", MutationCode::Introduced),
                ("a2", "# TODO x", MutationCode::Persisted),
                ("a2", "# FIXME y", MutationCode::Introduced),
            ]
        );
    }

    #[test]
    fn every_extracted_comment_gets_a_row() {
        let mut t = tracker();
        let mut sink = MemorySink::default();
        t.process_commit(
            &record(
                "a1",
                1,
                vec![
                    file(ChangeKind::Add, None, Some("main.tf"), Some("# bucket\n# TODO rename\n")),
                    file(ChangeKind::Add, None, Some("README.md"), Some("# TODO docs\n")),
                ],
            ),
            &mut sink,
        )
        .unwrap();

        let rows: Vec<(&str, u8)> = sink.comments.iter().map(|c| (c.comment.as_str(), c.is_satd)).collect();
        assert_eq!(rows, vec![("# bucket", 0), ("# TODO rename", 1)]);
        assert_eq!(sink.comments[0].commit_msg, "change a1");
        assert_eq!(sink.comments[0].num_lines, 3);
        assert_eq!(t.files_seen(), 1);
    }

    #[test]
    fn empty_content_records_zero_lines() {
        let mut t = tracker();
        let mut sink = MemorySink::default();
        t.process_commit(&record("a1", 1, vec![file(ChangeKind::Add, None, Some("empty.tf"), Some(""))]), &mut sink)
            .unwrap();
        assert!(sink.comments.is_empty());
        assert!(sink.events.is_empty());
        let id = t.files().find_by_new_path("empty.tf").unwrap();
        assert_eq!(t.files().get(id).unwrap().num_lines, 0);
    }

    #[test]
    fn binary_content_is_skipped() {
        let mut t = tracker();
        let mut sink = MemorySink::default();
        let mut blob = file(ChangeKind::Add, None, Some("main.tf"), Some("# TODO\n"));
        blob.binary = true;
        t.process_commit(&record("a1", 1, vec![blob]), &mut sink).unwrap();
        assert!(sink.comments.is_empty());
        assert!(sink.events.is_empty());
        assert_eq!(t.files().len(), 0);
    }

    #[test]
    fn delete_of_untracked_path_is_ignored() {
        let mut t = tracker();
        let mut sink = MemorySink::default();
        t.process_commit(&record("a1", 1, vec![file(ChangeKind::Delete, Some("ghost.tf"), None, None)]), &mut sink)
            .unwrap();
        assert!(sink.events.is_empty());
    }

    #[test]
    fn live_set_matches_event_replay() {
        let mut t = tracker();
        let mut sink = MemorySink::default();
        let revisions = [
            "# TODO a\n# TODO b\n",
            "# TODO b\n# FIXME c\n",
            "# FIXME c\n# TODO a\n",
            "x = 1\n",
            "# HACK d\n",
        ];
        for (i, src) in revisions.iter().enumerate() {
            let change = if i == 0 { ChangeKind::Add } else { ChangeKind::Modify };
            let old = if i == 0 { None } else { Some("main.tf") };
            let hash = format!("c{i}");
            t.process_commit(&record(&hash, i as u32 + 1, vec![file(change, old, Some("main.tf"), Some(src))]), &mut sink)
                .unwrap();

            let mut replayed: Vec<&str> = Vec::new();
            for e in &sink.events {
                match e.code {
                    MutationCode::Introduced => replayed.push(&e.comment),
                    MutationCode::Removed | MutationCode::FileDeleted => replayed.retain(|c| *c != e.comment),
                    MutationCode::Persisted => {}
                }
            }
            let mut live: Vec<&str> = t.registry().live_comments_of(0).iter().map(|c| c.text.as_str()).collect();
            replayed.sort_unstable();
            live.sort_unstable();
            assert_eq!(live, replayed, "after revision {i}");
        }
    }

    #[test]
    fn tracks_only_the_configured_extension() {
        let t = tracker();
        assert!(t.tracks("main.tf"));
        assert!(!t.tracks("main.tfvars"));
        assert!(!t.tracks("tf"));
    }
}
