// src/analyzer.rs

use crate::error::TrackerError;
use crate::model::{ChangeKind, Commit, CommitRecord, ModifiedFile};
use chrono::{FixedOffset, Offset, TimeZone, Utc};
use git2::{DiffFindOptions, DiffOptions, Oid, Repository, Sort};
use indicatif::ProgressBar;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, info, warn};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

fn is_remote(source: &str) -> bool {
    source.contains("://") || source.starts_with("git@")
}

fn trim_git_suffix(url: &str) -> &str {
    let url = url.trim_end_matches('/');
    url.strip_suffix(".git").unwrap_or(url)
}

fn format_time(time: git2::Time) -> String {
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60).unwrap_or_else(|| Utc.fix());
    offset
        .timestamp_opt(time.seconds(), 0)
        .single()
        .map(|dt| dt.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

/// Chronological commit stream over one repository
pub struct CommitStream {
    repo: Repository,
    link_base: String,
    // Keeps a cloned checkout alive for the lifetime of the stream
    _checkout: Option<TempDir>,
}

impl CommitStream {
    /// Opens a local repository, or clones `source` into a temporary directory
    /// when it looks like a URL. `link_override` replaces the deep-link base.
    pub fn open(source: &str, link_override: Option<&str>) -> Result<Self, TrackerError> {
        let (repo, checkout) = if is_remote(source) {
            let dir = TempDir::new()?;
            info!(url = %source, into = %dir.path().display(), "cloning repository");
            (Repository::clone(source, dir.path())?, Some(dir))
        } else {
            info!(path = %source, "opening repository");
            (Repository::open(Path::new(source))?, None)
        };

        let link_base = match link_override {
            Some(url) => trim_git_suffix(url).to_string(),
            None if is_remote(source) => trim_git_suffix(source).to_string(),
            None => repo
                .find_remote("origin")
                .ok()
                .and_then(|remote| remote.url().map(|u| trim_git_suffix(u).to_string()))
                .unwrap_or_else(|| source.to_string()),
        };

        Ok(Self {
            repo,
            link_base,
            _checkout: checkout,
        })
    }

    pub fn link_base(&self) -> &str {
        &self.link_base
    }

    /// Commit ids reachable from HEAD, oldest first
    pub fn commit_ids(&self) -> Result<Vec<Oid>, TrackerError> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push_head()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME | Sort::REVERSE)?;
        let ids = revwalk.collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Builds the record for one commit, diffed against its parent.
    /// Merge commits report no files: their branches were already walked.
    /// Blob content is loaded only for paths accepted by `tracks`.
    pub fn record<T>(&self, oid: Oid, tracks: &T) -> Result<CommitRecord, TrackerError>
    where
        T: Fn(&str) -> bool,
    {
        let commit = self.repo.find_commit(oid)?;
        let files = if commit.parent_count() > 1 {
            debug!(commit = %oid, parents = commit.parent_count(), "merge commit, no files");
            Vec::new()
        } else {
            self.modified_files(&commit, tracks)?
        };

        let committer = commit.committer();
        Ok(CommitRecord {
            commit: Commit {
                hash: oid.to_string(),
                message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
                author_email: committer.email().unwrap_or_default().to_string(),
                date: format_time(committer.when()),
            },
            files,
        })
    }

    fn modified_files<T>(&self, commit: &git2::Commit<'_>, tracks: &T) -> Result<Vec<ModifiedFile>, TrackerError>
    where
        T: Fn(&str) -> bool,
    {
        let oid = commit.id();
        let tree = commit.tree()?;
        let parent_tree = match commit.parents().next() {
            Some(parent) => Some(parent.tree()?),
            None => None,
        };

        let mut diff_opts = DiffOptions::new();
        diff_opts.include_untracked(false);
        diff_opts.ignore_filemode(true);
        let mut diff =
            self.repo
                .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut diff_opts))?;
        let mut find_opts = DiffFindOptions::new();
        find_opts.renames(true);
        diff.find_similar(Some(&mut find_opts))?;

        let mut files = Vec::new();
        for delta in diff.deltas() {
            let change = ChangeKind::try_from(delta.status())?;
            let old_path = delta.old_file().path().map(|p| p.to_string_lossy().into_owned());
            let new_path = delta.new_file().path().map(|p| p.to_string_lossy().into_owned());
            let (old_path, new_path) = match change {
                ChangeKind::Add => (None, new_path),
                ChangeKind::Delete => (old_path, None),
                ChangeKind::Modify | ChangeKind::Rename => (old_path, new_path),
            };

            let shown = new_path.as_deref().or(old_path.as_deref()).unwrap_or_default();
            let filename = Path::new(shown)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let mut content = None;
            let mut binary = false;
            if change != ChangeKind::Delete && tracks(&filename) {
                let blob = self.repo.find_blob(delta.new_file().id())?;
                match std::str::from_utf8(blob.content()) {
                    Ok(text) if !blob.is_binary() => content = Some(text.to_string()),
                    _ => {
                        warn!(path = %shown, commit = %oid, "blob is not UTF-8 text");
                        binary = true;
                    }
                }
            }

            files.push(ModifiedFile {
                filename,
                change,
                old_path,
                new_path,
                content,
                binary,
            });
        }
        Ok(files)
    }

    /// Feeds every commit, oldest first, to `on_commit`. Returns the number of
    /// commits walked.
    pub fn walk<T, F>(&self, tracks: T, progress: &ProgressBar, mut on_commit: F) -> Result<usize, TrackerError>
    where
        T: Fn(&str) -> bool,
        F: FnMut(CommitRecord) -> Result<(), TrackerError>,
    {
        let ids = self.commit_ids()?;
        info!(commits = ids.len(), "walking history");
        progress.set_length(ids.len() as u64);
        progress.set_message("Mining commits");

        for oid in &ids {
            let record = self.record(*oid, &tracks)?;
            debug!(commit = %oid, files = record.files.len(), "commit");
            on_commit(record)?;
            progress.inc(1);
        }
        progress.finish_with_message("Mining complete");
        Ok(ids.len())
    }
}
