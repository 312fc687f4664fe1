// src/registry.rs

use crate::model::{FileId, SatdComment};
use std::collections::HashMap;

/// Live SATD comments, keyed by file.
///
/// Lookups are linear scans on exact comment text: the text is the only key
/// that stays stable across commits, and per-file lists are short.
#[derive(Debug, Default)]
pub struct SatdCommentList {
    live: HashMap<FileId, Vec<SatdComment>>,
}

impl SatdCommentList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, file: FileId) {
        self.live.entry(file).or_default();
    }

    /// Drops the file and hands back whatever was still live under it
    pub fn remove_file(&mut self, file: FileId) -> Vec<SatdComment> {
        self.live.remove(&file).unwrap_or_default()
    }

    pub fn add_comment(&mut self, file: FileId, satd: SatdComment) {
        let comments = self.live.entry(file).or_default();
        debug_assert!(
            !comments.iter().any(|c| c.text == satd.text),
            "duplicate live SATD text under file {file}: {:?}",
            satd.text
        );
        comments.push(satd);
    }

    /// Replaces the live entry carrying the same text, keeping its position.
    /// Returns false if no such entry exists.
    pub fn update_comment(&mut self, file: FileId, satd: SatdComment) -> bool {
        let Some(comments) = self.live.get_mut(&file) else {
            return false;
        };
        match comments.iter_mut().find(|c| c.text == satd.text) {
            Some(slot) => {
                *slot = satd;
                true
            }
            None => false,
        }
    }

    pub fn remove_comment(&mut self, file: FileId, text: &str) -> Option<SatdComment> {
        let comments = self.live.get_mut(&file)?;
        let pos = comments.iter().position(|c| c.text == text)?;
        Some(comments.remove(pos))
    }

    pub fn live_comments_of(&self, file: FileId) -> &[SatdComment] {
        self.live.get(&file).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find_by_text(&self, file: FileId, text: &str) -> Option<&SatdComment> {
        self.live_comments_of(file).iter().find(|c| c.text == text)
    }

    /// Owned copy of a file's live list, taken before a reconciliation mutates it
    pub fn snapshot(&self, file: FileId) -> Vec<SatdComment> {
        self.live_comments_of(file).to_vec()
    }

    pub fn live_count(&self) -> usize {
        self.live.values().map(Vec::len).sum()
    }

    pub fn file_count(&self) -> usize {
        self.live.len()
    }
}
