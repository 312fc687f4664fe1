// src/lifecycle.rs

use crate::bridge::{BlockResolver, ResolvedBlock};
use crate::comments::comment_context;
use crate::error::TrackerError;
use crate::model::{Comment, FileState, IdAllocator, MutationCode, Project, SatdComment};
use crate::output::{EventSink, SatdEvent};
use crate::registry::SatdCommentList;
use tracing::debug;

/// What happened to a file at a commit, from the tracker's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Executor {
    /// First sighting of a path: every SATD comment is new
    Add,
    /// Known path changed: reconcile live comments against the new revision
    Modify,
    /// Known path moved: live comments carry over, then reconcile like Modify
    Rename,
    /// Known path removed: every live comment ends with the file
    Delete,
}

/// Everything an executor touches besides the file itself
pub struct Env<'a> {
    pub project: &'a Project,
    pub registry: &'a mut SatdCommentList,
    pub ids: &'a mut IdAllocator,
    pub sink: &'a mut dyn EventSink,
    pub blocks: BlockResolver<'a>,
}

impl Executor {
    /// Applies the transition for `file`, given the SATD comments classified
    /// in its current revision (ignored for deletions).
    pub fn run(self, env: &mut Env<'_>, file: &FileState, found: Vec<Comment>) -> Result<(), TrackerError> {
        debug!(path = %file.new_path, executor = ?self, satd = found.len(), "applying transition");
        match self {
            Executor::Add => add(env, file, found),
            Executor::Modify | Executor::Rename => reconcile(env, file, found),
            Executor::Delete => delete(env, file),
        }
    }
}

/// Keeps the first comment for each distinct text; identity is the text, so
/// later duplicates in the same revision are the same SATD item.
fn distinct_by_text(found: Vec<Comment>) -> Vec<Comment> {
    let mut seen: Vec<Comment> = Vec::with_capacity(found.len());
    for comment in found {
        if seen.iter().any(|c| c.text == comment.text) {
            debug!(line = comment.line, text = %comment.text, "duplicate SATD text collapsed");
            continue;
        }
        seen.push(comment);
    }
    seen
}

fn event_row(
    env: &Env<'_>,
    file: &FileState,
    satd: &SatdComment,
    context: String,
    block: &ResolvedBlock,
) -> SatdEvent {
    SatdEvent {
        repo_url: env.project.url.clone(),
        satd_id: satd.id,
        old_path: file.old_path.clone(),
        new_path: file.new_path.clone(),
        comment: satd.text.clone(),
        context,
        block: block.code.clone(),
        block_type: block.kind.clone(),
        line: satd.line,
        num_lines: file.num_lines,
        commit_hash: file.commit.hash.clone(),
        commit_msg: file.commit.message.clone(),
        dev_email: file.commit.author_email.clone(),
        commit_date: file.commit.date.clone(),
        code: satd.code,
    }
}

fn introduce(env: &mut Env<'_>, file: &FileState, comment: Comment) -> Result<(), TrackerError> {
    let block = env.blocks.by_line(comment.line);
    let satd = SatdComment {
        id: env.ids.satd(),
        line: comment.line,
        text: comment.text,
        code: MutationCode::Introduced,
        block: block.descriptor.clone(),
    };
    let row = event_row(env, file, &satd, comment_context(&file.content, satd.line), &block);
    env.sink.event(row)?;
    env.registry.add_comment(file.id, satd);
    Ok(())
}

fn add(env: &mut Env<'_>, file: &FileState, found: Vec<Comment>) -> Result<(), TrackerError> {
    env.registry.add_file(file.id);
    for comment in distinct_by_text(found) {
        introduce(env, file, comment)?;
    }
    Ok(())
}

fn reconcile(env: &mut Env<'_>, file: &FileState, found: Vec<Comment>) -> Result<(), TrackerError> {
    env.registry.add_file(file.id);
    let mut unmatched = env.registry.snapshot(file.id);

    for comment in distinct_by_text(found) {
        let Some(pos) = unmatched.iter().position(|s| s.text == comment.text) else {
            introduce(env, file, comment)?;
            continue;
        };
        let previous = unmatched.remove(pos);
        let block = env.blocks.by_line(comment.line);
        let persisted = SatdComment {
            id: previous.id,
            text: previous.text,
            line: comment.line,
            code: MutationCode::Persisted,
            block: block.descriptor.clone().or(previous.block),
        };
        let row = event_row(env, file, &persisted, comment_context(&file.content, persisted.line), &block);
        env.sink.event(row)?;
        env.registry.update_comment(file.id, persisted);
    }

    for gone in unmatched {
        let block = env.blocks.by_identifier(gone.block.as_ref());
        let removed = SatdComment {
            line: 0,
            code: MutationCode::Removed,
            ..gone
        };
        let row = event_row(env, file, &removed, removed.text.clone(), &block);
        env.sink.event(row)?;
        env.registry.remove_comment(file.id, &removed.text);
    }
    Ok(())
}

fn delete(env: &mut Env<'_>, file: &FileState) -> Result<(), TrackerError> {
    for gone in env.registry.remove_file(file.id) {
        let block = env.blocks.by_identifier(gone.block.as_ref());
        let deleted = SatdComment {
            line: 0,
            code: MutationCode::FileDeleted,
            ..gone
        };
        let row = event_row(env, file, &deleted, deleted.text.clone(), &block);
        env.sink.event(row)?;
    }
    Ok(())
}
