// src/aggregate.rs

use crate::model::{MutationCode, Project, SatdId};
use crate::output::{ProjectStats, ResolutionState, SatdEvent, SummaryRow};
use std::collections::HashMap;

fn resolution_of(code: MutationCode) -> ResolutionState {
    match code {
        MutationCode::Removed => ResolutionState::Addressed,
        MutationCode::FileDeleted => ResolutionState::FileDeleted,
        MutationCode::Introduced | MutationCode::Persisted => ResolutionState::NotAddressed,
    }
}

fn first_path(event: &SatdEvent) -> &str {
    if event.old_path.is_empty() {
        &event.new_path
    } else {
        &event.old_path
    }
}

fn last_path(event: &SatdEvent) -> &str {
    if event.new_path.is_empty() {
        &event.old_path
    } else {
        &event.new_path
    }
}

/// Groups events by SATD id, keeping the order in which ids first appear
fn group_by_id(events: &[SatdEvent]) -> Vec<Vec<&SatdEvent>> {
    let mut slots: HashMap<SatdId, usize> = HashMap::new();
    let mut groups: Vec<Vec<&SatdEvent>> = Vec::new();
    for event in events {
        let slot = *slots.entry(event.satd_id).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(event);
    }
    groups
}

fn summarize_one(history: &[&SatdEvent]) -> Option<SummaryRow> {
    let first = *history.first()?;
    let last = *history.last()?;
    let project = Project::new(first.repo_url.as_str());

    let first_path = first_path(first);
    let last_path = if history.len() == 1 {
        first_path
    } else {
        last_path(last)
    };
    let last_line = match last.code {
        MutationCode::Removed | MutationCode::FileDeleted => None,
        MutationCode::Introduced | MutationCode::Persisted => Some(last.line),
    };

    Some(SummaryRow {
        repo_url: first.repo_url.clone(),
        satd_id: first.satd_id,
        first_path: first_path.to_string(),
        last_path: last_path.to_string(),
        renamed: u8::from(first_path != last_path),
        comment: first.comment.clone(),
        context: first.context.clone(),
        first_block: first.block.clone(),
        first_block_type: first.block_type.clone(),
        last_block: last.block.clone(),
        last_block_type: last.block_type.clone(),
        first_line: first.line,
        last_line,
        first_commit: first.commit_hash.clone(),
        last_commit: last.commit_hash.clone(),
        first_link: project.blob_link(&first.commit_hash, first_path, Some(first.line)),
        last_link: project.blob_link(&last.commit_hash, last_path, last_line),
        intro_time: first.commit_date.clone(),
        last_time: last.commit_date.clone(),
        event_count: history.len(),
        resolution: resolution_of(last.code),
    })
}

/// Reduces a tracked-SATD event stream to one lifecycle row per SATD id.
///
/// Pure: the same stream always yields the same rows, in order of each id's
/// first event.
pub fn summarize(events: &[SatdEvent]) -> Vec<SummaryRow> {
    group_by_id(events)
        .iter()
        .filter_map(|history| summarize_one(history))
        .collect()
}

pub fn project_stats(
    repo_url: &str,
    num_comments: usize,
    num_satd_events: usize,
    summary: &[SummaryRow],
) -> ProjectStats {
    let percentage = if num_comments == 0 {
        0.0
    } else {
        num_satd_events as f64 / num_comments as f64 * 100.0
    };
    let count = |state: ResolutionState| summary.iter().filter(|r| r.resolution == state).count();

    ProjectStats {
        repo_url: repo_url.to_string(),
        num_comments,
        num_satd_events,
        satd_percentage: format!("{percentage:.3} %"),
        num_distinct: summary.len(),
        addressed: count(ResolutionState::Addressed),
        not_addressed: count(ResolutionState::NotAddressed),
        file_deleted: count(ResolutionState::FileDeleted),
    }
}
