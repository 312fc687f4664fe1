// src/bridge.rs

use crate::error::BridgeError;
use crate::model::BlockDescriptor;
use crate::process::run_with_timeout;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, warn};

/// Reported instead of block code when a removed comment's block cannot be
/// found again by its identifier.
pub const BLOCK_GONE: &str = "the block associated got renamed or deleted";

/// Anything that can map IaC source to its structural blocks.
///
/// The process-backed service below hands content over through a scratch file;
/// an in-process parser can implement this trait directly.
pub trait BlockLocator {
    fn analyze(&mut self, content: &str) -> Result<BlockIndex, BridgeError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBlock {
    #[serde(default)]
    pub start_block: Option<usize>,
    #[serde(default)]
    pub end_block: Option<usize>,
    #[serde(default)]
    pub block: Option<String>,
    #[serde(default)]
    pub block_identifiers: Option<serde_json::Value>,
}

impl RawBlock {
    fn descriptor(&self) -> Option<BlockDescriptor> {
        Some(BlockDescriptor {
            start: self.start_block?,
            end: self.end_block?,
            kind: self.block.clone()?,
            identifier: self.block_identifiers.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ServiceResult {
    data: Vec<RawBlock>,
}

/// Blocks of one analyzed file, plus the content they were computed from
#[derive(Debug, Clone)]
pub struct BlockIndex {
    blocks: Vec<RawBlock>,
    lines: Vec<String>,
}

impl BlockIndex {
    pub fn new(blocks: Vec<RawBlock>, content: &str) -> Self {
        Self {
            blocks,
            lines: content.split('\n').map(str::to_string).collect(),
        }
    }

    pub fn from_json(json: &str, content: &str) -> Result<Self, BridgeError> {
        let result: ServiceResult =
            serde_json::from_str(json).map_err(|e| BridgeError::Malformed(e.to_string()))?;
        Ok(Self::new(result.data, content))
    }

    /// First block whose end is at or after `line`
    pub fn resolve_by_line(&self, line: usize) -> Option<BlockDescriptor> {
        self.blocks
            .iter()
            .filter_map(RawBlock::descriptor)
            .find(|b| line <= b.end)
    }

    /// First block carrying exactly this identifier
    pub fn resolve_by_identifier(&self, id: &serde_json::Value) -> Option<BlockDescriptor> {
        self.blocks
            .iter()
            .find(|b| b.block_identifiers.as_ref() == Some(id))
            .and_then(RawBlock::descriptor)
    }

    /// Source lines `start..=end` (1-based), clamped to the content
    pub fn block_code(&self, block: &BlockDescriptor) -> String {
        let from = block.start.saturating_sub(1).min(self.lines.len());
        let to = block.end.min(self.lines.len()).max(from);
        let mut code = self.lines[from..to].join("\n");
        if to > from && to < self.lines.len() {
            code.push('\n');
        }
        code
    }
}

/// Block association through the external analysis jar
#[derive(Debug, Clone)]
pub struct ExternalBlockService {
    pub java: String,
    pub jar: PathBuf,
    pub work_dir: PathBuf,
    pub timeout: Duration,
}

impl ExternalBlockService {
    pub fn scratch_path(&self) -> PathBuf {
        self.work_dir.join("tmp.tf")
    }

    pub fn result_path(&self) -> PathBuf {
        self.work_dir.join("block_results.json")
    }

    fn clear_result(path: &Path) -> Result<(), BridgeError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl BlockLocator for ExternalBlockService {
    fn analyze(&mut self, content: &str) -> Result<BlockIndex, BridgeError> {
        fs::create_dir_all(&self.work_dir)?;
        let scratch = self.scratch_path();
        let target = self.result_path();
        fs::write(&scratch, content)?;
        Self::clear_result(&target)?;

        let mut cmd = Command::new(&self.java);
        cmd.arg("-jar")
            .arg(&self.jar)
            .arg("--file")
            .arg(&scratch)
            .arg("--target")
            .arg(&target)
            .arg("-b");
        let output = run_with_timeout(&mut cmd, None, self.timeout)?;
        if !output.status.success() {
            return Err(BridgeError::Failed {
                code: output.status.code(),
                stderr: output.stderr.trim().to_string(),
            });
        }

        let json = fs::read_to_string(&target).map_err(|_| BridgeError::MissingResult(target))?;
        BlockIndex::from_json(&json, content)
    }
}

/// Stand-in used when no block service is configured
#[derive(Debug, Default)]
pub struct DisabledLocator;

impl BlockLocator for DisabledLocator {
    fn analyze(&mut self, _content: &str) -> Result<BlockIndex, BridgeError> {
        Err(BridgeError::Disabled)
    }
}

/// What a row reports about a comment's block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedBlock {
    pub descriptor: Option<BlockDescriptor>,
    pub code: String,
    pub kind: String,
}

impl ResolvedBlock {
    fn gone() -> Self {
        Self {
            descriptor: None,
            code: BLOCK_GONE.to_string(),
            kind: String::new(),
        }
    }
}

/// Per-file-touch view of the block service: analyzes the content at most
/// once, on first use, and degrades to "no block" on any failure.
pub struct BlockResolver<'a> {
    locator: &'a mut dyn BlockLocator,
    content: &'a str,
    index: Option<Option<BlockIndex>>,
}

impl<'a> BlockResolver<'a> {
    pub fn new(locator: &'a mut dyn BlockLocator, content: &'a str) -> Self {
        Self {
            locator,
            content,
            index: None,
        }
    }

    fn index(&mut self) -> Option<&BlockIndex> {
        if self.index.is_none() {
            let analyzed = if self.content.is_empty() {
                None
            } else {
                match self.locator.analyze(self.content) {
                    Ok(index) => Some(index),
                    Err(BridgeError::Disabled) => {
                        debug!("block association disabled");
                        None
                    }
                    Err(e) => {
                        warn!(error = %e, "block association failed, continuing without blocks");
                        None
                    }
                }
            };
            self.index = Some(analyzed);
        }
        self.index.as_ref().and_then(Option::as_ref)
    }

    /// Block enclosing `line`, or empty fields
    pub fn by_line(&mut self, line: usize) -> ResolvedBlock {
        let Some(index) = self.index() else {
            return ResolvedBlock::default();
        };
        match index.resolve_by_line(line) {
            Some(block) => ResolvedBlock {
                code: index.block_code(&block),
                kind: block.kind.clone(),
                descriptor: Some(block),
            },
            None => ResolvedBlock::default(),
        }
    }

    /// Re-locates a previously captured block through its identifier, or
    /// reports [`BLOCK_GONE`]
    pub fn by_identifier(&mut self, previous: Option<&BlockDescriptor>) -> ResolvedBlock {
        let Some(id) = previous.and_then(|b| b.identifier.as_ref()) else {
            return ResolvedBlock::gone();
        };
        let Some(index) = self.index() else {
            return ResolvedBlock::gone();
        };
        match index.resolve_by_identifier(id) {
            Some(block) => ResolvedBlock {
                code: index.block_code(&block),
                kind: block.kind.clone(),
                descriptor: Some(block),
            },
            None => ResolvedBlock::gone(),
        }
    }
}
