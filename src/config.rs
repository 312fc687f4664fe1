// src/config.rs

use crate::bridge::ExternalBlockService;
use crate::cli::MineArgs;
use crate::detector::{DetectorKind, DetectorSettings, KEYWORDS_1, KEYWORDS_2};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_EXTENSION: &str = "tf";
pub const DEFAULT_OUTPUT_DIR: &str = "data";
pub const DEFAULT_WORK_DIR: &str = ".satd-scratch";
pub const DEFAULT_BLOCK_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_MODEL_JAR: &str = "libs/satd_detector.jar";

/// Contents of the optional TOML file; every key may be omitted
#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub extension: Option<String>,
    pub merge_adjacent: Option<bool>,
    pub output_dir: Option<PathBuf>,
    pub detector: Option<DetectorFileConfig>,
    pub block_service: Option<BlockServiceFileConfig>,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DetectorFileConfig {
    pub kind: Option<DetectorKind>,
    pub keywords1: Option<Vec<String>>,
    pub keywords2: Option<Vec<String>>,
    pub model_jar: Option<PathBuf>,
    pub model_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BlockServiceFileConfig {
    pub java: Option<String>,
    pub jar: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let cfg: FileConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    info!(path = %path.display(), "loaded config");
    Ok(cfg)
}

/// Effective settings of a `mine` run
#[derive(Debug, Clone)]
pub struct MineSettings {
    pub extension: String,
    pub merge_adjacent: bool,
    pub output_dir: PathBuf,
    pub detector: DetectorSettings,
    /// `None` when no block jar is configured
    pub block_service: Option<ExternalBlockService>,
    pub show_progress: bool,
}

impl MineSettings {
    /// CLI flags win over file values, file values win over defaults
    pub fn resolve(args: &MineArgs, file: FileConfig) -> Self {
        let detector_cfg = file.detector.unwrap_or_default();
        let block_cfg = file.block_service.unwrap_or_default();
        let java = block_cfg.java.unwrap_or_else(|| "java".to_string());

        let detector = DetectorSettings {
            kind: args
                .detector
                .or(detector_cfg.kind)
                .unwrap_or(DetectorKind::Keywords),
            keywords1: detector_cfg
                .keywords1
                .unwrap_or_else(|| KEYWORDS_1.iter().map(|k| k.to_string()).collect()),
            keywords2: detector_cfg
                .keywords2
                .unwrap_or_else(|| KEYWORDS_2.iter().map(|k| k.to_string()).collect()),
            java: java.clone(),
            model_jar: args
                .model_jar
                .clone()
                .or(detector_cfg.model_jar)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_JAR)),
            model_timeout: Duration::from_secs(
                detector_cfg
                    .model_timeout_secs
                    .unwrap_or(DEFAULT_MODEL_TIMEOUT_SECS),
            ),
        };

        let block_service = args.block_jar.clone().or(block_cfg.jar).map(|jar| ExternalBlockService {
            java,
            jar,
            work_dir: block_cfg
                .work_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_DIR)),
            timeout: Duration::from_secs(
                args.block_timeout_secs
                    .or(block_cfg.timeout_secs)
                    .unwrap_or(DEFAULT_BLOCK_TIMEOUT_SECS),
            ),
        });

        Self {
            extension: args
                .extension
                .clone()
                .or(file.extension)
                .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
                .trim_start_matches('.')
                .to_string(),
            merge_adjacent: args.merge_adjacent || file.merge_adjacent.unwrap_or(false),
            output_dir: args
                .output
                .clone()
                .or(file.output_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            detector,
            block_service,
            show_progress: !args.no_progress,
        }
    }
}
