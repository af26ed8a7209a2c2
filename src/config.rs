use crate::probe::Codec;
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeTarget {
    pub codec: Codec,
    pub bitrate_kbps: u32,
}

impl Default for EncodeTarget {
    fn default() -> Self {
        Self {
            codec: Codec::Mp3,
            bitrate_kbps: 256,
        }
    }
}

/// Filename/directory conventions the metadata resolver is allowed to
/// assume. Kept in config because the grammar varies between libraries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRules {
    /// Token separating artist/track-number from title in filenames.
    pub separator: String,
    /// Directory names that must never be taken as artist or album.
    pub placeholders: Vec<String>,
}

impl Default for InferenceRules {
    fn default() -> Self {
        Self {
            separator: " - ".to_string(),
            placeholders: vec![
                "Unknown Artist".to_string(),
                "Unknown Album".to_string(),
                "Unknown".to_string(),
                "Various Artists".to_string(),
            ],
        }
    }
}

impl InferenceRules {
    pub fn is_placeholder(&self, name: &str) -> bool {
        self.placeholders
            .iter()
            .any(|p| p.eq_ignore_ascii_case(name.trim()))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub roots: Vec<PathBuf>,
    pub target: EncodeTarget,
    pub extensions: Vec<String>,
    pub webhook_url: Option<String>,
    pub jobs: Option<usize>,
    pub inference: InferenceRules,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            target: EncodeTarget::default(),
            extensions: [
                "wav", "flac", "ogg", "aac", "m4a", "wma", "alac", "aiff", "mp3",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            webhook_url: None,
            jobs: None,
            inference: InferenceRules::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roots.is_empty() {
            return Err(ConfigError::NoRoots);
        }
        for root in &self.roots {
            if !root.is_dir() {
                return Err(ConfigError::RootInaccessible(root.clone()));
            }
        }
        if self.target.codec == Codec::Unknown || self.target.codec.ffmpeg_encoder().is_none() {
            return Err(ConfigError::InvalidTargetCodec(self.target.codec));
        }
        if !(8..=2000).contains(&self.target.bitrate_kbps) {
            return Err(ConfigError::InvalidBitrate(self.target.bitrate_kbps));
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::NoExtensions);
        }
        if let Some(url) = &self.webhook_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidWebhookUrl(url.clone()));
            }
        }
        if self.jobs == Some(0) {
            return Err(ConfigError::InvalidJobs);
        }
        Ok(())
    }

    pub fn recognizes(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .is_some_and(|e| self.extensions.iter().any(|known| known == &e))
    }

    pub fn effective_jobs(&self) -> usize {
        self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no root directories configured")]
    NoRoots,
    #[error("root directory {0} is missing or not a directory")]
    RootInaccessible(PathBuf),
    #[error("target codec {0} cannot be encoded")]
    InvalidTargetCodec(Codec),
    #[error("target bitrate {0} kbps is out of range")]
    InvalidBitrate(u32),
    #[error("no recognized file extensions configured")]
    NoExtensions,
    #[error("webhook url {0} is not an http(s) endpoint")]
    InvalidWebhookUrl(String),
    #[error("jobs must be at least 1")]
    InvalidJobs,
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new() -> Result<Self> {
        let base = BaseDirs::new().context("unable to resolve home directory")?;
        let path = base.home_dir().join(".config").join("audiopress.yaml");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read config {}", self.path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config dir {}", parent.display()))?;
        }
        let contents = serde_yaml::to_string(config)?;
        fs::write(&self.path, contents)
            .with_context(|| format!("write config {}", self.path.display()))?;
        Ok(())
    }
}
