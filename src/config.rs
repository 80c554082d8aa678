//! Configuration management for reviewlens.
//!
//! Settings come from a TOML file (every section optional), with environment
//! variables loaded via `.env` for secrets and CLI flags layered on top.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analysis::llm::LlmConfig;
use crate::scrape::browser::BrowserEngineConfig;

/// Top-level application settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Browser engine configuration.
    #[serde(default)]
    pub browser: BrowserEngineConfig,

    /// Collection behavior.
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// LLM summarization configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Persistence configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Web server configuration.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Collection behavior knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Target number of records per rating category.
    #[serde(default = "default_max_records")]
    pub max_records_per_category: usize,

    /// Consecutive unexpected failures tolerated before a session aborts.
    #[serde(default = "default_failure_ceiling")]
    pub max_consecutive_failures: u32,

    /// Hard wall-clock limit for one category's session, in seconds.
    #[serde(default = "default_category_timeout")]
    pub category_timeout_secs: u64,

    /// Maximum characters of concatenated review text handed to the LLM.
    #[serde(default = "default_max_review_chars")]
    pub max_review_chars: usize,
}

fn default_max_records() -> usize {
    100
}

fn default_failure_ceiling() -> u32 {
    3
}

fn default_category_timeout() -> u64 {
    420
}

fn default_max_review_chars() -> usize {
    15_000
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_records_per_category: default_max_records(),
            max_consecutive_failures: default_failure_ceiling(),
            category_timeout_secs: default_category_timeout(),
            max_review_chars: default_max_review_chars(),
        }
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("reviewlens.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, or defaults when the file is absent.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => PathBuf::from("reviewlens.toml"),
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path)?;
        let settings: Settings = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Invalid config file {}: {}", path.display(), e))?;
        Ok(settings)
    }
}
