//! Configuration loading and management for redraft.
//!
//! Loads settings from `redraft.toml` with environment variable overrides for sensitive data.
//! Every section has defaults, so running without a config file is fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Model used for both the rewrite and the review pass unless configured otherwise.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Page used when the user does not supply one.
pub const DEFAULT_URL: &str = "https://en.wikisource.org/wiki/The_Gates_of_Morning/Book_1/Chapter_1";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("missing required API key for provider: {0}")]
    MissingApiKey(String),
    #[error("unsupported {kind}: {value}")]
    Unsupported { kind: &'static str, value: String },
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// LLM provider, only "gemini" is wired up
    pub provider: String,
    /// Model identifier (e.g., "gemini-2.5-flash")
    pub model: String,
}

/// API keys configuration (loaded from environment)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub gemini_key: Option<String>,
}

/// Storage paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base path for data storage
    pub path: PathBuf,
}

/// Page fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// CSS selector of the region holding the chapter text
    pub content_selector: String,
    /// Where text copies and snapshots land; defaults to `<storage>/raw`
    pub raw_dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

/// Narration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    /// Where MP3 artifacts land; defaults to `<storage>/audio`
    pub audio_dir: Option<PathBuf>,
    pub lang: String,
}

/// Embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "fastembed" (all-MiniLM-L6-v2) or "hash" (offline pseudo-embeddings)
    pub provider: String,
}

/// Interactive workflow defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Save original / rewritten / reviewed drafts as they are produced
    pub auto_save: bool,
    pub default_url: String,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub narration: NarrationConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

impl Config {
    /// Load configuration from the default location (redraft.toml in cwd or home),
    /// falling back to defaults when no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::find_config_file() {
            Some(path) => Self::parse_file(&path)?,
            None => Config::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::parse_file(path)?;
        config.apply_env();
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Override API keys from environment variables
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            self.api.gemini_key = Some(key);
        }
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        // Check current directory first
        let local_config = PathBuf::from("redraft.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let home_config = dirs::home_dir()?
            .join(".config")
            .join("redraft")
            .join("redraft.toml");
        home_config.exists().then_some(home_config)
    }

    /// Get the API key for the configured provider
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        match self.agent.provider.as_str() {
            "gemini" => self
                .api
                .gemini_key
                .as_deref()
                .ok_or_else(|| ConfigError::MissingApiKey("gemini".to_string())),
            other => Err(ConfigError::Unsupported {
                kind: "provider",
                value: other.to_string(),
            }),
        }
    }

    /// Directory of the sled version database
    pub fn versions_path(&self) -> PathBuf {
        self.storage.path.join("versions")
    }

    /// Directory of the tantivy keyword index
    pub fn search_index_path(&self) -> PathBuf {
        self.storage.path.join("search_index")
    }

    /// File the approved final text is exported to
    pub fn export_path(&self) -> PathBuf {
        self.storage.path.join("final_output.txt")
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.fetch
            .raw_dir
            .clone()
            .unwrap_or_else(|| self.storage.path.join("raw"))
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.narration
            .audio_dir
            .clone()
            .unwrap_or_else(|| self.storage.path.join("audio"))
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data"),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            content_selector: "#mw-content-text".to_string(),
            raw_dir: None,
            timeout_secs: 30,
        }
    }
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            audio_dir: None,
            lang: "en".to_string(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "fastembed".to_string(),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            auto_save: false,
            default_url: DEFAULT_URL.to_string(),
        }
    }
}
