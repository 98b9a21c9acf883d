//! Configuration loading and management for docqa.
//!
//! Loads settings from `docqa.toml` with environment variable overrides for sensitive data.
//! Every section has defaults, so a missing file yields a working local setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::agent::Provider;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("missing required API key for provider: {0}")]
    MissingApiKey(String),
    #[error("unknown LLM provider '{0}' (expected one of: dummy, gemini)")]
    UnknownProvider(String),
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// LLM provider: "dummy" or "gemini"
    pub provider: String,
    /// Model identifier (e.g., "gemini-2.0-flash")
    pub model: String,
    /// System persona for the agent
    pub persona: String,
    /// Summarization instructions prepended to every document
    pub prompt: String,
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
    /// Directory holding the PDFs and `documents.json`
    pub path: PathBuf,
}

/// Headless browser settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Chromium executable name or path
    pub browser: String,
    /// Wall-clock limit for one navigation, in seconds
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

/// Admin credentials for the HTTP basic gate (environment only)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

/// Bulk source mapping settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Root URLs to map
    pub sources: Vec<String>,
    /// Name of the environment variable holding the Firecrawl API key
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatConfig {
    /// Document answered against when a chat request names none
    #[serde(default)]
    pub document_id: Option<String>,
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl Config {
    /// Load configuration from the default location (docqa.toml in cwd or home).
    ///
    /// Falls back to defaults plus environment overrides when no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => Self::load_from(&path),
            None => {
                let mut config = Config::default();
                config.apply_env();
                Ok(config)
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Parse configuration text without consulting the environment
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            self.api.gemini_key = Some(key);
        }
        if let Ok(username) = std::env::var("ADMIN_USERNAME") {
            self.auth.username = username;
        }
        if let Ok(password) = std::env::var("ADMIN_PASSWORD") {
            self.auth.password = password;
        }
        if let Ok(bind) = std::env::var("DOCQA_BIND") {
            self.server.bind = bind;
        }
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        // Check current directory first
        let local_config = PathBuf::from("docqa.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        // Check home directory
        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config").join("docqa").join("docqa.toml");
            if home_config.exists() {
                return Some(home_config);
            }
        }

        None
    }

    /// Get the API key for the configured provider
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        match self.agent.provider.parse::<Provider>()? {
            Provider::Gemini => self
                .api
                .gemini_key
                .as_deref()
                .ok_or_else(|| ConfigError::MissingApiKey("gemini".to_string())),
            Provider::Dummy => Err(ConfigError::MissingApiKey("dummy".to_string())),
        }
    }

    /// Path of the persisted document store
    pub fn documents_file(&self) -> PathBuf {
        self.storage.path.join("documents.json")
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: "dummy".to_string(),
            model: "gemini-2.0-flash".to_string(),
            persona: "You are a helpful document processing and analysis assistant. \
                      You will act upon text provided to you according to the instructions given below."
                .to_string(),
            prompt: "Summarize the following document according to these instructions:\n\
                     1. List the top 5 topics discussed in the document.\n\
                     2. Briefly describe the discussion for each topic.\n\
                     3. Provide a more detailed description for each topic."
                .to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/pdf_sources"),
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            browser: "chromium".to_string(),
            timeout_secs: 60,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/101.0.4951.67 Safari/537.36"
                .to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "secret".to_string(),
        }
    }
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            api_key_env: "FIRECRAWL_API_KEY".to_string(),
        }
    }
}
