//! Bulk source mapping through the Firecrawl map API.
//!
//! Each configured source is mapped to the list of links found under it, and the
//! raw API response is stored at `<storage>/maps/<slug>/map_new.json`.

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::config::MappingConfig;

const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev/v1";

#[derive(Error, Debug)]
pub enum MapError {
    #[error("No sources available for mapping in config.")]
    NoSources,
    #[error("{0} not found in environment variables.")]
    MissingApiKey(String),
    #[error("Firecrawl request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Firecrawl API error for {source_url}: {status} - {body}")]
    Api {
        source_url: String,
        status: u16,
        body: String,
    },
    #[error("failed to write map: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode map: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct MapRequest<'a> {
    url: &'a str,
}

/// Client for the Firecrawl `/map` endpoint
pub struct SourceMapper {
    client: Client,
    api_key: String,
    base_url: String,
}

impl SourceMapper {
    pub fn new(api_key: impl Into<String>) -> Result<Self, MapError> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: FIRECRAWL_API_URL.to_string(),
        })
    }

    /// Read the API key from the environment variable named in the config
    pub fn from_config(config: &MappingConfig) -> Result<Self, MapError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| MapError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(api_key)
    }

    /// Point at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Map one source, returning the API response as-is
    pub async fn map_url(&self, source: &str) -> Result<Value, MapError> {
        let response = self
            .client
            .post(format!("{}/map", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&MapRequest { url: source })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MapError::Api {
                source_url: source.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    /// Map every source and persist each map under `storage_dir/maps`
    pub async fn map_sources(
        &self,
        sources: &[String],
        storage_dir: &Path,
    ) -> Result<BTreeMap<String, Value>, MapError> {
        if sources.is_empty() {
            return Err(MapError::NoSources);
        }

        let mut results = BTreeMap::new();
        for source in sources {
            tracing::info!(source = %source, "Mapping source");
            let map = self.map_url(source).await?;

            let map_file = map_file_path(storage_dir, source);
            if let Some(dir) = map_file.parent() {
                tokio::fs::create_dir_all(dir).await?;
            }
            tokio::fs::write(&map_file, serde_json::to_vec_pretty(&map)?).await?;
            tracing::info!(path = %map_file.display(), "Map saved");

            results.insert(source.clone(), map);
        }
        Ok(results)
    }
}

/// Directory-safe name for a source URL
pub fn source_slug(source: &str) -> String {
    source
        .replace("https://", "")
        .replace("http://", "")
        .replace('/', "_")
}

/// Where the map for `source` is written
pub fn map_file_path(storage_dir: &Path, source: &str) -> PathBuf {
    storage_dir
        .join("maps")
        .join(source_slug(source))
        .join("map_new.json")
}
