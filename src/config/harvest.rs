//! Harvest, probe and catalog configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::DEFAULT_USER_AGENT;

/// Metadata feed published by the Swiss Federal Statistical Office
pub const DEFAULT_METADATA_URL: &str = "http://www.bfs.admin.ch/xmlns/opendata/BFS_OGD_metadata.xml";

/// What the import stage does when a record fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Skip the failing record and continue with the next one
    #[default]
    Isolate,
    /// Stop the import batch at the first failing record
    Abort,
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Remote metadata feed URL
    pub metadata_url: String,
    /// Read the feed from a local file instead of `metadata_url`
    pub feed_path: Option<PathBuf>,
    /// Directory holding queued harvest objects
    pub queue_dir: PathBuf,
    /// Import stage failure policy
    pub failure_policy: FailurePolicy,
    /// Maximum packages to queue per gather run (None = unlimited)
    pub max_packages: Option<usize>,
    /// Suppress progress bars
    pub quiet: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            feed_path: None,
            queue_dir: PathBuf::from(".statharvest/queue"),
            failure_policy: FailurePolicy::Isolate,
            max_packages: None,
            quiet: false,
        }
    }
}

/// Resource availability probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Request timeout (seconds)
    pub timeout_secs: u64,
    /// Connection timeout (seconds)
    pub connect_timeout_secs: u64,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// User agent string
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_redirects: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Catalog store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogBackend {
    /// JSON document on local disk
    #[default]
    Local,
    /// CKAN action API
    Ckan,
}

/// Catalog store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub backend: CatalogBackend,
    /// Data directory of the local backend
    pub data_dir: PathBuf,
    /// CKAN site URL (e.g. "https://opendata.example.org")
    pub api_url: Option<String>,
    /// CKAN API key; falls back to the `CKAN_API_KEY` environment variable
    pub api_key: Option<String>,
    /// CKAN request timeout (seconds)
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            backend: CatalogBackend::Local,
            data_dir: PathBuf::from(".statharvest/catalog"),
            api_url: None,
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl CatalogConfig {
    /// API key from config or environment
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("CKAN_API_KEY").ok())
    }
}
