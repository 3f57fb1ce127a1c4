//! Configuration for statharvest

mod harvest;
mod locale;
mod logging;

pub use harvest::{
    CatalogBackend, CatalogConfig, FailurePolicy, HarvestConfig, ProbeConfig, DEFAULT_METADATA_URL,
};
pub use locale::{
    LocaleLabels, LocaleTables, OrganizationProfile, OrganizationText, TaxonomyEntry, TopicLink,
};
pub use logging::{LogFormat, LogLevel, LoggingConfig};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default user agent for all HTTP requests (feed download, probes, catalog API)
pub const DEFAULT_USER_AGENT: &str = "statharvest/0.1 (+https://opendata.swiss)";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Pipeline configuration
    #[serde(default)]
    pub harvest: HarvestConfig,
    /// Resource probe configuration
    #[serde(default)]
    pub probe: ProbeConfig,
    /// Catalog store configuration
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Locale, taxonomy and organization tables
    #[serde(default)]
    pub locale: LocaleTables,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.harvest.feed_path.is_none() {
            if let Err(e) = url::Url::parse(&self.harvest.metadata_url) {
                errors.push(format!(
                    "metadata_url '{}' is not a valid URL: {}",
                    self.harvest.metadata_url, e
                ));
            }
        }
        if self.harvest.queue_dir.as_os_str().is_empty() {
            errors.push("queue_dir must not be empty".to_string());
        }
        if self.harvest.max_packages == Some(0) {
            errors.push("max_packages must be positive when set".to_string());
        }

        if self.probe.timeout_secs == 0 {
            errors.push("probe timeout_secs must be positive".to_string());
        }
        if self.probe.connect_timeout_secs == 0 {
            errors.push("probe connect_timeout_secs must be positive".to_string());
        }

        match self.catalog.backend {
            CatalogBackend::Local => {
                if self.catalog.data_dir.as_os_str().is_empty() {
                    errors.push("catalog data_dir must not be empty".to_string());
                }
            }
            CatalogBackend::Ckan => match self.catalog.api_url.as_deref() {
                None => errors.push("catalog api_url is required for the ckan backend".to_string()),
                Some(api_url) => {
                    if let Err(e) = url::Url::parse(api_url) {
                        errors.push(format!("catalog api_url '{}' is not a valid URL: {}", api_url, e));
                    }
                }
            },
        }
        if self.catalog.timeout_secs == 0 {
            errors.push("catalog timeout_secs must be positive".to_string());
        }

        errors.extend(self.locale.validation_errors());

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}
