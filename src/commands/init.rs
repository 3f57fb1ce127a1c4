use anyhow::{Context, Result};
use serde::Serialize;
use statharvest::config::{Config, LocaleTables};
use std::path::Path;

#[derive(Serialize)]
struct LocaleSection<'a> {
    locale: &'a LocaleTables,
}

pub fn init_config(path: &Path) -> Result<()> {
    let config = Config::default();
    let config_path = path.join("statharvest.toml");

    if config_path.exists() {
        anyhow::bail!("Configuration file already exists: {}", config_path.display());
    }

    let locale = toml::to_string_pretty(&LocaleSection {
        locale: &config.locale,
    })
    .context("Failed to serialize locale tables")?;

    let toml_content = format!(
        r#"# statharvest configuration

[harvest]
metadata_url = "{}"
# feed_path = "BFS_OGD_metadata.xml"
queue_dir = "{}"
# "isolate" skips failing records, "abort" stops the import at the first one
failure_policy = "isolate"
# max_packages = 100
quiet = false

[probe]
timeout_secs = {}
connect_timeout_secs = {}
max_redirects = {}
user_agent = "{}"

[catalog]
# "local" keeps a JSON catalog in data_dir, "ckan" talks to api_url
backend = "local"
data_dir = "{}"
# api_url = "https://ckan.example.org"
# api_key is read from CKAN_API_KEY when unset
timeout_secs = {}

[logging]
format = "text"
level = "info"

# Canonical locale, taxonomy, notes labels and organization profile
{}"#,
        config.harvest.metadata_url,
        config.harvest.queue_dir.display(),
        config.probe.timeout_secs,
        config.probe.connect_timeout_secs,
        config.probe.max_redirects,
        config.probe.user_agent,
        config.catalog.data_dir.display(),
        config.catalog.timeout_secs,
        locale,
    );

    std::fs::create_dir_all(path)?;
    std::fs::write(&config_path, toml_content)?;
    println!("Created configuration file: {}", config_path.display());

    Ok(())
}
