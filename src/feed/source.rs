//! Feed transport: where the raw metadata document comes from

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{HarvestConfig, ProbeConfig};

/// Errors that can occur while reading or parsing the feed
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed download failed with status {status}: {url}")]
    Status { status: u16, url: String },

    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("<{element}> is missing the {attribute} attribute")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("Unexpected end of feed inside <{0}>")]
    UnexpectedEof(&'static str),
}

impl From<quick_xml::Error> for FeedError {
    fn from(e: quick_xml::Error) -> Self {
        FeedError::XmlParse(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for FeedError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        FeedError::XmlParse(e.to_string())
    }
}

/// Anything that can hand over the raw feed document
pub trait FeedSource: Send + Sync {
    /// Retrieve the complete feed document
    fn fetch(&self) -> Result<Vec<u8>, FeedError>;

    /// Get the source name for display
    fn source_name(&self) -> &str;
}

/// Feed downloaded with a plain GET
#[derive(Debug)]
pub struct HttpFeed {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpFeed {
    pub fn new(url: impl Into<String>, probe: &ProbeConfig) -> Result<Self, FeedError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(probe.timeout_secs))
            .connect_timeout(Duration::from_secs(probe.connect_timeout_secs))
            .user_agent(&probe.user_agent)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl FeedSource for HttpFeed {
    fn fetch(&self) -> Result<Vec<u8>, FeedError> {
        info!("Downloading metadata feed: {}", self.url);
        let response = self.client.get(&self.url).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        let bytes = response.bytes()?;
        debug!("Fetched {} bytes from {}", bytes.len(), self.url);
        Ok(bytes.to_vec())
    }

    fn source_name(&self) -> &str {
        &self.url
    }
}

/// Feed read from local disk
#[derive(Debug, Clone)]
pub struct FileFeed {
    path: PathBuf,
    name: String,
}

impl FileFeed {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path.to_string_lossy().to_string();
        Self { path, name }
    }
}

impl FeedSource for FileFeed {
    fn fetch(&self) -> Result<Vec<u8>, FeedError> {
        info!("Reading metadata feed: {}", self.path.display());
        Ok(std::fs::read(&self.path)?)
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

/// Open the feed named by the configuration: a local file if `feed_path`
/// is set, the remote `metadata_url` otherwise
pub fn open_feed(
    harvest: &HarvestConfig,
    probe: &ProbeConfig,
) -> Result<Box<dyn FeedSource>, FeedError> {
    match harvest.feed_path {
        Some(ref path) => Ok(Box::new(FileFeed::new(path))),
        None => Ok(Box::new(HttpFeed::new(harvest.metadata_url.clone(), probe)?)),
    }
}
