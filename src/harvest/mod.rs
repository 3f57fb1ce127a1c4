//! Three-stage harvest pipeline
//!
//! # Stages
//!
//! - **gather**: download and parse the feed, build one record per package
//!   and queue it as a [`HarvestObject`]
//! - **fetch**: validate queued content and mark it ready for import
//! - **import**: resolve groups and organization, then upsert the package and
//!   its translations into the catalog
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      HarvestRunner                       │
//! │          (queue, failure policy, progress, stats)        │
//! └──────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Harvester trait                      │
//! │        gather_stage / fetch_stage / import_stage         │
//! └──────────────────────────────────────────────────────────┘
//!              │                               │
//!              ▼                               ▼
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │      FeedHarvester       │   │     IdentityResolver     │
//! │ - FeedSource + parser    │   │ - get-or-create groups   │
//! │ - MetadataRecordBuilder  │   │ - unique slugs           │
//! └──────────────────────────┘   └──────────────────────────┘
//!                                              │
//!                                              ▼
//!                                ┌──────────────────────────┐
//!                                │       CatalogStore       │
//!                                └──────────────────────────┘
//! ```

pub mod feed_harvester;
pub mod importer;
pub mod object;
pub mod progress;
pub mod queue;
pub mod runner;

pub use feed_harvester::FeedHarvester;
pub use importer::{IdentityResolver, ImportSummary};
pub use object::{HarvestObject, ObjectState};
pub use progress::{HarvestProgress, HarvestStats};
pub use queue::{DirQueue, HarvestQueue, MemoryQueue, QueueCounts, QueueError};
pub use runner::{HarvestRunner, HarvestRunnerBuilder};

use crate::catalog::{CatalogError, CatalogStore};
use crate::feed::FeedError;
use crate::gather::SkipReason;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the harvest stages
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Invalid content in harvest object {guid}: {source}")]
    Content {
        guid: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Group is not defined for dataset {0}")]
    UnresolvedGroup(String),

    #[error("Could not find a free package name for '{0}'")]
    NameExhausted(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Import aborted at {guid}: {message}")]
    Aborted { guid: String, message: String },
}

impl HarvestError {
    /// Whether the failing record may succeed on a later run
    pub fn is_recoverable(&self) -> bool {
        match self {
            HarvestError::Catalog(e) => e.is_recoverable(),
            HarvestError::Queue(QueueError::Io(_)) => true,
            _ => false,
        }
    }
}

/// Result of importing one record
#[derive(Debug)]
pub enum RecordOutcome {
    Imported(ImportSummary),
    /// Transient failure; the object stays queued for a later run
    Recoverable(HarvestError),
    /// Permanent failure; the object is marked errored
    Fatal(HarvestError),
}

impl RecordOutcome {
    /// Classify the result of an import attempt
    pub fn from_result(result: Result<ImportSummary, HarvestError>) -> Self {
        match result {
            Ok(summary) => RecordOutcome::Imported(summary),
            Err(e) if e.is_recoverable() => RecordOutcome::Recoverable(e),
            Err(e) => RecordOutcome::Fatal(e),
        }
    }
}

/// Descriptive metadata of a harvester implementation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvesterInfo {
    pub name: String,
    pub title: String,
    pub description: String,
}

/// One gather run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestJob {
    pub id: String,
    pub source: String,
    pub started_at: DateTime<Utc>,
}

impl HarvestJob {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source: source.into(),
            started_at: Utc::now(),
        }
    }
}

/// Everything the gather stage produced
#[derive(Debug, Default)]
pub struct GatherOutput {
    pub objects: Vec<HarvestObject>,
    pub packages_seen: usize,
    /// Dataset id and reason of every package that produced no record
    pub skipped: Vec<(String, SkipReason)>,
    pub resources_probed: usize,
    pub resources_unreachable: usize,
}

/// A harvestable data source
pub trait Harvester {
    fn info(&self) -> HarvesterInfo;

    /// Enumerate candidates and build one queued object per record.
    ///
    /// Fails as a whole: nothing is queued when this returns an error.
    fn gather_stage(&self, job: &HarvestJob) -> Result<GatherOutput, HarvestError>;

    /// Prepare a gathered object for import
    fn fetch_stage(&self, object: &mut HarvestObject) -> Result<(), HarvestError>;

    /// Persist the object's record into the catalog
    fn import_stage(&self, object: &HarvestObject, catalog: &dyn CatalogStore) -> RecordOutcome;
}
