//! Harvest objects: the unit of work passed between stages

use crate::types::NormalizedPackageRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a queued object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectState {
    /// Written by the gather stage
    Gathered,
    /// Content validated, ready for import
    Fetched,
    /// Persisted in the catalog
    Imported,
    /// Failed permanently
    Errored,
}

impl ObjectState {
    pub const ALL: [ObjectState; 4] = [
        ObjectState::Gathered,
        ObjectState::Fetched,
        ObjectState::Imported,
        ObjectState::Errored,
    ];
}

impl fmt::Display for ObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectState::Gathered => "gathered",
            ObjectState::Fetched => "fetched",
            ObjectState::Imported => "imported",
            ObjectState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Envelope around one serialized record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestObject {
    /// Stable identifier (the record id)
    pub guid: String,
    /// Gather job that produced the object
    pub job_id: String,
    /// Serialized [`NormalizedPackageRecord`]
    pub content: String,
    pub state: ObjectState,
    /// Last error message, if any
    #[serde(default)]
    pub error: Option<String>,
    /// Failed import attempts
    #[serde(default)]
    pub attempts: u32,
    pub gathered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HarvestObject {
    /// Wrap a freshly built record
    pub fn from_record(
        record: &NormalizedPackageRecord,
        job_id: impl Into<String>,
    ) -> Result<Self, serde_json::Error> {
        let now = Utc::now();
        Ok(Self {
            guid: record.id.to_string(),
            job_id: job_id.into(),
            content: serde_json::to_string(record)?,
            state: ObjectState::Gathered,
            error: None,
            attempts: 0,
            gathered_at: now,
            updated_at: now,
        })
    }

    /// Deserialize the carried record
    pub fn record(&self) -> Result<NormalizedPackageRecord, serde_json::Error> {
        serde_json::from_str(&self.content)
    }

    /// Move to a new state, clearing any previous error
    pub fn advance(&mut self, state: ObjectState) {
        self.state = state;
        self.error = None;
        self.updated_at = Utc::now();
    }

    /// Record a failure; `state` is where the object stays afterwards
    pub fn fail(&mut self, state: ObjectState, error: impl fmt::Display) {
        self.state = state;
        self.error = Some(error.to_string());
        self.attempts += 1;
        self.updated_at = Utc::now();
    }
}
