//! Harvest queue persistence
//!
//! One entry per guid. Enqueueing an existing guid replaces the entry, so a
//! repeated gather run refreshes queued content instead of duplicating it.

use super::object::{HarvestObject, ObjectState};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised by a queue backend
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown harvest object: {0}")]
    NotFound(String),
}

/// Number of objects per state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub gathered: usize,
    pub fetched: usize,
    pub imported: usize,
    pub errored: usize,
}

impl QueueCounts {
    fn add(&mut self, state: ObjectState) {
        match state {
            ObjectState::Gathered => self.gathered += 1,
            ObjectState::Fetched => self.fetched += 1,
            ObjectState::Imported => self.imported += 1,
            ObjectState::Errored => self.errored += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.gathered + self.fetched + self.imported + self.errored
    }
}

/// Storage for harvest objects between stages
pub trait HarvestQueue: Send {
    /// Insert an object, replacing any object with the same guid
    fn enqueue(&mut self, object: HarvestObject) -> Result<(), QueueError>;

    /// Persist changes to an already queued object
    fn update(&mut self, object: &HarvestObject) -> Result<(), QueueError>;

    fn get(&self, guid: &str) -> Result<Option<HarvestObject>, QueueError>;

    /// Every object, ordered by gather time then guid
    fn all(&self) -> Result<Vec<HarvestObject>, QueueError>;

    /// Objects currently in `state`, in queue order
    fn objects_in(&self, state: ObjectState) -> Result<Vec<HarvestObject>, QueueError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|o| o.state == state)
            .collect())
    }

    fn counts(&self) -> Result<QueueCounts, QueueError> {
        let mut counts = QueueCounts::default();
        for object in self.all()? {
            counts.add(object.state);
        }
        Ok(counts)
    }
}

fn sort_objects(objects: &mut [HarvestObject]) {
    objects.sort_by(|a, b| {
        a.gathered_at
            .cmp(&b.gathered_at)
            .then_with(|| a.guid.cmp(&b.guid))
    });
}

// ============================================================================
// In-memory queue
// ============================================================================

/// Queue that lives only in memory
#[derive(Debug, Default)]
pub struct MemoryQueue {
    objects: BTreeMap<String, HarvestObject>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl HarvestQueue for MemoryQueue {
    fn enqueue(&mut self, object: HarvestObject) -> Result<(), QueueError> {
        self.objects.insert(object.guid.clone(), object);
        Ok(())
    }

    fn update(&mut self, object: &HarvestObject) -> Result<(), QueueError> {
        match self.objects.get_mut(&object.guid) {
            Some(slot) => {
                *slot = object.clone();
                Ok(())
            }
            None => Err(QueueError::NotFound(object.guid.clone())),
        }
    }

    fn get(&self, guid: &str) -> Result<Option<HarvestObject>, QueueError> {
        Ok(self.objects.get(guid).cloned())
    }

    fn all(&self) -> Result<Vec<HarvestObject>, QueueError> {
        let mut objects: Vec<_> = self.objects.values().cloned().collect();
        sort_objects(&mut objects);
        Ok(objects)
    }
}

// ============================================================================
// Directory queue
// ============================================================================

/// Queue storing one `<guid>.json` file per object
#[derive(Debug)]
pub struct DirQueue {
    dir: PathBuf,
}

impl DirQueue {
    /// Open (creating if needed) a queue directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, QueueError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, guid: &str) -> PathBuf {
        self.dir.join(format!("{}.json", guid))
    }

    fn write(&self, object: &HarvestObject) -> Result<(), QueueError> {
        let path = self.path_for(&object.guid);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(object)?)?;
        std::fs::rename(&tmp, &path)?;
        debug!("Wrote harvest object {} ({})", object.guid, object.state);
        Ok(())
    }
}

impl HarvestQueue for DirQueue {
    fn enqueue(&mut self, object: HarvestObject) -> Result<(), QueueError> {
        self.write(&object)
    }

    fn update(&mut self, object: &HarvestObject) -> Result<(), QueueError> {
        if !self.path_for(&object.guid).exists() {
            return Err(QueueError::NotFound(object.guid.clone()));
        }
        self.write(object)
    }

    fn get(&self, guid: &str) -> Result<Option<HarvestObject>, QueueError> {
        let path = self.path_for(guid);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    fn all(&self) -> Result<Vec<HarvestObject>, QueueError> {
        let mut objects = Vec::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<HarvestObject>(&data) {
                Ok(object) => objects.push(object),
                Err(e) => warn!("Ignoring unreadable queue file {}: {}", path.display(), e),
            }
        }

        sort_objects(&mut objects);
        Ok(objects)
    }
}
