//! Catalog store abstraction
//!
//! The import stage talks to the catalog only through [`CatalogStore`].
//! Two backends are provided:
//! - [`LocalCatalog`]: in-process store, optionally persisted as one JSON document
//! - [`CkanCatalog`]: a CKAN instance reached over its action API

pub mod ckan;
pub mod local;

pub use ckan::CkanCatalog;
pub use local::LocalCatalog;

use crate::config::{CatalogBackend, CatalogConfig};
use crate::types::{NormalizedResource, TermTranslation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by a catalog backend
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    #[error("Catalog rejected {action}: {message}")]
    Rejected { action: String, message: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl CatalogError {
    /// Whether retrying the same record later may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            CatalogError::Unavailable(_) | CatalogError::Io(_) => true,
            CatalogError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// A group or organization as stored in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntity {
    pub id: String,
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
}

pub type Group = CatalogEntity;
pub type Organization = CatalogEntity;

/// Creation request for a group or organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpec {
    pub name: String,
    pub title: String,
    pub description: String,
    pub extras: BTreeMap<String, String>,
}

/// A package as written to the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPackage {
    /// Deterministic record id
    pub id: String,
    /// Unique slug
    pub name: String,
    pub title: String,
    pub notes: String,
    pub author: Option<String>,
    pub maintainer: Option<String>,
    pub maintainer_email: Option<String>,
    pub license_id: Option<String>,
    /// Id of the owning organization
    pub owner_org: String,
    /// Names of the groups the package belongs to
    pub groups: Vec<String>,
    pub tags: Vec<String>,
    pub resources: Vec<NormalizedResource>,
    pub extras: BTreeMap<String, String>,
}

/// Result of a package upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Operations the import stage needs from a catalog.
///
/// Lookups return `Ok(None)` for a missing entity. Creates fail with
/// [`CatalogError::AlreadyExists`] when the name is taken.
pub trait CatalogStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    fn group_show(&self, name: &str) -> Result<Option<Group>, CatalogError>;

    fn group_create(&self, spec: &EntitySpec) -> Result<Group, CatalogError>;

    fn organization_show(&self, name: &str) -> Result<Option<Organization>, CatalogError>;

    fn organization_create(&self, spec: &EntitySpec) -> Result<Organization, CatalogError>;

    /// Look up a package by id or by name
    fn package_show(&self, id_or_name: &str) -> Result<Option<CatalogPackage>, CatalogError>;

    /// Create the package, or replace the one with the same id
    fn package_upsert(&self, package: &CatalogPackage) -> Result<UpsertOutcome, CatalogError>;

    /// Insert or replace the translation keyed by `(lang_code, term)`
    fn term_translation_upsert(&self, translation: &TermTranslation) -> Result<(), CatalogError>;

    /// Make every write since the last commit durable
    fn commit(&self) -> Result<(), CatalogError> {
        Ok(())
    }
}

/// Open the backend selected in the config
pub fn open_catalog(config: &CatalogConfig) -> Result<Box<dyn CatalogStore>, CatalogError> {
    match config.backend {
        CatalogBackend::Local => Ok(Box::new(LocalCatalog::open(&config.data_dir)?)),
        CatalogBackend::Ckan => Ok(Box::new(CkanCatalog::new(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        assert!(CatalogError::Unavailable("down".into()).is_recoverable());
        assert!(!CatalogError::Rejected {
            action: "package_create".into(),
            message: "invalid".into(),
        }
        .is_recoverable());
        assert!(!CatalogError::AlreadyExists {
            kind: "group",
            name: "politik".into(),
        }
        .is_recoverable());
    }

    #[test]
    fn test_open_local_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let config = CatalogConfig {
            data_dir: dir.path().join("catalog"),
            ..Default::default()
        };
        let catalog = open_catalog(&config).unwrap();
        assert_eq!(catalog.name(), "local");
    }
}
