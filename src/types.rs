//! Core types for the harvest pipeline
//!
//! Feed-side types ([`Package`], [`DatasetRecord`], [`Resource`]) are parsed
//! fresh on every gather run. [`NormalizedPackageRecord`] is what travels
//! through the harvest queue between the gather and import stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Identifier of a dataset in the source feed (the `datasetID` attribute)
pub type DatasetId = String;

/// Locale tag as found in `xml:lang` (e.g. "de", "fr")
pub type Locale = String;

// ============================================================================
// Feed Types
// ============================================================================

/// A downloadable file attached to a dataset record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Download URL
    pub url: String,
    /// Display name (usually the file name)
    pub name: String,
}

impl Resource {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
        }
    }

    /// Format derived from the lower-cased file name suffix
    pub fn format(&self) -> String {
        guess_format(&self.name)
    }
}

/// Guess a resource format from its file name.
///
/// Purely lexical: the lower-cased extension without the dot, or an empty
/// string when the name has no extension.
pub fn guess_format(file_name: &str) -> String {
    let lower = file_name.to_lowercase();
    Path::new(&lower)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string()
}

/// One locale variant of a dataset as described by the feed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// Source identity (`datasetID` attribute)
    pub dataset_id: DatasetId,
    /// Locale tag (`xml:lang` attribute); empty if the feed omits it
    pub locale: Locale,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub author: Option<String>,
    pub maintainer: Option<String>,
    pub maintainer_email: Option<String>,
    /// License URL (`licence` element)
    pub license_url: Option<String>,
    /// License / copyright identifier (`copyright` element)
    pub license_id: Option<String>,
    /// Inquiry period (`coverage` element)
    pub coverage: Option<String>,
    /// Publication date (`published` element)
    pub published: Option<String>,
    pub tags: Vec<String>,
    /// Numeric taxonomy codes in document order
    pub group_codes: Vec<String>,
    pub resource: Option<Resource>,
}

impl DatasetRecord {
    /// Create a record with only identity and locale set
    pub fn new(dataset_id: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            locale: locale.into(),
            ..Default::default()
        }
    }

    /// Look up one of the translatable text fields by name
    pub fn text_field(&self, field: TextField) -> Option<&str> {
        let value = match field {
            TextField::Title => &self.title,
            TextField::Author => &self.author,
            TextField::Maintainer => &self.maintainer,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }
}

/// Record fields that get per-locale term translations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Title,
    Author,
    Maintainer,
}

impl TextField {
    pub const ALL: [TextField; 3] = [TextField::Title, TextField::Author, TextField::Maintainer];
}

/// All locale variants describing one logical dataset, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    records: Vec<DatasetRecord>,
}

impl Package {
    /// Build a package; returns `None` when there are no records
    pub fn new(records: Vec<DatasetRecord>) -> Option<Self> {
        if records.is_empty() {
            None
        } else {
            Some(Self { records })
        }
    }

    /// Records in document order (never empty)
    pub fn records(&self) -> &[DatasetRecord] {
        &self.records
    }

    /// First record in document order
    pub fn first(&self) -> &DatasetRecord {
        &self.records[0]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// Normalized Types
// ============================================================================

/// Stable catalog id of a harvested dataset.
///
/// UUIDv5 in the OID namespace, so the same source dataset always maps to
/// the same catalog package across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn for_dataset(dataset_id: &str) -> Self {
        RecordId(Uuid::new_v5(&Uuid::NAMESPACE_OID, dataset_id.as_bytes()))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resource that answered the availability probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedResource {
    pub url: String,
    pub name: String,
    pub format: String,
}

impl From<&Resource> for NormalizedResource {
    fn from(resource: &Resource) -> Self {
        Self {
            url: resource.url.clone(),
            name: resource.name.clone(),
            format: resource.format(),
        }
    }
}

/// Cross-locale mapping from canonical text to its equivalent in another locale
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TermTranslation {
    pub lang_code: Locale,
    pub term: String,
    pub term_translation: String,
}

impl TermTranslation {
    pub fn new(
        lang_code: impl Into<String>,
        term: impl Into<String>,
        term_translation: impl Into<String>,
    ) -> Self {
        Self {
            lang_code: lang_code.into(),
            term: term.into(),
            term_translation: term_translation.into(),
        }
    }
}

/// Catalog-ready record produced by the gather stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPackageRecord {
    pub id: RecordId,
    #[serde(rename = "datasetID")]
    pub dataset_id: DatasetId,
    pub title: Option<String>,
    pub notes: String,
    pub author: Option<String>,
    pub maintainer: Option<String>,
    pub maintainer_email: Option<String>,
    pub license_url: Option<String>,
    pub license_id: Option<String>,
    pub translations: Vec<TermTranslation>,
    pub resources: Vec<NormalizedResource>,
    pub tags: Vec<String>,
    pub groups: Vec<String>,
}

impl NormalizedPackageRecord {
    /// Title used for slug generation, falling back to the source id
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.dataset_id)
    }
}
