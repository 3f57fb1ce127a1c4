//! Metadata record construction
//!
//! Combines selection, probing, classification, enrichment and translation
//! into one [`NormalizedPackageRecord`] per package.

use super::notes::NotesEnricher;
use super::probe::ResourceFilter;
use super::selector::select_canonical;
use super::taxonomy::GroupClassifier;
use super::translations::TranslationBuilder;
use crate::config::LocaleTables;
use crate::types::{NormalizedPackageRecord, Package, RecordId};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Why a package produced no record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// None of the group codes maps onto the taxonomy
    NoGroup,
    /// No resource answered the probe
    NoResources,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoGroup => write!(f, "no group"),
            SkipReason::NoResources => write!(f, "no reachable resources"),
        }
    }
}

/// Result of building one package, with probe counters
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub dataset_id: String,
    pub record: Option<NormalizedPackageRecord>,
    pub skip_reason: Option<SkipReason>,
    pub resources_probed: usize,
    pub resources_unreachable: usize,
}

impl BuildReport {
    fn skipped(dataset_id: &str, reason: SkipReason) -> Self {
        Self {
            dataset_id: dataset_id.to_string(),
            record: None,
            skip_reason: Some(reason),
            resources_probed: 0,
            resources_unreachable: 0,
        }
    }
}

/// Builds catalog-ready records from parsed packages
pub struct MetadataRecordBuilder {
    tables: Arc<LocaleTables>,
    filter: ResourceFilter,
    classifier: GroupClassifier,
    notes: NotesEnricher,
    translations: TranslationBuilder,
}

impl MetadataRecordBuilder {
    pub fn new(tables: Arc<LocaleTables>, filter: ResourceFilter) -> Self {
        Self {
            classifier: GroupClassifier::new(tables.clone()),
            notes: NotesEnricher::new(tables.clone()),
            translations: TranslationBuilder::new(tables.clone()),
            tables,
            filter,
        }
    }

    /// Build a record, or `None` if the package has no group or no reachable resource
    pub fn build(&self, package: &Package) -> Option<NormalizedPackageRecord> {
        self.build_report(package).record
    }

    /// Build a record and report why it was skipped, if it was.
    ///
    /// The group is resolved first so unclassifiable packages are never probed.
    pub fn build_report(&self, package: &Package) -> BuildReport {
        let canonical = select_canonical(package, &self.tables.canonical);

        let Some(group) = self.classifier.group_name(canonical) else {
            debug!("Skipping {}: no group for codes {:?}", canonical.dataset_id, canonical.group_codes);
            return BuildReport::skipped(&canonical.dataset_id, SkipReason::NoGroup);
        };

        let filtered = self.filter.filter(package);
        if filtered.resources.is_empty() {
            debug!(
                "Skipping {}: none of {} resources reachable",
                canonical.dataset_id, filtered.probed
            );
            return BuildReport {
                resources_probed: filtered.probed,
                resources_unreachable: filtered.unreachable,
                ..BuildReport::skipped(&canonical.dataset_id, SkipReason::NoResources)
            };
        }

        let record = NormalizedPackageRecord {
            id: RecordId::for_dataset(&canonical.dataset_id),
            dataset_id: canonical.dataset_id.clone(),
            title: canonical.title.clone(),
            notes: self.notes.enrich(canonical, &canonical.locale),
            author: canonical.author.clone(),
            maintainer: canonical.maintainer.clone(),
            maintainer_email: canonical.maintainer_email.clone(),
            license_url: canonical.license_url.clone(),
            license_id: canonical.license_id.clone(),
            translations: self.translations.build(package),
            resources: filtered.resources,
            tags: canonical.tags.clone(),
            groups: vec![group],
        };

        BuildReport {
            dataset_id: canonical.dataset_id.clone(),
            record: Some(record),
            skip_reason: None,
            resources_probed: filtered.probed,
            resources_unreachable: filtered.unreachable,
        }
    }
}
