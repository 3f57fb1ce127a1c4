//! Closed taxonomy classification
//!
//! Maps the first two characters of a numeric group code onto the ordered
//! taxonomy table. Codes not listed in the table never produce a group.

use crate::config::{LocaleTables, TaxonomyEntry};
use crate::types::DatasetRecord;
use std::sync::Arc;

/// Find the entry for the first code that matches any table row.
///
/// Codes are examined in document order; for each code the table is checked
/// in table order.
pub fn classify<'t>(taxonomy: &'t [TaxonomyEntry], codes: &[String]) -> Option<&'t TaxonomyEntry> {
    codes.iter().find_map(|code| {
        let prefix = code.trim().get(..2)?;
        taxonomy.iter().find(|entry| entry.code == prefix)
    })
}

/// Resolves dataset records to canonical group names
#[derive(Debug, Clone)]
pub struct GroupClassifier {
    tables: Arc<LocaleTables>,
}

impl GroupClassifier {
    pub fn new(tables: Arc<LocaleTables>) -> Self {
        Self { tables }
    }

    /// Taxonomy entry of a record, if any of its codes is known
    pub fn entry_for(&self, record: &DatasetRecord) -> Option<&TaxonomyEntry> {
        classify(&self.tables.taxonomy, &record.group_codes)
    }

    /// Canonical-locale group name of a record
    pub fn group_name(&self, record: &DatasetRecord) -> Option<String> {
        self.entry_for(record)
            .and_then(|entry| self.tables.canonical_name(entry))
            .map(str::to_string)
    }
}
