//! Notes enrichment
//!
//! Appends coverage period, publication date and a topic link to the raw
//! notes, each line only when its source field is present. The topic link
//! follows the record's first group code.

use super::taxonomy::classify;
use crate::config::LocaleTables;
use crate::types::DatasetRecord;
use std::sync::Arc;

/// Separator placed before every appended line
const LINE_BREAK: &str = "\n  ";

/// Builds enriched notes text for a record in a given locale
#[derive(Debug, Clone)]
pub struct NotesEnricher {
    tables: Arc<LocaleTables>,
}

impl NotesEnricher {
    pub fn new(tables: Arc<LocaleTables>) -> Self {
        Self { tables }
    }

    /// Enriched notes of `record` rendered with the labels of `locale`
    pub fn enrich(&self, record: &DatasetRecord, locale: &str) -> String {
        let mut notes = record.notes.clone().unwrap_or_default();
        let labels = self.tables.labels_for(locale);

        if let (Some(coverage), Some(labels)) = (record.coverage.as_deref(), labels) {
            notes.push_str(LINE_BREAK);
            notes.push_str(&labels.inquiry_period);
            notes.push(' ');
            notes.push_str(coverage);
        }

        if let (Some(published), Some(labels)) = (record.published.as_deref(), labels) {
            notes.push_str(LINE_BREAK);
            notes.push_str(&labels.published);
            notes.push(' ');
            notes.push_str(published);
        }

        // Only the first group code can contribute a topic link
        let topic = record
            .group_codes
            .first()
            .and_then(|code| classify(&self.tables.taxonomy, std::slice::from_ref(code)))
            .and_then(|entry| self.tables.topic_for(entry, locale));
        if let Some(topic) = topic {
            notes.push_str(LINE_BREAK);
            notes.push_str(&topic.to_markdown());
        }

        notes
    }
}
