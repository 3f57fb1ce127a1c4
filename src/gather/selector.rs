//! Canonical record selection

use crate::types::{DatasetRecord, Package};

/// Index of the canonical record: the first record in `canonical_locale`,
/// else the first record in document order
pub fn canonical_index(package: &Package, canonical_locale: &str) -> usize {
    package
        .records()
        .iter()
        .position(|r| r.locale == canonical_locale)
        .unwrap_or(0)
}

/// The record used as translation source for a package
pub fn select_canonical<'a>(package: &'a Package, canonical_locale: &str) -> &'a DatasetRecord {
    &package.records()[canonical_index(package, canonical_locale)]
}
