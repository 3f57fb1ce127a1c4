//! Gather stage: turn parsed packages into catalog-ready records

pub mod metadata;
pub mod notes;
pub mod probe;
pub mod selector;
pub mod taxonomy;
pub mod translations;

pub use metadata::{BuildReport, MetadataRecordBuilder, SkipReason};
pub use notes::NotesEnricher;
pub use probe::{
    audit_resources, FilterReport, HttpProbe, MissingResource, ProbeError, ProbeMethod,
    ProbeOutcome, ResourceFilter, ResourceProbe, StaticProbe,
};
pub use selector::{canonical_index, select_canonical};
pub use taxonomy::{classify, GroupClassifier};
pub use translations::TranslationBuilder;
