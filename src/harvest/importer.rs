//! Identity resolution and catalog import
//!
//! Lookup-then-create is not transactional. A concurrent writer can still
//! slip in between the two calls; a create answered with "already exists" is
//! followed by one more lookup.

use super::HarvestError;
use crate::catalog::{
    CatalogEntity, CatalogError, CatalogPackage, CatalogStore, EntitySpec, UpsertOutcome,
};
use crate::config::LocaleTables;
use crate::types::NormalizedPackageRecord;
use crate::util::{munge_name, MAX_NAME_LEN};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Length of the random slug suffix
const SUFFIX_LEN: usize = 5;

/// Suffixed names tried before giving up
const MAX_NAME_ATTEMPTS: usize = 5;

/// What one successful import wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub package_id: String,
    pub package_name: String,
    pub outcome: UpsertOutcome,
    pub translations: usize,
}

/// Resolves groups, the organization and the package name, then writes the record
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    tables: Arc<LocaleTables>,
}

impl IdentityResolver {
    pub fn new(tables: Arc<LocaleTables>) -> Self {
        Self { tables }
    }

    /// Find the group named after `title`, creating it on first encounter
    pub fn resolve_group(
        &self,
        catalog: &dyn CatalogStore,
        title: &str,
    ) -> Result<CatalogEntity, HarvestError> {
        let spec = EntitySpec {
            name: munge_name(title),
            title: title.to_string(),
            description: String::new(),
            extras: BTreeMap::new(),
        };

        get_or_create(
            &spec,
            |name| catalog.group_show(name),
            |spec| catalog.group_create(spec),
            "group",
        )
    }

    /// Find the owning organization, creating it from the canonical-locale profile
    pub fn resolve_organization(&self, catalog: &dyn CatalogStore) -> Result<CatalogEntity, HarvestError> {
        let text = self.tables.canonical_organization().ok_or_else(|| {
            HarvestError::Config(format!(
                "organization has no text for canonical locale '{}'",
                self.tables.canonical
            ))
        })?;

        let mut extras = BTreeMap::new();
        if let Some(website) = &self.tables.organization.website {
            extras.insert("website".to_string(), website.clone());
        }

        let spec = EntitySpec {
            name: munge_name(&text.name),
            title: text.name.clone(),
            description: text.description.clone(),
            extras,
        };

        get_or_create(
            &spec,
            |name| catalog.organization_show(name),
            |spec| catalog.organization_create(spec),
            "organization",
        )
    }

    /// Slug for a record that no other package owns
    pub fn unique_name(
        &self,
        catalog: &dyn CatalogStore,
        record: &NormalizedPackageRecord,
    ) -> Result<String, HarvestError> {
        let package_id = record.id.to_string();
        let mut base = munge_name(record.display_title());
        if base.is_empty() {
            base = munge_name(&record.dataset_id);
        }
        if base.is_empty() {
            base = package_id.clone();
        }

        if is_free(catalog, &base, &package_id)? {
            return Ok(base);
        }

        let stem = base[..base.len().min(MAX_NAME_LEN - SUFFIX_LEN - 1)].trim_end_matches('-');

        // A package re-harvested under a taken title keeps its earlier suffix
        if let Some(existing) = catalog.package_show(&package_id)? {
            if existing.id == package_id && is_suffixed(&existing.name, stem) {
                debug!("Keeping name '{}' for {}", existing.name, package_id);
                return Ok(existing.name);
            }
        }

        for _ in 0..MAX_NAME_ATTEMPTS {
            let suffix = Uuid::new_v4().simple().to_string();
            let candidate = format!("{}-{}", stem, &suffix[..SUFFIX_LEN]);
            if is_free(catalog, &candidate, &package_id)? {
                debug!("Name '{}' is taken, using '{}'", base, candidate);
                return Ok(candidate);
            }
        }

        Err(HarvestError::NameExhausted(base))
    }

    /// Write a record and its translations, then commit
    pub fn import(
        &self,
        catalog: &dyn CatalogStore,
        record: &NormalizedPackageRecord,
    ) -> Result<ImportSummary, HarvestError> {
        let mut groups = Vec::with_capacity(record.groups.len());
        for title in &record.groups {
            if title.trim().is_empty() {
                return Err(HarvestError::UnresolvedGroup(record.display_title().to_string()));
            }
            groups.push(self.resolve_group(catalog, title)?.name);
        }

        let organization = self.resolve_organization(catalog)?;
        let name = self.unique_name(catalog, record)?;

        let mut extras = BTreeMap::new();
        if let Some(license_url) = &record.license_url {
            extras.insert("license_url".to_string(), license_url.clone());
        }
        extras.insert("dataset_id".to_string(), record.dataset_id.clone());

        let package = CatalogPackage {
            id: record.id.to_string(),
            name,
            title: record.display_title().to_string(),
            notes: record.notes.clone(),
            author: record.author.clone(),
            maintainer: record.maintainer.clone(),
            maintainer_email: record.maintainer_email.clone(),
            license_id: record.license_id.clone(),
            owner_org: organization.id,
            groups,
            tags: record.tags.clone(),
            resources: record.resources.clone(),
            extras,
        };

        let outcome = catalog.package_upsert(&package)?;
        for translation in &record.translations {
            catalog.term_translation_upsert(translation)?;
        }
        catalog.commit()?;

        debug!(
            "{:?} package {} ({}) with {} translations",
            outcome,
            package.name,
            package.id,
            record.translations.len()
        );

        Ok(ImportSummary {
            package_id: package.id,
            package_name: package.name,
            outcome,
            translations: record.translations.len(),
        })
    }
}

fn is_free(catalog: &dyn CatalogStore, name: &str, package_id: &str) -> Result<bool, HarvestError> {
    Ok(match catalog.package_show(name)? {
        Some(existing) => existing.id == package_id,
        None => true,
    })
}

/// `name` is `stem` followed by a dash and a suffix of the generated length
fn is_suffixed(name: &str, stem: &str) -> bool {
    name.strip_prefix(stem)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|suffix| {
            suffix.len() == SUFFIX_LEN && suffix.bytes().all(|b| b.is_ascii_hexdigit())
        })
}

fn get_or_create<S, C>(
    spec: &EntitySpec,
    show: S,
    create: C,
    kind: &str,
) -> Result<CatalogEntity, HarvestError>
where
    S: Fn(&str) -> Result<Option<CatalogEntity>, CatalogError>,
    C: Fn(&EntitySpec) -> Result<CatalogEntity, CatalogError>,
{
    if let Some(found) = show(&spec.name)? {
        debug!("Found {} {}", kind, found.name);
        return Ok(found);
    }

    match create(spec) {
        Ok(created) => {
            info!("Created {} {}", kind, created.name);
            Ok(created)
        }
        Err(CatalogError::AlreadyExists { .. }) => {
            debug!("{} {} appeared concurrently, looking it up again", kind, spec.name);
            show(&spec.name)?.ok_or_else(|| {
                HarvestError::Catalog(CatalogError::Persistence(format!(
                    "{} '{}' reported as existing but not found",
                    kind, spec.name
                )))
            })
        }
        Err(e) => Err(e.into()),
    }
}
