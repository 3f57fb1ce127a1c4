//! Local catalog backend
//!
//! Keeps groups, organizations, packages and term translations in memory
//! behind `parking_lot` locks. When opened on a directory, the whole catalog
//! is loaded from and saved to a single `catalog.json` on commit.

use super::{
    CatalogEntity, CatalogError, CatalogPackage, CatalogStore, EntitySpec, Group, Organization,
    UpsertOutcome,
};
use crate::types::TermTranslation;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

const CATALOG_FILE: &str = "catalog.json";
const CATALOG_VERSION: u32 = 1;

#[derive(Debug, Default)]
struct CatalogState {
    groups: BTreeMap<String, Group>,
    organizations: BTreeMap<String, Organization>,
    /// Packages keyed by id
    packages: BTreeMap<String, CatalogPackage>,
    /// Package name to id
    package_names: HashMap<String, String>,
    translations: BTreeMap<(String, String), TermTranslation>,
}

/// Serialized form of the catalog
#[derive(Debug, Serialize, Deserialize)]
struct SavedCatalog {
    version: u32,
    groups: Vec<Group>,
    organizations: Vec<Organization>,
    packages: Vec<CatalogPackage>,
    translations: Vec<TermTranslation>,
}

/// In-process catalog store
pub struct LocalCatalog {
    state: RwLock<CatalogState>,
    /// Directory holding `catalog.json`, if persistent
    data_dir: Option<PathBuf>,
}

impl LocalCatalog {
    /// Catalog that lives only as long as the value
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(CatalogState::default()),
            data_dir: None,
        }
    }

    /// Open a persistent catalog, loading any previously committed state
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let path = data_dir.join(CATALOG_FILE);
        let mut state = CatalogState::default();

        if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            let saved: SavedCatalog = serde_json::from_str(&data)?;
            if saved.version != CATALOG_VERSION {
                return Err(CatalogError::Persistence(format!(
                    "unsupported catalog version {} in {}",
                    saved.version,
                    path.display()
                )));
            }

            for group in saved.groups {
                state.groups.insert(group.name.clone(), group);
            }
            for org in saved.organizations {
                state.organizations.insert(org.name.clone(), org);
            }
            for package in saved.packages {
                state.package_names.insert(package.name.clone(), package.id.clone());
                state.packages.insert(package.id.clone(), package);
            }
            for t in saved.translations {
                state
                    .translations
                    .insert((t.lang_code.clone(), t.term.clone()), t);
            }

            info!(
                "Loaded catalog with {} packages, {} translations",
                state.packages.len(),
                state.translations.len()
            );
        }

        Ok(Self {
            state: RwLock::new(state),
            data_dir: Some(data_dir),
        })
    }

    /// Number of stored packages
    pub fn package_count(&self) -> usize {
        self.state.read().packages.len()
    }

    pub fn group_count(&self) -> usize {
        self.state.read().groups.len()
    }

    pub fn organization_count(&self) -> usize {
        self.state.read().organizations.len()
    }

    pub fn translation_count(&self) -> usize {
        self.state.read().translations.len()
    }

    /// Translation stored for `(lang_code, term)`
    pub fn translation(&self, lang_code: &str, term: &str) -> Option<String> {
        self.state
            .read()
            .translations
            .get(&(lang_code.to_string(), term.to_string()))
            .map(|t| t.term_translation.clone())
    }

    fn new_entity(spec: &EntitySpec) -> CatalogEntity {
        CatalogEntity {
            id: Uuid::new_v4().to_string(),
            name: spec.name.clone(),
            title: spec.title.clone(),
            description: spec.description.clone(),
            extras: spec.extras.clone(),
        }
    }
}

impl CatalogStore for LocalCatalog {
    fn name(&self) -> &str {
        "local"
    }

    fn group_show(&self, name: &str) -> Result<Option<Group>, CatalogError> {
        Ok(self.state.read().groups.get(name).cloned())
    }

    fn group_create(&self, spec: &EntitySpec) -> Result<Group, CatalogError> {
        let mut state = self.state.write();
        if state.groups.contains_key(&spec.name) {
            return Err(CatalogError::AlreadyExists {
                kind: "group",
                name: spec.name.clone(),
            });
        }
        let group = Self::new_entity(spec);
        state.groups.insert(group.name.clone(), group.clone());
        Ok(group)
    }

    fn organization_show(&self, name: &str) -> Result<Option<Organization>, CatalogError> {
        Ok(self.state.read().organizations.get(name).cloned())
    }

    fn organization_create(&self, spec: &EntitySpec) -> Result<Organization, CatalogError> {
        let mut state = self.state.write();
        if state.organizations.contains_key(&spec.name) {
            return Err(CatalogError::AlreadyExists {
                kind: "organization",
                name: spec.name.clone(),
            });
        }
        let org = Self::new_entity(spec);
        state.organizations.insert(org.name.clone(), org.clone());
        Ok(org)
    }

    fn package_show(&self, id_or_name: &str) -> Result<Option<CatalogPackage>, CatalogError> {
        let state = self.state.read();
        let package = state.packages.get(id_or_name).or_else(|| {
            state
                .package_names
                .get(id_or_name)
                .and_then(|id| state.packages.get(id))
        });
        Ok(package.cloned())
    }

    fn package_upsert(&self, package: &CatalogPackage) -> Result<UpsertOutcome, CatalogError> {
        let mut state = self.state.write();

        if let Some(owner) = state.package_names.get(&package.name) {
            if owner != &package.id {
                return Err(CatalogError::AlreadyExists {
                    kind: "package",
                    name: package.name.clone(),
                });
            }
        }

        let previous = state.packages.insert(package.id.clone(), package.clone());
        if let Some(old) = &previous {
            if old.name != package.name {
                state.package_names.remove(&old.name);
            }
        }
        state
            .package_names
            .insert(package.name.clone(), package.id.clone());

        Ok(match previous {
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Created,
        })
    }

    fn term_translation_upsert(&self, translation: &TermTranslation) -> Result<(), CatalogError> {
        let key = (translation.lang_code.clone(), translation.term.clone());
        self.state.write().translations.insert(key, translation.clone());
        Ok(())
    }

    fn commit(&self) -> Result<(), CatalogError> {
        let Some(data_dir) = &self.data_dir else {
            return Ok(());
        };

        let saved = {
            let state = self.state.read();
            SavedCatalog {
                version: CATALOG_VERSION,
                groups: state.groups.values().cloned().collect(),
                organizations: state.organizations.values().cloned().collect(),
                packages: state.packages.values().cloned().collect(),
                translations: state.translations.values().cloned().collect(),
            }
        };

        let path = data_dir.join(CATALOG_FILE);
        let tmp = data_dir.join(format!("{}.tmp", CATALOG_FILE));
        std::fs::write(&tmp, serde_json::to_string_pretty(&saved)?)?;
        std::fs::rename(&tmp, &path)?;

        debug!("Committed catalog with {} packages", saved.packages.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> EntitySpec {
        EntitySpec {
            name: name.to_string(),
            title: name.to_uppercase(),
            description: String::new(),
            extras: BTreeMap::new(),
        }
    }

    fn package(id: &str, name: &str) -> CatalogPackage {
        CatalogPackage {
            id: id.to_string(),
            name: name.to_string(),
            title: "Title".to_string(),
            notes: String::new(),
            author: None,
            maintainer: None,
            maintainer_email: None,
            license_id: None,
            owner_org: "org".to_string(),
            groups: vec!["politik".to_string()],
            tags: Vec::new(),
            resources: Vec::new(),
            extras: BTreeMap::new(),
        }
    }

    #[test]
    fn test_group_create_then_show() {
        let catalog = LocalCatalog::in_memory();
        assert!(catalog.group_show("politik").unwrap().is_none());

        let created = catalog.group_create(&spec("politik")).unwrap();
        let found = catalog.group_show("politik").unwrap().unwrap();
        assert_eq!(created, found);

        let err = catalog.group_create(&spec("politik")).unwrap_err();
        assert!(matches!(err, CatalogError::AlreadyExists { kind: "group", .. }));
    }

    #[test]
    fn test_package_upsert_and_lookup() {
        let catalog = LocalCatalog::in_memory();
        assert_eq!(catalog.package_upsert(&package("id-1", "name-1")).unwrap(), UpsertOutcome::Created);
        assert_eq!(catalog.package_upsert(&package("id-1", "name-2")).unwrap(), UpsertOutcome::Updated);

        assert!(catalog.package_show("name-1").unwrap().is_none());
        assert_eq!(catalog.package_show("name-2").unwrap().unwrap().id, "id-1");
        assert_eq!(catalog.package_show("id-1").unwrap().unwrap().name, "name-2");
        assert_eq!(catalog.package_count(), 1);
    }

    #[test]
    fn test_package_name_owned_by_other_id() {
        let catalog = LocalCatalog::in_memory();
        catalog.package_upsert(&package("id-1", "shared")).unwrap();
        let err = catalog.package_upsert(&package("id-2", "shared")).unwrap_err();
        assert!(matches!(err, CatalogError::AlreadyExists { kind: "package", .. }));
    }

    #[test]
    fn test_translations_keyed_by_lang_and_term() {
        let catalog = LocalCatalog::in_memory();
        catalog
            .term_translation_upsert(&TermTranslation::new("fr", "Politik", "Politique"))
            .unwrap();
        catalog
            .term_translation_upsert(&TermTranslation::new("fr", "Politik", "La politique"))
            .unwrap();
        catalog
            .term_translation_upsert(&TermTranslation::new("it", "Politik", "Politica"))
            .unwrap();

        assert_eq!(catalog.translation_count(), 2);
        assert_eq!(catalog.translation("fr", "Politik").as_deref(), Some("La politique"));
    }

    #[test]
    fn test_commit_persists_state() {
        let dir = tempfile::tempdir().unwrap();
        {
            let catalog = LocalCatalog::open(dir.path()).unwrap();
            catalog.group_create(&spec("gesundheit")).unwrap();
            catalog.organization_create(&spec("bundesamt-fur-statistik")).unwrap();
            catalog.package_upsert(&package("id-1", "name-1")).unwrap();
            catalog
                .term_translation_upsert(&TermTranslation::new("en", "Gesundheit", "Health"))
                .unwrap();
            catalog.commit().unwrap();
        }

        let reopened = LocalCatalog::open(dir.path()).unwrap();
        assert_eq!(reopened.group_count(), 1);
        assert_eq!(reopened.organization_count(), 1);
        assert_eq!(reopened.package_show("name-1").unwrap().unwrap().id, "id-1");
        assert_eq!(reopened.translation("en", "Gesundheit").as_deref(), Some("Health"));
    }

    #[test]
    fn test_uncommitted_writes_are_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        {
            let catalog = LocalCatalog::open(dir.path()).unwrap();
            catalog.group_create(&spec("politik")).unwrap();
        }
        let reopened = LocalCatalog::open(dir.path()).unwrap();
        assert_eq!(reopened.group_count(), 0);
    }
}
