//! CKAN catalog backend
//!
//! Talks to a CKAN site through its action API (`/api/3/action/<name>`).
//! Every call is a JSON POST answered by `{success, result, error}`.

use super::{
    CatalogEntity, CatalogError, CatalogPackage, CatalogStore, EntitySpec, Group, Organization,
    UpsertOutcome,
};
use crate::config::{CatalogConfig, DEFAULT_USER_AGENT};
use crate::types::{NormalizedResource, TermTranslation};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// CKAN action API client
#[derive(Debug)]
pub struct CkanCatalog {
    client: Client,
    action_url: String,
}

/// Action API response envelope
#[derive(Debug, Deserialize)]
struct ActionResponse {
    success: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ActionError>,
}

#[derive(Debug, Deserialize)]
struct ActionError {
    #[serde(rename = "__type", default)]
    error_type: String,
    #[serde(default)]
    message: Option<String>,
    /// Validation errors carry per-field messages
    #[serde(flatten)]
    fields: BTreeMap<String, Value>,
}

impl ActionError {
    fn describe(&self) -> String {
        match &self.message {
            Some(message) => format!("{}: {}", self.error_type, message),
            None => format!("{}: {}", self.error_type, json!(self.fields)),
        }
    }

    fn is_not_found(&self) -> bool {
        self.error_type == "Not Found Error"
    }

    fn is_duplicate(&self) -> bool {
        self.error_type == "Validation Error" && self.describe().contains("already")
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct KeyValue {
    key: String,
    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct NamedRef {
    name: String,
}

/// Entity as CKAN returns it
#[derive(Debug, Deserialize)]
struct CkanEntity {
    id: String,
    name: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    extras: Vec<KeyValue>,
}

impl From<CkanEntity> for CatalogEntity {
    fn from(e: CkanEntity) -> Self {
        CatalogEntity {
            id: e.id,
            name: e.name,
            title: e.title,
            description: e.description.unwrap_or_default(),
            extras: e.extras.into_iter().map(|kv| (kv.key, kv.value)).collect(),
        }
    }
}

/// Package as CKAN returns it
#[derive(Debug, Deserialize)]
struct CkanPackage {
    id: String,
    name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    maintainer: Option<String>,
    #[serde(default)]
    maintainer_email: Option<String>,
    #[serde(default)]
    license_id: Option<String>,
    #[serde(default)]
    owner_org: Option<String>,
    #[serde(default)]
    groups: Vec<NamedRef>,
    #[serde(default)]
    tags: Vec<NamedRef>,
    #[serde(default)]
    resources: Vec<CkanResource>,
    #[serde(default)]
    extras: Vec<KeyValue>,
}

#[derive(Debug, Deserialize)]
struct CkanResource {
    url: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    format: Option<String>,
}

impl From<CkanPackage> for CatalogPackage {
    fn from(p: CkanPackage) -> Self {
        CatalogPackage {
            id: p.id,
            name: p.name,
            title: p.title.unwrap_or_default(),
            notes: p.notes.unwrap_or_default(),
            author: p.author,
            maintainer: p.maintainer,
            maintainer_email: p.maintainer_email,
            license_id: p.license_id,
            owner_org: p.owner_org.unwrap_or_default(),
            groups: p.groups.into_iter().map(|g| g.name).collect(),
            tags: p.tags.into_iter().map(|t| t.name).collect(),
            resources: p
                .resources
                .into_iter()
                .map(|r| NormalizedResource {
                    url: r.url,
                    name: r.name.unwrap_or_default(),
                    format: r.format.unwrap_or_default().to_lowercase(),
                })
                .collect(),
            extras: p.extras.into_iter().map(|kv| (kv.key, kv.value)).collect(),
        }
    }
}

fn extras_payload(extras: &BTreeMap<String, String>) -> Vec<KeyValue> {
    extras
        .iter()
        .map(|(key, value)| KeyValue {
            key: key.clone(),
            value: value.clone(),
        })
        .collect()
}

fn entity_payload(spec: &EntitySpec) -> Value {
    json!({
        "name": spec.name,
        "title": spec.title,
        "description": spec.description,
        "extras": extras_payload(&spec.extras),
    })
}

fn package_payload(package: &CatalogPackage) -> Value {
    json!({
        "id": package.id,
        "name": package.name,
        "title": package.title,
        "notes": package.notes,
        "author": package.author,
        "maintainer": package.maintainer,
        "maintainer_email": package.maintainer_email,
        "license_id": package.license_id,
        "owner_org": package.owner_org,
        "groups": package.groups.iter().map(|name| NamedRef { name: name.clone() }).collect::<Vec<_>>(),
        "tags": package.tags.iter().map(|name| NamedRef { name: name.clone() }).collect::<Vec<_>>(),
        "resources": package.resources,
        "extras": extras_payload(&package.extras),
    })
}

impl CkanCatalog {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let api_url = config
            .api_url
            .as_deref()
            .ok_or_else(|| CatalogError::Unavailable("catalog.api_url is not set".to_string()))?;

        let mut headers = HeaderMap::new();
        match config.resolved_api_key() {
            Some(key) => {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&key).map_err(|e| {
                        CatalogError::Persistence(format!("Invalid API key format: {}", e))
                    })?,
                );
            }
            None => warn!("No CKAN API key configured; write actions will be rejected"),
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(DEFAULT_USER_AGENT)
            .default_headers(headers)
            .build()?;

        let action_url = format!("{}/api/3/action", api_url.trim_end_matches('/'));
        info!("CKAN catalog at {}", action_url);

        Ok(Self { client, action_url })
    }

    /// Call an action; `Ok(None)` when CKAN reports "Not Found"
    fn call(&self, action: &str, payload: &Value) -> Result<Option<Value>, CatalogError> {
        let url = format!("{}/{}", self.action_url, action);
        debug!("POST {}", url);

        let response = self.client.post(&url).json(payload).send()?;
        let status = response.status();

        if status.is_server_error() {
            return Err(CatalogError::Unavailable(format!("{} answered {}", action, status)));
        }

        let body: ActionResponse = response.json().map_err(|e| {
            if status == StatusCode::NOT_FOUND {
                CatalogError::Unavailable(format!("no action API at {}", url))
            } else {
                CatalogError::Http(e)
            }
        })?;

        if body.success {
            return Ok(Some(body.result.unwrap_or(Value::Null)));
        }

        match body.error {
            Some(error) if error.is_not_found() => Ok(None),
            Some(error) if error.is_duplicate() => Err(CatalogError::AlreadyExists {
                kind: "entity",
                name: payload["name"].as_str().unwrap_or_default().to_string(),
            }),
            Some(error) => Err(CatalogError::Rejected {
                action: action.to_string(),
                message: error.describe(),
            }),
            None => Err(CatalogError::Rejected {
                action: action.to_string(),
                message: format!("unsuccessful response ({})", status),
            }),
        }
    }

    /// Call an action whose result must be present
    fn call_expect<T: DeserializeOwned>(&self, action: &str, payload: &Value) -> Result<T, CatalogError> {
        let result = self.call(action, payload)?.ok_or_else(|| CatalogError::Rejected {
            action: action.to_string(),
            message: "not found".to_string(),
        })?;
        Ok(serde_json::from_value(result)?)
    }

    fn show<T: DeserializeOwned>(&self, action: &str, id: &str) -> Result<Option<T>, CatalogError> {
        match self.call(action, &json!({ "id": id }))? {
            Some(result) => Ok(Some(serde_json::from_value(result)?)),
            None => Ok(None),
        }
    }
}

impl CatalogStore for CkanCatalog {
    fn name(&self) -> &str {
        "ckan"
    }

    fn group_show(&self, name: &str) -> Result<Option<Group>, CatalogError> {
        Ok(self.show::<CkanEntity>("group_show", name)?.map(Into::into))
    }

    fn group_create(&self, spec: &EntitySpec) -> Result<Group, CatalogError> {
        let entity: CkanEntity = self.call_expect("group_create", &entity_payload(spec))?;
        Ok(entity.into())
    }

    fn organization_show(&self, name: &str) -> Result<Option<Organization>, CatalogError> {
        Ok(self
            .show::<CkanEntity>("organization_show", name)?
            .map(Into::into))
    }

    fn organization_create(&self, spec: &EntitySpec) -> Result<Organization, CatalogError> {
        let entity: CkanEntity = self.call_expect("organization_create", &entity_payload(spec))?;
        Ok(entity.into())
    }

    fn package_show(&self, id_or_name: &str) -> Result<Option<CatalogPackage>, CatalogError> {
        Ok(self
            .show::<CkanPackage>("package_show", id_or_name)?
            .map(Into::into))
    }

    fn package_upsert(&self, package: &CatalogPackage) -> Result<UpsertOutcome, CatalogError> {
        let payload = package_payload(package);
        if self.call("package_show", &json!({ "id": package.id }))?.is_some() {
            self.call_expect::<Value>("package_update", &payload)?;
            Ok(UpsertOutcome::Updated)
        } else {
            self.call_expect::<Value>("package_create", &payload)?;
            Ok(UpsertOutcome::Created)
        }
    }

    fn term_translation_upsert(&self, translation: &TermTranslation) -> Result<(), CatalogError> {
        self.call_expect::<Value>("term_translation_update", &serde_json::to_value(translation)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocaleTables;
    use crate::harvest::IdentityResolver;
    use crate::test_server::{TestRequest, TestServer};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn success(result: Value) -> (u16, String) {
        (200, json!({"success": true, "result": result}).to_string())
    }

    fn failure(status: u16, error: Value) -> (u16, String) {
        (status, json!({"success": false, "error": error}).to_string())
    }

    fn not_found() -> (u16, String) {
        failure(404, json!({"__type": "Not Found Error", "message": "Not found"}))
    }

    fn duplicate() -> (u16, String) {
        failure(
            409,
            json!({"__type": "Validation Error", "name": ["Group name already exists in database"]}),
        )
    }

    fn catalog_for(server: &TestServer) -> CkanCatalog {
        let config = CatalogConfig {
            api_url: Some(server.base_url.clone()),
            api_key: Some("secret".to_string()),
            ..Default::default()
        };
        CkanCatalog::new(&config).unwrap()
    }

    fn spec(name: &str) -> EntitySpec {
        EntitySpec {
            name: name.to_string(),
            title: name.to_string(),
            description: String::new(),
            extras: BTreeMap::new(),
        }
    }

    #[test]
    fn test_responses_map_to_catalog_errors() {
        let seen: Arc<Mutex<Vec<TestRequest>>> = Arc::default();
        let log = seen.clone();
        let server = TestServer::start(move |request| {
            log.lock().push(request.clone());
            match request.path.as_str() {
                "/api/3/action/group_show" => not_found(),
                "/api/3/action/group_create" => duplicate(),
                "/api/3/action/organization_show" => (503, String::new()),
                _ => failure(403, json!({"__type": "Authorization Error", "message": "Access denied"})),
            }
        });
        let catalog = catalog_for(&server);

        assert!(catalog.group_show("bevolkerung").unwrap().is_none());
        assert!(matches!(
            catalog.group_create(&spec("bevolkerung")),
            Err(CatalogError::AlreadyExists { ref name, .. }) if name == "bevolkerung"
        ));
        let unavailable = catalog.organization_show("bfs").unwrap_err();
        assert!(matches!(unavailable, CatalogError::Unavailable(_)));
        assert!(unavailable.is_recoverable());
        assert!(matches!(
            catalog.term_translation_upsert(&TermTranslation::new("fr", "Politik", "Politique")),
            Err(CatalogError::Rejected { ref action, .. }) if action == "term_translation_update"
        ));

        let seen = seen.lock();
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|r| r.method == "POST"));
        assert!(seen
            .iter()
            .all(|r| r.headers.get("authorization").map(String::as_str) == Some("secret")));
        assert_eq!(
            serde_json::from_str::<Value>(&seen[0].body).unwrap(),
            json!({"id": "bevolkerung"})
        );
    }

    #[test]
    fn test_create_race_resolves_through_lookup() {
        let shows = Arc::new(AtomicUsize::new(0));
        let creates = Arc::new(AtomicUsize::new(0));
        let (s, c) = (shows.clone(), creates.clone());
        let server = TestServer::start(move |request| match request.path.as_str() {
            "/api/3/action/group_show" => {
                // Another writer creates the group between lookup and create
                if s.fetch_add(1, Ordering::SeqCst) == 0 {
                    not_found()
                } else {
                    success(json!({"id": "g-1", "name": "bevolkerung", "title": "Bevölkerung"}))
                }
            }
            "/api/3/action/group_create" => {
                c.fetch_add(1, Ordering::SeqCst);
                duplicate()
            }
            _ => not_found(),
        });
        let catalog = catalog_for(&server);

        let resolver = IdentityResolver::new(Arc::new(LocaleTables::default()));
        let group = resolver.resolve_group(&catalog, "Bevölkerung").unwrap();

        assert_eq!(group.id, "g-1");
        assert_eq!(group.name, "bevolkerung");
        assert_eq!(shows.load(Ordering::SeqCst), 2);
        assert_eq!(creates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_package_upsert_over_http() {
        let created = Arc::new(AtomicUsize::new(0));
        let c = created.clone();
        let server = TestServer::start(move |request| match request.path.as_str() {
            "/api/3/action/package_show" if c.load(Ordering::SeqCst) == 0 => not_found(),
            "/api/3/action/package_show" => success(json!({"id": "abc", "name": "population"})),
            "/api/3/action/package_create" => {
                c.fetch_add(1, Ordering::SeqCst);
                success(json!({"id": "abc", "name": "population"}))
            }
            "/api/3/action/package_update" => success(json!({"id": "abc", "name": "population"})),
            _ => not_found(),
        });
        let catalog = catalog_for(&server);

        let package = CatalogPackage {
            id: "abc".to_string(),
            name: "population".to_string(),
            title: "Population".to_string(),
            notes: String::new(),
            author: None,
            maintainer: None,
            maintainer_email: None,
            license_id: None,
            owner_org: "org-1".to_string(),
            groups: Vec::new(),
            tags: Vec::new(),
            resources: Vec::new(),
            extras: BTreeMap::new(),
        };

        assert_eq!(catalog.package_upsert(&package).unwrap(), UpsertOutcome::Created);
        assert_eq!(catalog.package_upsert(&package).unwrap(), UpsertOutcome::Updated);
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(catalog.package_show("abc").unwrap().unwrap().name, "population");
    }

    #[test]
    fn test_requires_api_url() {
        let config = CatalogConfig::default();
        assert!(matches!(
            CkanCatalog::new(&config),
            Err(CatalogError::Unavailable(_))
        ));
    }

    #[test]
    fn test_action_url_is_normalized() {
        let config = CatalogConfig {
            api_url: Some("https://ckan.example.org/".to_string()),
            api_key: Some("secret".to_string()),
            ..Default::default()
        };
        let catalog = CkanCatalog::new(&config).unwrap();
        assert_eq!(catalog.action_url, "https://ckan.example.org/api/3/action");
    }

    #[test]
    fn test_error_classification() {
        let not_found: ActionError =
            serde_json::from_value(json!({"__type": "Not Found Error", "message": "Not found"})).unwrap();
        assert!(not_found.is_not_found());

        let duplicate: ActionError = serde_json::from_value(json!({
            "__type": "Validation Error",
            "name": ["Group name already exists in database"]
        }))
        .unwrap();
        assert!(duplicate.is_duplicate());
        assert!(!duplicate.is_not_found());
    }

    #[test]
    fn test_package_conversion() {
        let raw = json!({
            "id": "abc",
            "name": "population",
            "title": "Population",
            "groups": [{"name": "bevolkerung", "id": "g1"}],
            "tags": [{"name": "census"}],
            "resources": [{"url": "http://a/x.px", "name": "x.px", "format": "PX"}],
            "extras": [{"key": "dataset_id", "value": "px-1"}]
        });
        let package: CatalogPackage = serde_json::from_value::<CkanPackage>(raw).unwrap().into();
        assert_eq!(package.groups, vec!["bevolkerung"]);
        assert_eq!(package.tags, vec!["census"]);
        assert_eq!(package.resources[0].format, "px");
        assert_eq!(package.extras.get("dataset_id").map(String::as_str), Some("px-1"));
        assert_eq!(package.notes, "");
    }

    #[test]
    fn test_package_payload_shape() {
        let package = CatalogPackage {
            id: "abc".to_string(),
            name: "population".to_string(),
            title: "Population".to_string(),
            notes: String::new(),
            author: None,
            maintainer: None,
            maintainer_email: None,
            license_id: None,
            owner_org: "org-1".to_string(),
            groups: vec!["bevolkerung".to_string()],
            tags: vec!["census".to_string()],
            resources: Vec::new(),
            extras: BTreeMap::from([("license_url".to_string(), "http://l".to_string())]),
        };
        let payload = package_payload(&package);
        assert_eq!(payload["groups"][0]["name"], "bevolkerung");
        assert_eq!(payload["extras"][0]["key"], "license_url");
        assert_eq!(payload["owner_org"], "org-1");
    }
}
