use std::collections::HashMap;

use argodiff_defs::{
    AppResource, Application, ApplicationList, ArgoCdConfig, PlatformError, ResourceKey,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::client::{DiffOutcome, DiffTarget, ManagedResource, PlatformClient, PlatformVersion};
use crate::manifests::parse_manifest_value;

const ARGODIFF_USER_AGENT: &str = "argo-diff";
const HOOK_ANNOTATIONS: &[&str] = &["helm.sh/hook", "argocd.argoproj.io/hook"];
const LAST_APPLIED_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";
const TRACKING_ID_ANNOTATION: &str = "argocd.argoproj.io/tracking-id";
const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";
const SERVER_MANAGED_METADATA: &[&str] = &[
    "managedFields",
    "resourceVersion",
    "uid",
    "generation",
    "creationTimestamp",
    "selfLink",
];

#[derive(Debug, Deserialize)]
struct ManagedResourcesResponse {
    #[serde(default)]
    items: Option<Vec<ManagedResource>>,
}

#[derive(Debug, Deserialize)]
struct ManifestResponse {
    #[serde(default)]
    manifests: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    #[serde(rename = "Version")]
    version: String,
}

/// Talks to the platform's REST API and diffs live against predicted state locally.
pub struct HttpClient {
    client: Client,
    base_url: String,
    auth_token: String,
}

/// Base URL of the REST API; falls back to the gRPC server address.
pub fn api_base_url(config: &ArgoCdConfig) -> String {
    let base = if !config.base_url.is_empty() {
        config.base_url.clone()
    } else {
        let scheme = if config.plaintext { "http" } else { "https" };
        format!("{}://{}", scheme, config.server_addr)
    };
    base.trim_end_matches('/').to_string()
}

impl HttpClient {
    pub fn new(config: &ArgoCdConfig) -> Result<Self, PlatformError> {
        let base_url = api_base_url(config);
        let client = Client::builder()
            .user_agent(ARGODIFF_USER_AGENT)
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| PlatformError::Http {
                endpoint: base_url.clone(),
                message: e.to_string(),
            })?;
        Ok(HttpClient {
            client,
            base_url,
            auth_token: config.auth_token.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, PlatformError> {
        let endpoint = format!("{}{}", self.base_url, path);
        log::debug!("GET {}", endpoint);

        let response = self
            .client
            .get(&endpoint)
            .bearer_auth(&self.auth_token)
            .query(query)
            .send()
            .await
            .map_err(|e| PlatformError::Http {
                endpoint: endpoint.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| PlatformError::Http {
            endpoint: endpoint.clone(),
            message: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(PlatformError::Status {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| PlatformError::Decode {
            context: endpoint,
            message: e.to_string(),
        })
    }

    async fn fetch_manifests(
        &self,
        name: &str,
        namespace: &str,
        target: &DiffTarget,
    ) -> Result<Vec<String>, PlatformError> {
        let mut query = manifests_query(target);
        push_namespace(&mut query, namespace);
        let response: ManifestResponse = self
            .get_json(&format!("/api/v1/applications/{}/manifests", name), &query)
            .await?;
        Ok(response.manifests.unwrap_or_default())
    }
}

fn push_namespace(query: &mut Vec<(String, String)>, namespace: &str) {
    if !namespace.is_empty() {
        query.push(("appNamespace".to_string(), namespace.to_string()));
    }
}

pub fn manifests_query(target: &DiffTarget) -> Vec<(String, String)> {
    match target {
        DiffTarget::Revision(revision) => vec![("revision".to_string(), revision.clone())],
        DiffTarget::Sources {
            revisions,
            positions,
        } => revisions
            .iter()
            .map(|rev| ("revisions".to_string(), rev.clone()))
            .chain(
                positions
                    .iter()
                    .map(|pos| ("sourcePositions".to_string(), pos.to_string())),
            )
            .collect(),
    }
}

fn annotations(value: &Value) -> Option<&serde_json::Map<String, Value>> {
    value.pointer("/metadata/annotations").and_then(Value::as_object)
}

/// Hooks run around syncs and are not part of the desired state.
pub fn is_hook(value: &Value) -> bool {
    annotations(value)
        .map(|map| HOOK_ANNOTATIONS.iter().any(|hook| map.contains_key(*hook)))
        .unwrap_or(false)
}

fn is_secret(group: &str, kind: &str) -> bool {
    group.is_empty() && kind == "Secret"
}

fn remove_entries(value: &mut Value, pointer: &str, keys: &[&str]) {
    if let Some(map) = value.pointer_mut(pointer).and_then(Value::as_object_mut) {
        for key in keys {
            map.remove(*key);
        }
        if map.is_empty() {
            let (parent, field) = pointer.rsplit_once('/').unwrap_or(("", pointer));
            if let Some(parent) = value.pointer_mut(parent).and_then(Value::as_object_mut) {
                parent.remove(field);
            }
        }
    }
}

/// Drops fields the cluster or the platform set on live objects.
pub fn strip_server_fields(value: &mut Value) {
    if let Some(object) = value.as_object_mut() {
        object.remove("status");
    }
    if let Some(metadata) = value.get_mut("metadata").and_then(Value::as_object_mut) {
        for field in SERVER_MANAGED_METADATA {
            metadata.remove(*field);
        }
    }
    remove_entries(
        value,
        "/metadata/annotations",
        &[LAST_APPLIED_ANNOTATION, TRACKING_ID_ANNOTATION],
    );
    remove_entries(value, "/metadata/labels", &[INSTANCE_LABEL]);
}

/// YAML rendering used on both sides of the diff.
pub fn to_yaml(value: &Value) -> Result<String, String> {
    let yaml = serde_yaml::to_string(value).map_err(|e| e.to_string())?;
    Ok(yaml.strip_prefix("---\n").unwrap_or(&yaml).to_string())
}

/// Pairs live resources with predicted manifests and keeps the ones that differ.
///
/// Predicted manifests without a namespace take `default_namespace`, unless
/// the live side tracks the resource as cluster scoped.
pub fn pair_resources(
    live: &[ManagedResource],
    manifests: &[String],
    default_namespace: &str,
) -> Result<DiffOutcome, PlatformError> {
    let mut predicted: HashMap<ResourceKey, String> = HashMap::new();
    let mut predicted_order = vec![];

    for doc in manifests {
        let manifest = parse_manifest_value(doc).map_err(PlatformError::TargetState)?;
        if is_hook(&manifest.json) || is_secret(manifest.group(), &manifest.manifest.kind) {
            continue;
        }
        let explicit_ns = manifest.manifest.metadata.namespace.clone();
        let mut key = ResourceKey::new(
            manifest.group(),
            &manifest.manifest.kind,
            explicit_ns.as_deref().unwrap_or(default_namespace),
            &manifest.manifest.metadata.name,
        );
        if explicit_ns.is_none() {
            let cluster_scoped = live.iter().any(|res| {
                res.namespace.is_empty()
                    && res.group == key.group
                    && res.kind == key.kind
                    && res.name == key.name
            });
            if cluster_scoped {
                key.namespace = String::new();
            }
        }
        let mut json = manifest.json;
        if explicit_ns.is_none() && !key.namespace.is_empty() {
            if let Some(metadata) = json.get_mut("metadata").and_then(Value::as_object_mut) {
                metadata.insert("namespace".to_string(), Value::from(key.namespace.clone()));
            }
        }
        strip_server_fields(&mut json);
        let yaml = to_yaml(&json).map_err(PlatformError::TargetState)?;
        if predicted.insert(key.clone(), yaml).is_none() {
            predicted_order.push(key);
        }
    }

    let mut outcome = DiffOutcome::default();
    for res in live {
        if is_secret(&res.group, &res.kind) {
            continue;
        }
        let key = ResourceKey::new(&res.group, &res.kind, &res.namespace, &res.name);
        let live_yaml = live_state_yaml(res)?;
        let predicted_yaml = predicted.remove(&key).unwrap_or_default();
        outcome.total_resource_count += 1;
        if live_yaml != predicted_yaml {
            log::debug!("Resource {} differs from live state", key);
            outcome
                .changed
                .push(AppResource::raw(key, &live_yaml, &predicted_yaml));
        }
    }

    // Predicted resources not yet in the cluster
    for key in predicted_order {
        if let Some(predicted_yaml) = predicted.remove(&key) {
            outcome.total_resource_count += 1;
            outcome.changed.push(AppResource::raw(key, "", &predicted_yaml));
        }
    }
    Ok(outcome)
}

fn live_state_yaml(res: &ManagedResource) -> Result<String, PlatformError> {
    let state = res.normalized_live_state.trim();
    if state.is_empty() || state == "null" {
        return Ok(String::new());
    }
    let mut json: Value = serde_json::from_str(state).map_err(|e| {
        PlatformError::LiveStateDecode(format!("{}/{} {}: {}", res.kind, res.namespace, res.name, e))
    })?;
    strip_server_fields(&mut json);
    to_yaml(&json).map_err(PlatformError::LiveStateDecode)
}

#[async_trait]
impl PlatformClient for HttpClient {
    async fn list_applications(&self) -> Result<Vec<Application>, PlatformError> {
        log::trace!("list_applications() called");
        let list: ApplicationList = self
            .get_json("/api/v1/applications", &[])
            .await
            .inspect_err(|e| log::error!("Application List failed: {}", e))?;
        Ok(list.into_items())
    }

    async fn get_application(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Application, PlatformError> {
        let mut query = vec![("refresh".to_string(), "normal".to_string())];
        push_namespace(&mut query, namespace);
        self.get_json(&format!("/api/v1/applications/{}", name), &query)
            .await
    }

    async fn get_managed_resources(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Vec<ManagedResource>, PlatformError> {
        let mut query = vec![];
        push_namespace(&mut query, namespace);
        let response: ManagedResourcesResponse = self
            .get_json(
                &format!("/api/v1/applications/{}/managed-resources", name),
                &query,
            )
            .await
            .map_err(|e| PlatformError::LiveState(e.to_string()))?;
        Ok(response.items.unwrap_or_default())
    }

    async fn get_manifests(
        &self,
        name: &str,
        namespace: &str,
        revision: &str,
    ) -> Result<Vec<String>, PlatformError> {
        self.fetch_manifests(name, namespace, &DiffTarget::Revision(revision.to_string()))
            .await
            .inspect_err(|e| {
                log::error!(
                    "Get Argo application manifests for {} at {} failed: {}",
                    name,
                    revision,
                    e
                )
            })
    }

    async fn diff_application(
        &self,
        name: &str,
        namespace: &str,
        target: &DiffTarget,
    ) -> Result<DiffOutcome, PlatformError> {
        log::trace!("diff_application({}, {})", name, target.describe());
        let app = self.get_application(name, namespace).await?;
        let default_namespace = app
            .spec
            .destination
            .as_ref()
            .and_then(|dest| dest.namespace.clone())
            .unwrap_or_default();

        let live = self.get_managed_resources(name, namespace).await?;
        let manifests = self
            .fetch_manifests(name, namespace, target)
            .await
            .map_err(|e| PlatformError::TargetState(e.to_string()))?;

        let outcome = pair_resources(&live, &manifests, &default_namespace)?;
        log::debug!(
            "Application {} revision {} has {} of {} resources changed",
            name,
            target.describe(),
            outcome.changed.len(),
            outcome.total_resource_count
        );
        Ok(outcome)
    }

    async fn version(&self) -> Result<PlatformVersion, PlatformError> {
        let response: VersionResponse = self.get_json("/api/version", &[]).await?;
        Ok(PlatformVersion {
            client: None,
            server: response
                .version
                .split('+')
                .next()
                .unwrap_or(&response.version)
                .to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argodiff_defs::ResourceDiff;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn managed(kind: &str, namespace: &str, name: &str, live: Value) -> ManagedResource {
        ManagedResource {
            group: String::new(),
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            normalized_live_state: live.to_string(),
        }
    }

    fn config_map(name: &str, level: &str) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": name, "namespace": "web"},
            "data": {"LOG_LEVEL": level}
        })
    }

    #[test]
    fn test_api_base_url() {
        let mut config = ArgoCdConfig {
            server_addr: "argocd.example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(api_base_url(&config), "https://argocd.example.com");
        config.plaintext = true;
        assert_eq!(api_base_url(&config), "http://argocd.example.com");
        config.base_url = "https://argo.internal/".to_string();
        assert_eq!(api_base_url(&config), "https://argo.internal");
    }

    #[test]
    fn test_manifests_query() {
        assert_eq!(
            manifests_query(&DiffTarget::Revision("abc".to_string())),
            vec![("revision".to_string(), "abc".to_string())]
        );
        let query = manifests_query(&DiffTarget::Sources {
            revisions: vec!["abc".to_string()],
            positions: vec![2],
        });
        assert_eq!(
            query,
            vec![
                ("revisions".to_string(), "abc".to_string()),
                ("sourcePositions".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn test_strip_server_fields() {
        let mut value = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": "settings",
                "uid": "1234",
                "resourceVersion": "99",
                "managedFields": [],
                "labels": {"app.kubernetes.io/instance": "web"},
                "annotations": {
                    "kubectl.kubernetes.io/last-applied-configuration": "{}",
                    "team": "platform"
                }
            },
            "status": {"phase": "Active"}
        });
        strip_server_fields(&mut value);
        assert_eq!(
            value,
            json!({
                "apiVersion": "v1",
                "kind": "ConfigMap",
                "metadata": {
                    "name": "settings",
                    "annotations": {"team": "platform"}
                }
            })
        );
    }

    #[test]
    fn test_pair_resources_detects_changes() {
        let live = vec![
            managed("ConfigMap", "web", "same", config_map("same", "info")),
            managed("ConfigMap", "web", "changed", config_map("changed", "info")),
            managed("ConfigMap", "web", "removed", config_map("removed", "info")),
        ];
        let manifests = vec![
            config_map("same", "info").to_string(),
            config_map("changed", "debug").to_string(),
            config_map("added", "info").to_string(),
        ];
        let outcome = pair_resources(&live, &manifests, "web").unwrap();
        assert_eq!(outcome.total_resource_count, 4);
        let names: Vec<&str> = outcome.changed.iter().map(|r| r.key.name.as_str()).collect();
        assert_eq!(names, vec!["changed", "removed", "added"]);

        match &outcome.changed[1].diff {
            ResourceDiff::Raw {
                live_yaml,
                predicted_yaml,
            } => {
                assert!(live_yaml.contains("LOG_LEVEL: info"));
                assert_eq!(predicted_yaml, "");
            }
            other => panic!("unexpected diff {:?}", other),
        }
    }

    #[test]
    fn test_pair_resources_default_namespace() {
        let live = vec![managed("ConfigMap", "web", "settings", config_map("settings", "info"))];
        let manifest = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "settings"},
            "data": {"LOG_LEVEL": "info"}
        });
        let outcome = pair_resources(&live, &[manifest.to_string()], "web").unwrap();
        assert_eq!(outcome.total_resource_count, 1);
        assert!(outcome.changed.is_empty());
    }

    #[test]
    fn test_pair_resources_cluster_scoped() {
        let namespace = json!({"apiVersion": "v1", "kind": "Namespace", "metadata": {"name": "web"}});
        let live = vec![managed("Namespace", "", "web", namespace.clone())];
        let outcome = pair_resources(&live, &[namespace.to_string()], "web").unwrap();
        assert_eq!(outcome.total_resource_count, 1);
        assert!(outcome.changed.is_empty());
    }

    #[test]
    fn test_pair_resources_skips_secrets_and_hooks() {
        let secret = json!({"apiVersion": "v1", "kind": "Secret", "metadata": {"name": "creds"}});
        let hook = json!({
            "apiVersion": "batch/v1",
            "kind": "Job",
            "metadata": {"name": "migrate", "annotations": {"helm.sh/hook": "pre-install"}}
        });
        let live = vec![managed("Secret", "web", "creds", secret.clone())];
        let outcome =
            pair_resources(&live, &[secret.to_string(), hook.to_string()], "web").unwrap();
        assert_eq!(outcome, DiffOutcome::default());
    }

    #[test]
    fn test_pair_resources_missing_live_object() {
        let live = vec![ManagedResource {
            kind: "ConfigMap".to_string(),
            namespace: "web".to_string(),
            name: "settings".to_string(),
            normalized_live_state: "null".to_string(),
            ..Default::default()
        }];
        let outcome =
            pair_resources(&live, &[config_map("settings", "info").to_string()], "web").unwrap();
        assert_eq!(outcome.changed.len(), 1);
        assert_eq!(outcome.total_resource_count, 1);
    }

    #[test]
    fn test_pair_resources_bad_live_state() {
        let live = vec![ManagedResource {
            kind: "ConfigMap".to_string(),
            name: "settings".to_string(),
            normalized_live_state: "{not json".to_string(),
            ..Default::default()
        }];
        let err = pair_resources(&live, &[], "web").unwrap_err();
        assert!(matches!(err, PlatformError::LiveStateDecode(_)));
    }
}
