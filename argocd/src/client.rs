use std::sync::Arc;

use argodiff_defs::{AppResource, Application, ArgoCdConfig, PlatformClientKind, PlatformError};
use argodiff_utils::{check_min_version, MIN_PLATFORM_VERSION};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cli::CliClient;
use crate::http::HttpClient;

/// Which revision(s) of an application to diff against live state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffTarget {
    Revision(String),
    /// One revision per 1-based source position.
    Sources {
        revisions: Vec<String>,
        positions: Vec<usize>,
    },
}

impl DiffTarget {
    pub fn describe(&self) -> String {
        match self {
            DiffTarget::Revision(revision) => revision.clone(),
            DiffTarget::Sources {
                revisions,
                positions,
            } => revisions
                .iter()
                .zip(positions)
                .map(|(rev, pos)| format!("{}@{}", rev, pos))
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// A resource the platform tracks for an application, with its live state.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResource {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
    /// JSON document, or "null" when the object does not exist in the cluster.
    #[serde(default)]
    pub normalized_live_state: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiffOutcome {
    pub changed: Vec<AppResource>,
    pub total_resource_count: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlatformVersion {
    /// Only known when talking to the platform through its CLI.
    pub client: Option<String>,
    pub server: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn list_applications(&self) -> Result<Vec<Application>, PlatformError>;

    /// Fetches one application, asking the platform to refresh it first.
    async fn get_application(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Application, PlatformError>;

    async fn get_managed_resources(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Vec<ManagedResource>, PlatformError>;

    /// Rendered manifests of the application at `revision`, one document per entry.
    async fn get_manifests(
        &self,
        name: &str,
        namespace: &str,
        revision: &str,
    ) -> Result<Vec<String>, PlatformError>;

    async fn diff_application(
        &self,
        name: &str,
        namespace: &str,
        target: &DiffTarget,
    ) -> Result<DiffOutcome, PlatformError>;

    async fn version(&self) -> Result<PlatformVersion, PlatformError>;
}

pub fn new_platform_client(config: &ArgoCdConfig) -> Result<Arc<dyn PlatformClient>, PlatformError> {
    if config.auth_token.is_empty() {
        log::warn!("Initialized with incomplete ArgoCD server config");
    }
    match config.client_kind {
        PlatformClientKind::Cli => Ok(Arc::new(CliClient::new(config))),
        PlatformClientKind::Http => Ok(Arc::new(HttpClient::new(config)?)),
    }
}

/// Verifies the platform is reachable and recent enough.
pub async fn connectivity_check(client: &dyn PlatformClient) -> Result<PlatformVersion, PlatformError> {
    log::info!("Calling ArgoCD to check client and server versions");
    let version = client.version().await?;

    if let Some(client_version) = &version.client {
        check_min_version(client_version, MIN_PLATFORM_VERSION)
            .map_err(|e| PlatformError::Version(format!("client: {}", e)))?;
    }
    check_min_version(&version.server, MIN_PLATFORM_VERSION)
        .map_err(|e| PlatformError::Version(format!("server: {}", e)))?;

    log::info!(
        "ArgoCD client {} / server {}",
        version.client.as_deref().unwrap_or("n/a"),
        version.server
    );
    Ok(version)
}
