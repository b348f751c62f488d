use std::fmt;

use serde::{Deserialize, Serialize};

use crate::application::Application;

/// Group of the platform's own Application CRD.
pub const APPLICATION_GROUP: &str = "argoproj.io";
pub const APPLICATION_KIND: &str = "Application";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub group: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(group: &str, kind: &str, namespace: &str, name: &str) -> Self {
        ResourceKey {
            group: group.to_string(),
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn is_application(&self) -> bool {
        self.group == APPLICATION_GROUP && self.kind == APPLICATION_KIND
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {}/{}",
            self.group, self.kind, self.namespace, self.name
        )
    }
}

/// Each platform adapter emits exactly one of these variants.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ResourceDiff {
    /// Unified diff text produced by the external diff tool.
    Rendered { diff_text: String },
    /// Live and predicted state; the diff is rendered locally.
    Raw {
        live_yaml: String,
        predicted_yaml: String,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AppResource {
    #[serde(flatten)]
    pub key: ResourceKey,
    pub diff: ResourceDiff,
}

impl AppResource {
    pub fn rendered(key: ResourceKey, diff_text: &str) -> Self {
        AppResource {
            key,
            diff: ResourceDiff::Rendered {
                diff_text: diff_text.to_string(),
            },
        }
    }

    pub fn raw(key: ResourceKey, live_yaml: &str, predicted_yaml: &str) -> Self {
        AppResource {
            key,
            diff: ResourceDiff::Raw {
                live_yaml: live_yaml.to_string(),
                predicted_yaml: predicted_yaml.to_string(),
            },
        }
    }
}

/// Classifies a per-application failure. Failures to read the base state are
/// counted as "unknown" rather than as errors.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeErrorKind {
    BaseManifestFetch,
    BaseManifestDecode,
    NewManifestFetch,
    Diff,
    Discovery,
}

impl ChangeErrorKind {
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            ChangeErrorKind::BaseManifestFetch | ChangeErrorKind::BaseManifestDecode
        )
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChangeWarning {
    pub kind: ChangeErrorKind,
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ApplicationDiffResult {
    pub application: Application,
    pub changed_resources: Vec<AppResource>,
    pub total_resource_count: usize,
    pub warning: Option<ChangeWarning>,
}

impl ApplicationDiffResult {
    pub fn new(application: Application) -> Self {
        ApplicationDiffResult {
            application,
            changed_resources: vec![],
            total_resource_count: 0,
            warning: None,
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.changed_resources.is_empty()
    }

    pub fn set_warning(&mut self, kind: ChangeErrorKind, message: String) {
        self.warning = Some(ChangeWarning { kind, message });
    }
}

/// A single rendered Kubernetes object, as returned by the manifests endpoint.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct K8sManifest {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: K8sMetadata,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct K8sMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl K8sManifest {
    /// Group portion of `apiVersion`; empty for the core group.
    pub fn group(&self) -> &str {
        match self.api_version.split_once('/') {
            Some((group, _)) => group,
            None => "",
        }
    }

    pub fn is_application(&self) -> bool {
        self.kind == APPLICATION_KIND && self.group() == APPLICATION_GROUP
    }
}
