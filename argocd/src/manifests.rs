use argodiff_defs::{Application, K8sManifest};
use serde_json::Value;

/// A parsed manifest document, kept alongside its generic JSON form.
#[derive(Clone, Debug)]
pub struct ManifestValue {
    pub manifest: K8sManifest,
    pub json: Value,
    pub source: String,
}

impl ManifestValue {
    pub fn group(&self) -> &str {
        self.manifest.group()
    }

    pub fn is_application(&self) -> bool {
        self.manifest.is_application()
    }
}

/// Splits a multi-document YAML stream, skipping empty documents.
pub fn split_manifest_documents(output: &str) -> Vec<String> {
    output
        .split("\n---")
        .map(|doc| doc.trim_start_matches("---"))
        .filter(|doc| !doc.trim().is_empty())
        .map(|doc| doc.to_string())
        .collect()
}

/// Accepts YAML or JSON, since JSON documents are valid YAML.
pub fn parse_manifest_value(doc: &str) -> Result<ManifestValue, String> {
    let json: Value = serde_yaml::from_str(doc).map_err(|e| e.to_string())?;
    let manifest: K8sManifest = serde_json::from_value(json.clone()).map_err(|e| e.to_string())?;
    Ok(ManifestValue {
        manifest,
        json,
        source: doc.to_string(),
    })
}

pub fn manifest_to_application(manifest: &ManifestValue) -> Result<Application, String> {
    serde_json::from_value(manifest.json.clone()).map_err(|e| e.to_string())
}
