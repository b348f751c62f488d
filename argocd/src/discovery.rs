use std::collections::HashSet;

use argodiff_defs::{AppResource, Application, ChangeEvent, PlatformError};

use crate::client::{DiffTarget, PlatformClient};
use crate::manifests::{manifest_to_application, parse_manifest_value};
use crate::matcher::git_repo_match;

/// Names of changed resources that are themselves platform Applications.
pub fn changed_application_names(resources: &[AppResource]) -> HashSet<String> {
    resources
        .iter()
        .filter(|res| res.key.is_application())
        .map(|res| res.key.name.clone())
        .collect()
}

/// Finds the Applications declared by `app` at `revision` whose definitions
/// changed. Returns early without calling the platform when none changed.
pub async fn discover_changed_applications(
    client: &dyn PlatformClient,
    app: &Application,
    changed: &[AppResource],
    revision: &str,
) -> Result<Vec<Application>, PlatformError> {
    let names = changed_application_names(changed);
    if names.is_empty() {
        log::debug!("No Applications changed in {}", app.name());
        return Ok(vec![]);
    }

    log::debug!(
        "Getting manifests of {} at revision {} to resolve {} nested Applications",
        app.name(),
        revision,
        names.len()
    );
    let manifests = client
        .get_manifests(app.name(), app.namespace(), revision)
        .await?;

    let mut found = vec![];
    for (i, doc) in manifests.iter().enumerate() {
        let manifest = match parse_manifest_value(doc) {
            Ok(manifest) => manifest,
            Err(e) => {
                log::warn!("Skipping manifest {} of {}: {}", i, app.name(), e);
                continue;
            }
        };
        if !manifest.is_application() {
            continue;
        }
        match manifest_to_application(&manifest) {
            Ok(nested) => {
                if names.contains(nested.name()) && !nested.get_sources().is_empty() {
                    found.push(nested);
                }
            }
            Err(e) => log::error!(
                "Detected an Application in {} but unable to convert it: {}",
                app.name(),
                e
            ),
        }
    }
    Ok(found)
}

/// Builds the per-source revisions for a nested application: sources from
/// the changed repository get the event's sha, the rest keep their new
/// target revision.
pub fn nested_diff_target(
    current: &Application,
    new: &Application,
    event: &ChangeEvent,
) -> Result<DiffTarget, PlatformError> {
    let name = current.name();
    let current_sources = current.get_sources();
    let new_sources = new.get_sources();

    if current_sources.len() != new_sources.len() {
        return Err(PlatformError::InvalidRequest(format!(
            "number of sources for {} changing: {} -> {}",
            name,
            current_sources.len(),
            new_sources.len()
        )));
    }
    if current_sources.is_empty() {
        return Err(PlatformError::InvalidRequest(format!(
            "{} has no sources configured",
            name
        )));
    }

    let mut revisions = Vec::with_capacity(current_sources.len());
    let mut positions = Vec::with_capacity(current_sources.len());
    for (i, (cur, new)) in current_sources.iter().zip(new_sources).enumerate() {
        if cur.repo_url != new.repo_url {
            return Err(PlatformError::InvalidRequest(format!(
                "source URL is changing in {}",
                name
            )));
        }
        let revision = if git_repo_match(&cur.repo_url, &event.repo_owner, &event.repo_name) {
            event.commit_sha.clone()
        } else {
            new.target_revision.clone()
        };
        revisions.push(revision);
        positions.push(i + 1);
    }
    Ok(DiffTarget::Sources {
        revisions,
        positions,
    })
}
