use std::collections::{HashMap, HashSet, VecDeque};

use argodiff_defs::{AppResource, Application, ApplicationDiffResult, ChangeEvent, PlatformError};

use crate::client::{DiffTarget, PlatformClient};
use crate::discovery::{discover_changed_applications, nested_diff_target};
use crate::matcher::{app_names, filter_applications, git_repo_match};

/// Diff state of one event: results in match order plus the names already
/// diffed, which keeps nested application graphs from being walked twice.
struct ChangeCollector<'a> {
    client: &'a dyn PlatformClient,
    event: &'a ChangeEvent,
    lookup: HashMap<String, Application>,
    visited: HashSet<String>,
    results: Vec<ApplicationDiffResult>,
}

impl<'a> ChangeCollector<'a> {
    fn new(client: &'a dyn PlatformClient, event: &'a ChangeEvent, apps: &[Application]) -> Self {
        ChangeCollector {
            client,
            event,
            lookup: apps
                .iter()
                .map(|app| (app.name().to_string(), app.clone()))
                .collect(),
            visited: HashSet::new(),
            results: vec![],
        }
    }

    /// Diffs one application and records the result when it has changes or
    /// failed. Returns the changed resources on success.
    async fn diff(&mut self, app: &Application, target: &DiffTarget) -> Option<Vec<AppResource>> {
        self.visited.insert(app.name().to_string());
        let mut result = ApplicationDiffResult::new(app.clone());
        match self
            .client
            .diff_application(app.name(), app.namespace(), target)
            .await
        {
            Ok(outcome) => {
                result.total_resource_count = outcome.total_resource_count;
                if outcome.changed.is_empty() {
                    log::info!("Application {} has no changes", app.name());
                    return None;
                }
                result.changed_resources = outcome.changed.clone();
                self.results.push(result);
                Some(outcome.changed)
            }
            Err(e) => {
                let kind = e.change_error_kind();
                result.set_warning(kind, format!("Failed to diff application {}: {}", app.name(), e));
                self.results.push(result);
                None
            }
        }
    }

    /// Follows Applications declared by a changed application, breadth first.
    async fn cascade(&mut self, root: &Application, changed: Vec<AppResource>) {
        let mut queue = VecDeque::from([(root.clone(), changed)]);

        while let Some((parent, changed)) = queue.pop_front() {
            let nested = match discover_changed_applications(
                self.client,
                &parent,
                &changed,
                &self.event.commit_sha,
            )
            .await
            {
                Ok(nested) => nested,
                Err(e) => {
                    log::warn!(
                        "Unable to determine if {} has other Applications with changes: {}",
                        parent.name(),
                        e
                    );
                    continue;
                }
            };
            if !nested.is_empty() {
                log::info!(
                    "{} Applications detected to have changes via {}",
                    nested.len(),
                    parent.name()
                );
            }

            for new_app in nested {
                let name = new_app.name().to_string();
                if self.visited.contains(&name) {
                    log::debug!("Skipping {}, already diffed", name);
                    continue;
                }
                let Some(current) = self.lookup.get(&name).cloned() else {
                    log::info!("Application {} not found in current ArgoCD app list", name);
                    continue;
                };

                match nested_diff_target(&current, &new_app, self.event) {
                    Ok(target) => {
                        if let Some(changed) = self.diff(&current, &target).await {
                            queue.push_back((current, changed));
                        }
                    }
                    Err(e) => {
                        self.visited.insert(name.clone());
                        let mut result = ApplicationDiffResult::new(current);
                        result.set_warning(
                            e.change_error_kind(),
                            format!("Failed to diff application {}: {}", name, e),
                        );
                        self.results.push(result);
                    }
                }
            }
        }
    }
}

/// Revisions for a multi-source application matched by the event: the
/// event's sha at every position whose source is the changed repository.
pub fn multi_source_target(app: &Application, event: &ChangeEvent) -> DiffTarget {
    let mut revisions = vec![];
    let mut positions = vec![];
    for (i, source) in app.get_sources().iter().enumerate() {
        if git_repo_match(&source.repo_url, &event.repo_owner, &event.repo_name) {
            revisions.push(event.commit_sha.clone());
            positions.push(i + 1);
        }
    }
    DiffTarget::Sources {
        revisions,
        positions,
    }
}

/// Lists applications, matches them against the event and diffs each match.
///
/// Single-source matches are diffed first, following any nested Applications
/// they declare. Multi-source matches are diffed afterwards. An application
/// already reached through a parent is never diffed again. Results keep match order.
pub async fn get_application_changes(
    client: &dyn PlatformClient,
    event: &ChangeEvent,
) -> Result<Vec<ApplicationDiffResult>, PlatformError> {
    let apps = client.list_applications().await?;
    log::trace!("list_applications() returned {} items", apps.len());
    if apps.is_empty() {
        return Err(PlatformError::EmptyInventory);
    }

    let mut collector = ChangeCollector::new(client, event, &apps);

    let single = filter_applications(&apps, event, false);
    log::debug!("Matching apps: {}", app_names(&single));
    for app in &single {
        if collector.visited.contains(app.name()) {
            log::debug!("Skipping {}, already diffed through a parent", app.name());
            continue;
        }
        log::info!(
            "Generating application diff for ArgoCD App '{}' w/ revision {}",
            app.name(),
            event.commit_sha
        );
        let target = DiffTarget::Revision(event.commit_sha.clone());
        if let Some(changed) = collector.diff(app, &target).await {
            collector.cascade(app, changed).await;
        }
    }

    let multi = filter_applications(&apps, event, true);
    log::debug!("Matching multi-source apps: {}", app_names(&multi));
    for app in &multi {
        if collector.visited.contains(app.name()) {
            log::debug!("Skipping multi-source {}, already diffed", app.name());
            continue;
        }
        log::info!(
            "Generating application diff for multi-source ArgoCD App '{}' w/ revision {}",
            app.name(),
            event.commit_sha
        );
        let target = multi_source_target(app, event);
        if let Some(changed) = collector.diff(app, &target).await {
            collector.cascade(app, changed).await;
        }
    }

    Ok(collector.results)
}
