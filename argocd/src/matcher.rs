use argodiff_defs::{Application, ApplicationSource, ChangeEvent, HEAD_REVISION};

use crate::path_filter::filter_by_path;

const GITHUB_HOST: &str = "github.com";
const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// True if `repo_url` points at `owner/repo` on GitHub, over https or ssh, with or without `.git`.
pub fn git_repo_match(repo_url: &str, owner: &str, repo: &str) -> bool {
    let candidates = [
        format!("{}/{}/{}.git", GITHUB_HOST, owner, repo),
        format!("{}:{}/{}.git", GITHUB_HOST, owner, repo),
        format!("{}/{}/{}", GITHUB_HOST, owner, repo),
        format!("{}:{}/{}", GITHUB_HOST, owner, repo),
    ];
    candidates.iter().any(|candidate| repo_url.ends_with(candidate.as_str()))
}

/// Decides whether one source of an application is implicated by the event.
pub fn check_source(
    source: &ApplicationSource,
    app_name: &str,
    event: &ChangeEvent,
    automated_sync: bool,
) -> bool {
    if !git_repo_match(&source.repo_url, &event.repo_owner, &event.repo_name) {
        log::debug!(
            "Filtering application {}: RepoURL {} doesn't match {}/{}",
            app_name,
            source.repo_url,
            event.repo_owner,
            event.repo_name
        );
        return false;
    }

    let tracks_head = source.target_revision == HEAD_REVISION;

    if !event.base_ref.is_empty() {
        // Pull request
        if tracks_head && event.base_ref != event.repo_default_ref {
            log::debug!(
                "Filtering application {}: target is HEAD; base ref {} != default ref {}",
                app_name,
                event.base_ref,
                event.repo_default_ref
            );
            return false;
        }
        if !tracks_head && event.base_ref != source.target_revision {
            log::debug!(
                "Filtering application {}: base ref {} != target revision {}",
                app_name,
                event.base_ref,
                source.target_revision
            );
            return false;
        }
    } else {
        // Push
        let change_ref = event
            .change_ref
            .strip_prefix(BRANCH_REF_PREFIX)
            .unwrap_or(&event.change_ref);
        let deploys_this_push = if tracks_head {
            change_ref == event.repo_default_ref
        } else {
            change_ref == source.target_revision
        };
        if automated_sync && deploys_this_push {
            log::debug!(
                "Filtering auto-sync application {}: push to {} is deployed automatically",
                app_name,
                change_ref
            );
            return false;
        }
    }

    log::debug!(
        "Application {} matches {} (target revision {})",
        app_name,
        event.change_ref,
        source.target_revision
    );
    true
}

/// Applications whose sources are implicated by the event. Single-source
/// applications are only considered when `multi_source` is false and
/// multi-source ones only when it is true.
pub fn filter_applications(
    apps: &[Application],
    event: &ChangeEvent,
    multi_source: bool,
) -> Vec<Application> {
    log::trace!(
        "filter_applications([{} apps], multi_source={})",
        apps.len(),
        multi_source
    );

    let matched: Vec<Application> = apps
        .iter()
        .filter(|app| {
            let sources: &[ApplicationSource] = if multi_source {
                &app.spec.sources
            } else {
                match &app.spec.source {
                    Some(source) => std::slice::from_ref(source),
                    None => &[],
                }
            };
            let automated = app.auto_sync_enabled();
            sources
                .iter()
                .any(|source| check_source(source, app.name(), event, automated))
        })
        .cloned()
        .collect();

    if event.changed_files.is_empty() {
        log::debug!("No changed files in event; skipping manifest-generate-paths filtering");
        return matched;
    }
    log::debug!("Filtering applications on manifest-generate-paths annotation");
    filter_by_path(matched, &event.changed_files)
}

pub fn app_names(apps: &[Application]) -> String {
    apps.iter()
        .map(|app| app.name())
        .collect::<Vec<_>>()
        .join(", ")
}
