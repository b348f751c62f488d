use argodiff_defs::{CommitState, CommitStatusRequest, Config, GitHubError};
use argodiff_utils::truncate_description;

use crate::github::GitHubClient;

pub const STATUS_CONTEXT: &str = "argo-diff";

pub fn status_context(context_str: &str) -> String {
    let context_str = context_str.trim();
    if context_str.is_empty() {
        STATUS_CONTEXT.to_string()
    } else {
        format!("{}/{}", STATUS_CONTEXT, context_str)
    }
}

pub fn status_request(state: CommitState, description: &str, context_str: &str) -> CommitStatusRequest {
    CommitStatusRequest {
        state,
        description: truncate_description(description),
        context: status_context(context_str),
    }
}

/// Sets the commit status for `sha`. Skipped in automation mode; only logged in dev mode.
pub async fn set_status(
    client: &dyn GitHubClient,
    config: &Config,
    owner: &str,
    repo: &str,
    sha: &str,
    state: CommitState,
    description: &str,
) -> Result<(), GitHubError> {
    if config.automation_mode {
        log::debug!("Skipping commit status");
        return Ok(());
    }
    let request = status_request(state, description, &config.context_str);

    if config.dev_mode {
        log::info!(
            "DRY RUN: set commit status {}/{}@{}: {} {} '{}'",
            owner,
            repo,
            sha,
            request.context,
            request.state,
            request.description
        );
        return Ok(());
    }

    match client.set_commit_status(owner, repo, sha, &request).await {
        Ok(()) => {
            log::info!(
                "Repo status {}/{}@{}: {} {} '{}'",
                owner,
                repo,
                sha,
                request.context,
                request.state,
                request.description
            );
            Ok(())
        }
        Err(e) => {
            log::error!(
                "Failed to create repo status {}/{}@{}: {} {} '{}': {}",
                owner,
                repo,
                sha,
                request.context,
                request.state,
                request.description,
                e
            );
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeGitHub;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_context() {
        assert_eq!(status_context(""), "argo-diff");
        assert_eq!(status_context(" prod "), "argo-diff/prod");
    }

    #[test]
    fn test_long_description_is_truncated() {
        let request = status_request(CommitState::Failure, &"x".repeat(200), "");
        assert_eq!(request.description.chars().count(), 140);
        assert!(request.description.ends_with("..."));
    }

    #[tokio::test]
    async fn test_set_status() {
        let github = FakeGitHub::new();
        let config = Config::default();
        set_status(&github, &config, "acme", "deployments", "abc123", CommitState::Pending, "")
            .await
            .unwrap();
        let statuses = github.statuses();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].0, "abc123");
        assert_eq!(statuses[0].1.state, CommitState::Pending);
    }

    #[tokio::test]
    async fn test_automation_and_dry_run_skip_api() {
        let github = FakeGitHub::new();
        let automation = Config {
            automation_mode: true,
            ..Default::default()
        };
        let dev = Config {
            dev_mode: true,
            ..Default::default()
        };
        for config in [automation, dev] {
            set_status(&github, &config, "acme", "deployments", "abc123", CommitState::Success, "ok")
                .await
                .unwrap();
        }
        assert!(github.statuses().is_empty());
    }
}
