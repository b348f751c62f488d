use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use argocd::{get_application_changes, PlatformClient};
use argodiff_defs::{ChangeEvent, CommitState, Config};
use argodiff_utils::get_display_timestamp;

use crate::aggregate::DiffAggregator;
use crate::comment::{reconcile_comments, CommentIdentity, CommentSummary};
use crate::github::GitHubClient;
use crate::status::set_status;

/// Everything a worker needs. Shared read-only between workers.
#[derive(Clone)]
pub struct ProcessContext {
    pub config: Arc<Config>,
    pub platform: Arc<dyn PlatformClient>,
    pub github: Arc<dyn GitHubClient>,
    pub identity: Arc<CommentIdentity>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProcessOutcome {
    pub state: CommitState,
    pub description: String,
    pub pages: Vec<String>,
    /// Set when a pull request comment was reconciled.
    pub comment: Option<CommentSummary>,
}

/// Fills sha and refs of a refresh request from the pull request's current state.
pub async fn resolve_refresh(github: &dyn GitHubClient, event: &mut ChangeEvent) -> Result<()> {
    if !event.refresh {
        return Ok(());
    }
    if !event.is_pull_request() {
        return Err(anyhow!("refresh requested without a pull request number"));
    }
    let pr = github
        .get_pull_request(&event.repo_owner, &event.repo_name, event.pr_number)
        .await
        .with_context(|| {
            format!(
                "Unable to fetch pull request {}/{}#{}",
                event.repo_owner, event.repo_name, event.pr_number
            )
        })?;
    log::info!(
        "Refreshing {}/{}#{} at {} ({} -> {})",
        event.repo_owner,
        event.repo_name,
        event.pr_number,
        pr.head.sha,
        pr.head.ref_name,
        pr.base.ref_name
    );
    event.commit_sha = pr.head.sha;
    event.change_ref = pr.head.ref_name;
    event.base_ref = pr.base.ref_name;
    Ok(())
}

async fn fill_changed_files(github: &dyn GitHubClient, event: &mut ChangeEvent) {
    if !event.is_pull_request() || !event.changed_files.is_empty() {
        return;
    }
    match github
        .list_pull_request_files(&event.repo_owner, &event.repo_name, event.pr_number)
        .await
    {
        Ok(files) => {
            event.changed_files = files.into_iter().map(|f| f.filename).collect();
            log::debug!("{} files changed in pull request", event.changed_files.len());
        }
        Err(e) => log::warn!(
            "Unable to list files of {}/{}#{}, skipping path filtering: {}",
            event.repo_owner,
            event.repo_name,
            event.pr_number,
            e
        ),
    }
}

/// Diffs every application implicated by `event` and reports the commit status.
/// The comment pages are always composed but only posted for pull requests.
pub async fn process_code_change(mut event: ChangeEvent, ctx: &ProcessContext) -> Result<ProcessOutcome> {
    let config = ctx.config.as_ref();
    let github = ctx.github.as_ref();

    resolve_refresh(github, &mut event).await?;
    event.validate().context("Invalid change event")?;
    fill_changed_files(github, &mut event).await;

    let owner = event.repo_owner.clone();
    let repo = event.repo_name.clone();
    let sha = event.commit_sha.clone();

    let _ = set_status(github, config, &owner, &repo, &sha, CommitState::Pending, "").await;

    let results = match get_application_changes(ctx.platform.as_ref(), &event).await {
        Ok(results) => results,
        Err(e) => {
            log::error!("get_application_changes() failed: {}", e);
            let _ = set_status(github, config, &owner, &repo, &sha, CommitState::Error, &e.to_string()).await;
            return Err(e).context(format!("Unable to compute changes for {}/{}@{}", owner, repo, sha));
        }
    };
    log::trace!("get_application_changes() returned {} results", results.len());

    let mut aggregator = DiffAggregator::new(config, event.short_sha());
    for result in &results {
        aggregator.add(result);
    }
    let (state, description) = aggregator.status();
    let _ = set_status(github, config, &owner, &repo, &sha, state, &description).await;

    let pages = if aggregator.has_comment_content() {
        aggregator.comment_pages(&get_display_timestamp())
    } else {
        vec![]
    };
    let mut outcome = ProcessOutcome {
        state,
        description,
        pages,
        comment: None,
    };
    if !event.is_pull_request() {
        return Ok(outcome);
    }

    match reconcile_comments(github, ctx.identity.as_ref(), config, &event, &outcome.pages).await {
        Ok(summary) => outcome.comment = Some(summary),
        Err(e) => log::error!("Commenting on {}/{}#{} failed: {}", owner, repo, event.pr_number, e),
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeGitHub, FakePlatform};
    use argodiff_defs::{Application, ApplicationSource};
    use pretty_assertions::assert_eq;

    const SHA: &str = "0123456789abcdef0123456789abcdef01234567";

    fn app(name: &str, revision: &str) -> Application {
        let mut app = Application::default();
        app.metadata.name = name.to_string();
        app.spec.source = Some(ApplicationSource {
            repo_url: "https://github.com/acme/deployments.git".to_string(),
            target_revision: revision.to_string(),
            path: format!("apps/{}", name),
            ..Default::default()
        });
        app
    }

    fn context(github: Arc<FakeGitHub>, platform: FakePlatform) -> ProcessContext {
        ProcessContext {
            config: Arc::new(Config::default()),
            platform: Arc::new(platform),
            github,
            identity: Arc::new(CommentIdentity::new()),
        }
    }

    fn pr_event() -> ChangeEvent {
        ChangeEvent {
            repo_owner: "acme".to_string(),
            repo_name: "deployments".to_string(),
            repo_default_ref: "main".to_string(),
            pr_number: 12,
            refresh: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_refresh_resolves_from_pull_request() {
        let github = Arc::new(FakeGitHub::new());
        github.add_pull_request(12, SHA, "feature", "main");
        let mut event = pr_event();
        resolve_refresh(github.as_ref(), &mut event).await.unwrap();
        assert_eq!(event.commit_sha, SHA);
        assert_eq!(event.change_ref, "feature");
        assert_eq!(event.base_ref, "main");
    }

    #[tokio::test]
    async fn test_refresh_of_unknown_pull_request_fails() {
        let github = Arc::new(FakeGitHub::new());
        let ctx = context(github.clone(), FakePlatform::new(vec![app("web", "main")]));
        assert!(process_code_change(pr_event(), &ctx).await.is_err());
        assert!(github.statuses().is_empty());
    }

    #[tokio::test]
    async fn test_empty_inventory_sets_error_status() {
        let github = Arc::new(FakeGitHub::new());
        github.add_pull_request(12, SHA, "feature", "main");
        let ctx = context(github.clone(), FakePlatform::new(vec![]));

        assert!(process_code_change(pr_event(), &ctx).await.is_err());
        let statuses = github.statuses();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].1.state, CommitState::Pending);
        assert_eq!(statuses[1].1.state, CommitState::Error);
        assert_eq!(statuses[1].0, SHA);
    }

    #[tokio::test]
    async fn test_no_changes_retires_comments() {
        let github = Arc::new(FakeGitHub::new());
        github.add_pull_request(12, SHA, "feature", "main");
        github.set_files(12, &["apps/web/deployment.yaml"]);
        github.add_comment(
            12,
            "argo-diff[bot]",
            "old diff\n\n<!-- comment produced by argo-diff -->\n",
        );
        let ctx = context(github.clone(), FakePlatform::new(vec![app("web", "main")]));

        let outcome = process_code_change(pr_event(), &ctx).await.unwrap();
        assert_eq!(outcome.state, CommitState::Success);
        assert!(outcome.pages.is_empty());
        assert_eq!(outcome.comment.unwrap().outdated, 1);
        assert!(github.comments(12)[0]
            .body
            .starts_with("[Outdated argo-diff content]"));
    }
}
