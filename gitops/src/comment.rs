use argodiff_defs::{ChangeEvent, Config, GitHubError, IssueComment};
use tokio::sync::RwLock;

use crate::github::GitHubClient;

pub const COMMENT_IDENTIFIER: &str = "<!-- comment produced by argo-diff -->";
pub const OUTDATED_BODY: &str = "[Outdated argo-diff content]";

/// Invisible marker appended to every comment this instance writes.
pub fn comment_marker(config: &Config, change_ref: &str) -> String {
    let mut marker = COMMENT_IDENTIFIER.to_string();
    if !config.context_str.is_empty() {
        marker.push_str(&format!("\n<!-- argo-diff context: {} -->", config.context_str));
    }
    if config.ci_mode && !change_ref.is_empty() {
        marker.push_str(&format!("\n<!-- argo-diff ref: {} -->", change_ref));
    }
    marker
}

fn with_marker(body: &str, marker: &str) -> String {
    format!("{}\n\n{}\n", body, marker)
}

/// Login our comments are attributed to, resolved once and shared by all workers.
#[derive(Default)]
pub struct CommentIdentity {
    login: RwLock<Option<String>>,
}

impl CommentIdentity {
    pub fn new() -> Self {
        CommentIdentity::default()
    }

    pub fn with_login(login: &str) -> Self {
        CommentIdentity {
            login: RwLock::new(Some(login.to_string())),
        }
    }

    pub async fn resolve(&self, client: &dyn GitHubClient) -> Result<String, GitHubError> {
        if let Some(login) = self.login.read().await.as_ref() {
            return Ok(login.clone());
        }
        let mut guard = self.login.write().await;
        if let Some(login) = guard.as_ref() {
            return Ok(login.clone());
        }
        log::debug!("Calling Github API to determine comment user");
        let login = client.identity().await?;
        log::info!("Github comment user name: {}", login);
        *guard = Some(login.clone());
        Ok(login)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommentSummary {
    pub edited: usize,
    pub created: usize,
    pub outdated: usize,
    /// The pull request moved past the event's commit.
    pub skipped: bool,
}

/// True when `sha` is still the head of the pull request. Lookup failures assume it is.
pub async fn is_pr_head(
    client: &dyn GitHubClient,
    owner: &str,
    repo: &str,
    pr_number: i64,
    sha: &str,
) -> bool {
    match client.get_pull_request(owner, repo, pr_number).await {
        Ok(pr) => {
            if pr.head.sha.is_empty() {
                log::warn!(
                    "{}/{}#{} has no head sha - assuming {} is not HEAD",
                    owner,
                    repo,
                    pr_number,
                    sha
                );
                return false;
            }
            pr.head.sha == sha
        }
        Err(e) => {
            log::warn!(
                "Fetching {}/{}#{} failed ({}) - assuming {} is HEAD",
                owner,
                repo,
                pr_number,
                e,
                sha
            );
            true
        }
    }
}

async fn existing_comments(
    client: &dyn GitHubClient,
    identity: &CommentIdentity,
    config: &Config,
    event: &ChangeEvent,
    marker: &str,
) -> Result<Vec<IssueComment>, GitHubError> {
    let login = if config.automation_mode {
        None
    } else {
        Some(identity.resolve(client).await?)
    };
    let comments = client
        .list_issue_comments(&event.repo_owner, &event.repo_name, event.pr_number)
        .await?;
    log::debug!(
        "Checking {} comments in {}/{}#{}",
        comments.len(),
        event.repo_owner,
        event.repo_name,
        event.pr_number
    );
    Ok(comments
        .into_iter()
        .filter(|c| login.as_deref().map_or(true, |login| c.user.login == login))
        .filter(|c| c.body.trim_end().ends_with(marker))
        .collect())
}

/// Makes the pull request's tool comments match `pages`.
///
/// Existing comments are edited in creation order, extra pages are posted as
/// new comments and leftover comments are replaced with an outdated notice.
/// An empty `pages` retires every existing comment.
pub async fn reconcile_comments(
    client: &dyn GitHubClient,
    identity: &CommentIdentity,
    config: &Config,
    event: &ChangeEvent,
    pages: &[String],
) -> Result<CommentSummary, GitHubError> {
    let owner = event.repo_owner.as_str();
    let repo = event.repo_name.as_str();
    let pr_number = event.pr_number;
    let mut summary = CommentSummary::default();

    if !is_pr_head(client, owner, repo, pr_number, &event.commit_sha).await {
        log::info!(
            "{} is not HEAD for {}/{}#{} - skipping comment",
            event.commit_sha,
            owner,
            repo,
            pr_number
        );
        summary.skipped = true;
        return Ok(summary);
    }

    let marker = comment_marker(config, &event.change_ref);
    let existing = existing_comments(client, identity, config, event, &marker).await?;

    for (i, page) in pages.iter().enumerate() {
        let body = with_marker(page, &marker);
        match existing.get(i) {
            Some(comment) => {
                if let Err(e) = client.edit_comment(owner, repo, comment.id, &body).await {
                    log::error!(
                        "Failed to update comment {} for {}/{}#{}: {}",
                        comment.id,
                        owner,
                        repo,
                        pr_number,
                        e
                    );
                    return Err(e);
                }
                log::info!("Updated comment {} in {}/{}#{}", comment.id, owner, repo, pr_number);
                summary.edited += 1;
            }
            None => {
                let created = match client.create_comment(owner, repo, pr_number, &body).await {
                    Ok(created) => created,
                    Err(e) => {
                        log::error!("Failed to create comment for {}/{}#{}: {}", owner, repo, pr_number, e);
                        return Err(e);
                    }
                };
                log::info!("Created comment {} in {}/{}#{}", created.id, owner, repo, pr_number);
                summary.created += 1;
            }
        }
    }

    let outdated_body = with_marker(OUTDATED_BODY, &marker);
    for comment in existing.iter().skip(pages.len()) {
        if comment.body == outdated_body {
            continue;
        }
        match client.edit_comment(owner, repo, comment.id, &outdated_body).await {
            Ok(()) => summary.outdated += 1,
            Err(e) => log::error!(
                "Failed to mark comment {} outdated for {}/{}#{}: {}",
                comment.id,
                owner,
                repo,
                pr_number,
                e
            ),
        }
    }

    Ok(summary)
}
