use argodiff_defs::{
    ChangeEvent, EventError, IssueCommentEvent, PullRequestEvent, PushEvent, Repository,
};

const BRANCH_REF_PREFIX: &str = "refs/heads/";
const PULL_REQUEST_ACTIONS: &[&str] = &["opened", "synchronize"];
const REFRESH_PHRASES: &[&str] = &["argo-diff", "argo diff", "argodiff", "argo-diff refresh"];

fn base_event(repository: &Repository) -> ChangeEvent {
    ChangeEvent {
        repo_owner: repository.owner.login.clone(),
        repo_name: repository.name.clone(),
        repo_default_ref: repository.default_branch.clone(),
        ..Default::default()
    }
}

fn ignored(repository: &Repository, pr_number: i64) -> ChangeEvent {
    ChangeEvent {
        repo_owner: repository.owner.login.clone(),
        repo_name: repository.name.clone(),
        pr_number,
        ..ChangeEvent::ignored()
    }
}

pub fn normalize_pull_request(body: &[u8]) -> Result<ChangeEvent, EventError> {
    let payload: PullRequestEvent = serde_json::from_slice(body)?;

    if !PULL_REQUEST_ACTIONS.contains(&payload.action.as_str()) {
        log::debug!(
            "Ignoring pull request #{} action {}",
            payload.number,
            payload.action
        );
        return Ok(ignored(&payload.repository, payload.number));
    }

    let event = ChangeEvent {
        commit_sha: payload.pull_request.head.sha.clone(),
        change_ref: payload.pull_request.head.ref_name.clone(),
        base_ref: payload.pull_request.base.ref_name.clone(),
        pr_number: payload.number,
        ..base_event(&payload.repository)
    };
    event.validate()?;
    Ok(event)
}

/// Folds the files touched by all pushed commits, keeping first-seen order.
pub fn push_changed_files(payload: &PushEvent) -> Vec<String> {
    let mut files: Vec<String> = vec![];
    for commit in &payload.commits {
        for file in commit
            .added
            .iter()
            .chain(&commit.modified)
            .chain(&commit.removed)
        {
            if !files.contains(file) {
                files.push(file.clone());
            }
        }
    }
    files
}

pub fn normalize_push(body: &[u8]) -> Result<ChangeEvent, EventError> {
    let payload: PushEvent = serde_json::from_slice(body)?;

    let head_commit = match &payload.head_commit {
        Some(commit) => commit,
        None => {
            log::debug!("Ignoring push to {} without a head commit", payload.ref_name);
            return Ok(ignored(&payload.repository, -1));
        }
    };
    if !payload.ref_name.starts_with(BRANCH_REF_PREFIX) {
        log::debug!("Ignoring push to non-branch ref {}", payload.ref_name);
        return Ok(ignored(&payload.repository, -1));
    }

    let event = ChangeEvent {
        commit_sha: head_commit.id.clone(),
        change_ref: payload.ref_name.clone(),
        pr_number: -1,
        changed_files: push_changed_files(&payload),
        ..base_event(&payload.repository)
    };
    event.validate()?;
    Ok(event)
}

/// True if the comment asks for a re-run: a bare trigger phrase, or a trigger
/// phrase followed by this instance's context.
pub fn is_refresh_request(body: &str, context_str: &str) -> bool {
    let normalized = body.trim().to_lowercase();
    let context = context_str.trim().to_lowercase();
    REFRESH_PHRASES.iter().any(|phrase| {
        if normalized == *phrase {
            return true;
        }
        !context.is_empty() && normalized == format!("{} {}", phrase, context)
    })
}

pub fn normalize_issue_comment(body: &[u8], context_str: &str) -> Result<ChangeEvent, EventError> {
    let payload: IssueCommentEvent = serde_json::from_slice(body)?;
    let number = payload.issue.number;

    if payload.action != "created" {
        log::debug!("Ignoring comment action {} on #{}", payload.action, number);
        return Ok(ignored(&payload.repository, number));
    }
    if payload.issue.pull_request.is_none() {
        log::debug!("Ignoring comment on issue #{}, not a pull request", number);
        return Ok(ignored(&payload.repository, number));
    }
    if !is_refresh_request(&payload.comment.body, context_str) {
        log::debug!("Ignoring comment on #{}, no refresh trigger", number);
        return Ok(ignored(&payload.repository, number));
    }

    let event = ChangeEvent {
        pr_number: number,
        refresh: true,
        ..base_event(&payload.repository)
    };
    event.validate()?;
    Ok(event)
}
