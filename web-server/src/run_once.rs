use std::io::Read;

use anyhow::{anyhow, bail, Context, Result};
use argodiff_defs::ChangeEvent;

/// Reads a change event from a JSON file, or from stdin when `path` is "-".
pub fn event_from_file(path: &str) -> Result<ChangeEvent> {
    let content = if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read change event from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?
    };
    let event: ChangeEvent = serde_json::from_str(&content)
        .with_context(|| format!("Failed to decode change event from {}", path))?;
    event.validate().context("Invalid change event")?;
    Ok(event)
}

/// Builds a refresh event for the pull request a CI job runs on.
pub fn event_from_env<F>(lookup: F) -> Result<ChangeEvent>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).unwrap_or_default();

    let event_name = get("GITHUB_EVENT_NAME");
    if event_name != "pull_request" {
        bail!(
            "unexpected value for GITHUB_EVENT_NAME: {} (expecting pull_request)",
            event_name
        );
    }

    // refs/pull/<n>/merge
    let pr_ref = get("GITHUB_REF");
    let pr_number = pr_ref
        .split('/')
        .nth(2)
        .and_then(|n| n.parse::<i64>().ok())
        .filter(|n| *n > 0)
        .ok_or_else(|| anyhow!("failed to extract pull request number from GITHUB_REF {}", pr_ref))?;

    let repository = get("GITHUB_REPOSITORY");
    let (owner, repo) = repository
        .split_once('/')
        .ok_or_else(|| anyhow!("GITHUB_REPOSITORY {} is not owner/name", repository))?;

    let event = ChangeEvent {
        repo_owner: owner.to_string(),
        repo_name: repo.to_string(),
        repo_default_ref: get("REPO_DEFAULT_REF"),
        pr_number,
        change_ref: get("GITHUB_HEAD_REF"),
        base_ref: get("GITHUB_BASE_REF"),
        refresh: true,
        ..Default::default()
    };
    event.validate().context("Incomplete CI environment")?;
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn ci_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("GITHUB_EVENT_NAME", "pull_request"),
            ("GITHUB_REF", "refs/pull/42/merge"),
            ("GITHUB_REPOSITORY", "acme/deployments"),
            ("REPO_DEFAULT_REF", "main"),
            ("GITHUB_HEAD_REF", "feature"),
            ("GITHUB_BASE_REF", "main"),
        ]
    }

    #[test]
    fn test_event_from_env() {
        let event = event_from_env(lookup(&ci_vars())).unwrap();
        assert_eq!(event.pr_number, 42);
        assert_eq!(event.repo_owner, "acme");
        assert_eq!(event.repo_name, "deployments");
        assert_eq!(event.change_ref, "feature");
        assert!(event.refresh);
    }

    #[test]
    fn test_event_from_env_rejects_other_events() {
        let mut vars = ci_vars();
        vars[0] = ("GITHUB_EVENT_NAME", "push");
        assert!(event_from_env(lookup(&vars)).is_err());

        let mut vars = ci_vars();
        vars[1] = ("GITHUB_REF", "refs/heads/main");
        assert!(event_from_env(lookup(&vars)).is_err());
    }

    #[test]
    fn test_event_from_file() {
        let path = std::env::temp_dir().join(format!("argo-diff-event-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"repoOwner":"acme","repoName":"deployments","repoDefaultRef":"main","commitSha":"abc","changeRef":"refs/heads/dev"}"#,
        )
        .unwrap();
        let event = event_from_file(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(event.commit_sha, "abc");
        assert_eq!(event.pr_number, 0);
    }
}
