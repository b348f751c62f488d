use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Repository {
    pub owner: Owner,
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub default_branch: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Owner {
    pub login: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct User {
    #[serde(default)]
    pub login: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct GitRef {
    #[serde(rename = "ref", default)]
    pub ref_name: String,
    #[serde(default)]
    pub sha: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PullRequest {
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub head: GitRef,
    #[serde(default)]
    pub base: GitRef,
}

/// `pull_request` webhook payload.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PullRequestEvent {
    pub action: String,
    pub number: i64,
    pub pull_request: PullRequest,
    pub repository: Repository,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct HeadCommit {
    pub id: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct PushCommit {
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub modified: Vec<String>,
}

/// `push` webhook payload. `head_commit` is null for branch deletions.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub before: String,
    pub after: String,
    #[serde(default)]
    pub head_commit: Option<HeadCommit>,
    #[serde(default)]
    pub commits: Vec<PushCommit>,
    pub repository: Repository,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Issue {
    pub number: i64,
    /// Present only when the issue is a pull request.
    #[serde(default)]
    pub pull_request: Option<Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct IssueComment {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub user: User,
    #[serde(default)]
    pub created_at: String,
}

/// `issue_comment` webhook payload.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct IssueCommentEvent {
    pub action: String,
    pub issue: Issue,
    pub comment: IssueComment,
    pub repository: Repository,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PullRequestFile {
    pub filename: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub previous_filename: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AppInfo {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    Pending,
    Success,
    Failure,
    Error,
}

impl CommitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitState::Pending => "pending",
            CommitState::Success => "success",
            CommitState::Failure => "failure",
            CommitState::Error => "error",
        }
    }
}

impl fmt::Display for CommitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommitState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CommitState::Pending),
            "success" => Ok(CommitState::Success),
            "failure" => Ok(CommitState::Failure),
            "error" => Ok(CommitState::Error),
            other => Err(format!("invalid commit state: {}", other)),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CommitStatusRequest {
    pub state: CommitState,
    pub description: String,
    pub context: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_commit_state_from_str() {
        assert_eq!("failure".parse::<CommitState>(), Ok(CommitState::Failure));
        assert_eq!(CommitState::Pending.to_string(), "pending");
        assert!("done".parse::<CommitState>().is_err());
    }

    #[test]
    fn test_commit_status_request_serialization() {
        let request = CommitStatusRequest {
            state: CommitState::Success,
            description: "ok".to_string(),
            context: "argo-diff".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["state"], "success");
    }

    #[test]
    fn test_push_event_branch_deletion() {
        let payload = r#"{
            "ref": "refs/heads/feature",
            "before": "aaa",
            "after": "0000000000000000000000000000000000000000",
            "head_commit": null,
            "repository": {"owner": {"login": "acme"}, "name": "deployments", "default_branch": "main"}
        }"#;
        let event: PushEvent = serde_json::from_str(payload).unwrap();
        assert!(event.head_commit.is_none());
        assert!(event.commits.is_empty());
        assert_eq!(event.repository.default_branch, "main");
    }
}
