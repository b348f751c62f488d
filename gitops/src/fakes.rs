//! In-memory stand-ins for GitHub and the deployment platform, used by unit
//! tests and by the `integration-tests` crate through the `test-mode` feature.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use argocd::{DiffOutcome, DiffTarget, ManagedResource, PlatformClient, PlatformVersion};
use argodiff_defs::{
    Application, CommitStatusRequest, GitHubError, GitRef, IssueComment, PlatformError,
    PullRequest, PullRequestFile, User,
};
use async_trait::async_trait;

use crate::github::GitHubClient;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Default)]
struct GitHubState {
    statuses: Vec<(String, CommitStatusRequest)>,
    pull_requests: HashMap<i64, PullRequest>,
    comments: Vec<(i64, IssueComment)>,
    files: HashMap<i64, Vec<PullRequestFile>>,
    next_comment_id: u64,
    created: usize,
    edited: usize,
    identity_calls: usize,
}

pub struct FakeGitHub {
    identity: String,
    state: Mutex<GitHubState>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        FakeGitHub::with_identity("argo-diff[bot]")
    }

    pub fn with_identity(identity: &str) -> Self {
        FakeGitHub {
            identity: identity.to_string(),
            state: Mutex::new(GitHubState {
                next_comment_id: 1,
                ..Default::default()
            }),
        }
    }

    pub fn identity_login(&self) -> &str {
        &self.identity
    }

    pub fn add_pull_request(&self, number: i64, head_sha: &str, head_ref: &str, base_ref: &str) {
        let pr = PullRequest {
            number,
            state: "open".to_string(),
            head: GitRef {
                ref_name: head_ref.to_string(),
                sha: head_sha.to_string(),
            },
            base: GitRef {
                ref_name: base_ref.to_string(),
                sha: String::new(),
            },
        };
        lock(&self.state).pull_requests.insert(number, pr);
    }

    pub fn set_files(&self, number: i64, files: &[&str]) {
        let files = files
            .iter()
            .map(|f| PullRequestFile {
                filename: f.to_string(),
                status: "modified".to_string(),
                previous_filename: None,
            })
            .collect();
        lock(&self.state).files.insert(number, files);
    }

    /// Seeds a comment as if it had been written by `login`.
    pub fn add_comment(&self, number: i64, login: &str, body: &str) -> u64 {
        let mut state = lock(&self.state);
        let id = state.next_comment_id;
        state.next_comment_id += 1;
        state.comments.push((
            number,
            IssueComment {
                id,
                body: body.to_string(),
                user: User {
                    login: login.to_string(),
                },
                created_at: format!("2024-01-01T00:00:{:02}Z", id % 60),
            },
        ));
        id
    }

    pub fn comments(&self, number: i64) -> Vec<IssueComment> {
        lock(&self.state)
            .comments
            .iter()
            .filter(|(n, _)| *n == number)
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn statuses(&self) -> Vec<(String, CommitStatusRequest)> {
        lock(&self.state).statuses.clone()
    }

    pub fn created_count(&self) -> usize {
        lock(&self.state).created
    }

    pub fn edited_count(&self) -> usize {
        lock(&self.state).edited
    }

    pub fn identity_calls(&self) -> usize {
        lock(&self.state).identity_calls
    }
}

impl Default for FakeGitHub {
    fn default() -> Self {
        FakeGitHub::new()
    }
}

fn not_found(endpoint: String) -> GitHubError {
    GitHubError::Status {
        endpoint,
        status: 404,
        body: "Not Found".to_string(),
    }
}

#[async_trait]
impl GitHubClient for FakeGitHub {
    async fn set_commit_status(
        &self,
        _owner: &str,
        _repo: &str,
        sha: &str,
        status: &CommitStatusRequest,
    ) -> Result<(), GitHubError> {
        lock(&self.state)
            .statuses
            .push((sha.to_string(), status.clone()));
        Ok(())
    }

    async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<PullRequest, GitHubError> {
        lock(&self.state)
            .pull_requests
            .get(&number)
            .cloned()
            .ok_or_else(|| not_found(format!("/repos/{}/{}/pulls/{}", owner, repo, number)))
    }

    async fn list_issue_comments(
        &self,
        _owner: &str,
        _repo: &str,
        number: i64,
    ) -> Result<Vec<IssueComment>, GitHubError> {
        Ok(self.comments(number))
    }

    async fn create_comment(
        &self,
        _owner: &str,
        _repo: &str,
        number: i64,
        body: &str,
    ) -> Result<IssueComment, GitHubError> {
        let identity = self.identity.clone();
        let id = self.add_comment(number, &identity, body);
        let mut state = lock(&self.state);
        state.created += 1;
        state
            .comments
            .iter()
            .find(|(_, c)| c.id == id)
            .map(|(_, c)| c.clone())
            .ok_or_else(|| not_found(format!("comment {}", id)))
    }

    async fn edit_comment(
        &self,
        owner: &str,
        repo: &str,
        comment_id: u64,
        body: &str,
    ) -> Result<(), GitHubError> {
        let mut state = lock(&self.state);
        let comment = state
            .comments
            .iter_mut()
            .find(|(_, c)| c.id == comment_id)
            .map(|(_, c)| c)
            .ok_or_else(|| {
                not_found(format!("/repos/{}/{}/issues/comments/{}", owner, repo, comment_id))
            })?;
        comment.body = body.to_string();
        state.edited += 1;
        Ok(())
    }

    async fn list_pull_request_files(
        &self,
        _owner: &str,
        _repo: &str,
        number: i64,
    ) -> Result<Vec<PullRequestFile>, GitHubError> {
        Ok(lock(&self.state)
            .files
            .get(&number)
            .cloned()
            .unwrap_or_default())
    }

    async fn identity(&self) -> Result<String, GitHubError> {
        lock(&self.state).identity_calls += 1;
        Ok(self.identity.clone())
    }
}

/// What the fake platform answers for one application's diff.
#[derive(Clone, Debug)]
pub enum FakeDiff {
    Changes(DiffOutcome),
    Fail(String),
}

#[derive(Default)]
pub struct FakePlatform {
    apps: Vec<Application>,
    diffs: HashMap<String, FakeDiff>,
    manifests: HashMap<String, Vec<String>>,
    delay: Option<Duration>,
    diff_calls: Mutex<Vec<(String, DiffTarget)>>,
}

impl FakePlatform {
    pub fn new(apps: Vec<Application>) -> Self {
        FakePlatform {
            apps,
            ..Default::default()
        }
    }

    pub fn with_diff(mut self, app: &str, diff: FakeDiff) -> Self {
        self.diffs.insert(app.to_string(), diff);
        self
    }

    pub fn with_manifests(mut self, app: &str, manifests: Vec<String>) -> Self {
        self.manifests.insert(app.to_string(), manifests);
        self
    }

    /// Makes listing applications take `delay`, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn diff_calls(&self) -> Vec<(String, DiffTarget)> {
        lock(&self.diff_calls).clone()
    }
}

#[async_trait]
impl PlatformClient for FakePlatform {
    async fn list_applications(&self) -> Result<Vec<Application>, PlatformError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.apps.clone())
    }

    async fn get_application(
        &self,
        name: &str,
        _namespace: &str,
    ) -> Result<Application, PlatformError> {
        self.apps
            .iter()
            .find(|app| app.name() == name)
            .cloned()
            .ok_or_else(|| PlatformError::InvalidRequest(format!("application {} not found", name)))
    }

    async fn get_managed_resources(
        &self,
        _name: &str,
        _namespace: &str,
    ) -> Result<Vec<ManagedResource>, PlatformError> {
        Ok(vec![])
    }

    async fn get_manifests(
        &self,
        name: &str,
        _namespace: &str,
        _revision: &str,
    ) -> Result<Vec<String>, PlatformError> {
        Ok(self.manifests.get(name).cloned().unwrap_or_default())
    }

    async fn diff_application(
        &self,
        name: &str,
        _namespace: &str,
        target: &DiffTarget,
    ) -> Result<DiffOutcome, PlatformError> {
        lock(&self.diff_calls).push((name.to_string(), target.clone()));
        match self.diffs.get(name) {
            Some(FakeDiff::Changes(outcome)) => Ok(outcome.clone()),
            Some(FakeDiff::Fail(stderr)) => Err(PlatformError::CommandFailed {
                command: format!("app diff {} --revision {}", name, target.describe()),
                code: 20,
                stderr: stderr.clone(),
            }),
            None => Ok(DiffOutcome::default()),
        }
    }

    async fn version(&self) -> Result<PlatformVersion, PlatformError> {
        Ok(PlatformVersion {
            client: Some("v2.13.0".to_string()),
            server: "v2.13.0".to_string(),
        })
    }
}
