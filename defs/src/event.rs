use serde::{Deserialize, Serialize};

use crate::errors::EventError;

/// Canonical representation of "something changed in a repository".
///
/// Built by the webhook normalizer from provider payloads, or deserialized
/// directly from JSON by the dev endpoint and the run-once modes.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangeEvent {
    pub ignore: bool,
    pub repo_owner: String,
    pub repo_name: String,
    pub repo_default_ref: String,
    pub commit_sha: String,
    pub change_ref: String,
    /// Target branch of a pull request. Empty for push events.
    pub base_ref: String,
    /// Values <= 0 mean the event is not tied to a pull request.
    pub pr_number: i64,
    /// When true, sha / change ref / base ref are re-resolved from the live pull request.
    pub refresh: bool,
    pub changed_files: Vec<String>,
}

impl ChangeEvent {
    /// An event that carries no actionable change.
    pub fn ignored() -> Self {
        ChangeEvent {
            ignore: true,
            pr_number: -1,
            ..Default::default()
        }
    }

    pub fn is_pull_request(&self) -> bool {
        self.pr_number > 0
    }

    pub fn is_push(&self) -> bool {
        self.base_ref.is_empty()
    }

    /// First seven characters of the commit sha.
    pub fn short_sha(&self) -> &str {
        match self.commit_sha.char_indices().nth(7) {
            Some((idx, _)) => &self.commit_sha[..idx],
            None => &self.commit_sha,
        }
    }

    pub fn validate(&self) -> Result<(), EventError> {
        if self.repo_owner.is_empty() {
            return Err(EventError::MissingField("repo owner"));
        }
        if self.repo_name.is_empty() {
            return Err(EventError::MissingField("repo name"));
        }
        if self.repo_default_ref.is_empty() {
            return Err(EventError::MissingField("default ref"));
        }
        if self.refresh {
            return Ok(());
        }
        if self.commit_sha.is_empty() {
            return Err(EventError::MissingField("commit sha"));
        }
        if self.change_ref.is_empty() {
            return Err(EventError::MissingField("change ref"));
        }
        Ok(())
    }
}
