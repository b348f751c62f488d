#![allow(dead_code)]

use std::sync::Arc;

use argocd::DiffOutcome;
use argodiff_defs::{
    AppResource, Application, ApplicationSource, ChangeEvent, Config, ResourceKey, SyncPolicy,
    SyncPolicyAutomated,
};
use gitops::fakes::{FakeGitHub, FakePlatform};
use gitops::{CommentIdentity, ProcessContext};

pub const OWNER: &str = "acme";
pub const REPO: &str = "deployments";
pub const SHA: &str = "0123456789abcdef0123456789abcdef01234567";

pub fn application(name: &str, target_revision: &str) -> Application {
    let mut app = Application::default();
    app.metadata.name = name.to_string();
    app.metadata.namespace = "argocd".to_string();
    app.spec.source = Some(ApplicationSource {
        repo_url: format!("https://github.com/{}/{}.git", OWNER, REPO),
        target_revision: target_revision.to_string(),
        path: format!("apps/{}", name),
        ..Default::default()
    });
    app.status.sync.status = "Synced".to_string();
    app.status.health.status = "Healthy".to_string();
    app
}

pub fn auto_synced(mut app: Application) -> Application {
    app.spec.sync_policy = Some(SyncPolicy {
        automated: Some(SyncPolicyAutomated {
            prune: true,
            self_heal: true,
        }),
    });
    app
}

pub fn push_event(change_ref: &str) -> ChangeEvent {
    ChangeEvent {
        repo_owner: OWNER.to_string(),
        repo_name: REPO.to_string(),
        repo_default_ref: "main".to_string(),
        commit_sha: SHA.to_string(),
        change_ref: change_ref.to_string(),
        pr_number: -1,
        ..Default::default()
    }
}

pub fn pr_event(pr_number: i64, head_ref: &str, base_ref: &str) -> ChangeEvent {
    ChangeEvent {
        repo_owner: OWNER.to_string(),
        repo_name: REPO.to_string(),
        repo_default_ref: "main".to_string(),
        commit_sha: SHA.to_string(),
        change_ref: head_ref.to_string(),
        base_ref: base_ref.to_string(),
        pr_number,
        ..Default::default()
    }
}

/// A CLI-style diff result with one rendered diff per named Deployment.
pub fn rendered_changes(names: &[&str]) -> DiffOutcome {
    DiffOutcome {
        changed: names
            .iter()
            .map(|name| {
                AppResource::rendered(
                    ResourceKey::new("apps", "Deployment", "web", name),
                    "@@ -1 +1 @@\n-  replicas: 1\n+  replicas: 2\n",
                )
            })
            .collect(),
        total_resource_count: names.len() + 3,
    }
}

pub fn context(
    config: Config,
    github: Arc<FakeGitHub>,
    platform: Arc<FakePlatform>,
) -> ProcessContext {
    ProcessContext {
        config: Arc::new(config),
        platform,
        github,
        identity: Arc::new(CommentIdentity::new()),
    }
}
