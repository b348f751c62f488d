use std::time::Duration;

use anyhow::{anyhow, Result};
use argodiff_defs::{ChangeEvent, CommitState};
use gitops::{process_code_change, set_status, ProcessContext, ProcessOutcome};
use tokio_util::task::TaskTracker;

/// Deadline for the error status sent after a worker ran out of time.
const TIMEOUT_REPORT_DEADLINE: Duration = Duration::from_secs(15);

/// Runs one worker per accepted event and tracks them until shutdown.
#[derive(Clone)]
pub struct Dispatcher {
    ctx: ProcessContext,
    tracker: TaskTracker,
    worker_timeout: Duration,
}

impl Dispatcher {
    pub fn new(ctx: ProcessContext) -> Self {
        let worker_timeout = ctx.config.worker_timeout;
        Dispatcher {
            ctx,
            tracker: TaskTracker::new(),
            worker_timeout,
        }
    }

    pub fn dispatch(&self, event: ChangeEvent) {
        let ctx = self.ctx.clone();
        let worker_timeout = self.worker_timeout;
        self.tracker.spawn(async move {
            if let Err(e) = run_worker(&ctx, event, worker_timeout).await {
                log::error!("Processing event failed: {:#}", e);
            }
        });
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stops accepting work and waits for every in-flight worker to finish.
    pub async fn drain(&self) {
        self.tracker.close();
        log::info!("Waiting for {} in-flight workers", self.tracker.len());
        self.tracker.wait().await;
    }
}

/// Processes one event within `worker_timeout`. On timeout an error status is
/// reported with a short fresh deadline.
pub async fn run_worker(
    ctx: &ProcessContext,
    event: ChangeEvent,
    worker_timeout: Duration,
) -> Result<ProcessOutcome> {
    let owner = event.repo_owner.clone();
    let repo = event.repo_name.clone();
    let sha = event.commit_sha.clone();

    match tokio::time::timeout(worker_timeout, process_code_change(event, ctx)).await {
        Ok(result) => result,
        Err(_) => {
            let description = format!("timed out after {:?}", worker_timeout);
            log::error!("Processing {}/{}@{} {}", owner, repo, sha, description);
            if !sha.is_empty() {
                let report = set_status(
                    ctx.github.as_ref(),
                    &ctx.config,
                    &owner,
                    &repo,
                    &sha,
                    CommitState::Error,
                    &description,
                );
                if tokio::time::timeout(TIMEOUT_REPORT_DEADLINE, report).await.is_err() {
                    log::warn!("Reporting the timeout for {}/{}@{} also timed out", owner, repo, sha);
                }
            }
            Err(anyhow!("Processing {}/{}@{} {}", owner, repo, sha, description))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use argodiff_defs::Config;
    use gitops::fakes::{FakeGitHub, FakePlatform};
    use gitops::CommentIdentity;
    use pretty_assertions::assert_eq;

    fn push_event() -> ChangeEvent {
        ChangeEvent {
            repo_owner: "acme".to_string(),
            repo_name: "deployments".to_string(),
            repo_default_ref: "main".to_string(),
            commit_sha: "0123456789abcdef0123456789abcdef01234567".to_string(),
            change_ref: "refs/heads/dev".to_string(),
            pr_number: -1,
            ..Default::default()
        }
    }

    fn context(github: Arc<FakeGitHub>, platform: FakePlatform) -> ProcessContext {
        ProcessContext {
            config: Arc::new(Config::default()),
            platform: Arc::new(platform),
            github,
            identity: Arc::new(CommentIdentity::new()),
        }
    }

    #[tokio::test]
    async fn test_drain_waits_for_workers() {
        let github = Arc::new(FakeGitHub::new());
        let dispatcher = Dispatcher::new(context(github.clone(), FakePlatform::new(vec![])));
        dispatcher.dispatch(push_event());
        dispatcher.dispatch(push_event());
        dispatcher.drain().await;

        assert_eq!(dispatcher.in_flight(), 0);
        // pending + error (empty inventory) per worker
        assert_eq!(github.statuses().len(), 4);
    }

    #[tokio::test]
    async fn test_timeout_reports_error_status() {
        let github = Arc::new(FakeGitHub::new());
        let platform = FakePlatform::new(vec![]).with_delay(Duration::from_secs(30));
        let ctx = context(github.clone(), platform);
        let result = run_worker(&ctx, push_event(), Duration::from_millis(50)).await;

        assert!(result.is_err());
        let statuses = github.statuses();
        let last = statuses.last().unwrap();
        assert_eq!(last.1.state, CommitState::Error);
        assert_eq!(last.1.description, "timed out after 50ms");
    }
}
