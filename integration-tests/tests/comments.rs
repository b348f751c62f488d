mod utils;
use utils::*;

#[cfg(test)]
mod comment_tests {
    use super::*;
    use std::sync::Arc;

    use argocd::DiffOutcome;
    use argodiff_defs::{AppResource, Config, ResourceKey};
    use gitops::fakes::{FakeDiff, FakeGitHub, FakePlatform};
    use gitops::{process_code_change, COMMENT_IDENTIFIER, OUTDATED_BODY};
    use pretty_assertions::assert_eq;

    fn platform_with(outcome: DiffOutcome) -> Arc<FakePlatform> {
        Arc::new(
            FakePlatform::new(vec![application("web", "main")])
                .with_diff("web", FakeDiff::Changes(outcome)),
        )
    }

    fn platform_with_changes(count: usize) -> Arc<FakePlatform> {
        let names: Vec<String> = (0..count).map(|i| format!("deploy-{:03}", i)).collect();
        let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        platform_with(rendered_changes(&refs))
    }

    /// ConfigMaps with ~100k character diffs, a couple fit on one comment page.
    fn large_changes(count: usize) -> DiffOutcome {
        let diff: String = (0..5000).map(|i| format!("+  key{:05}: value\n", i)).collect();
        DiffOutcome {
            changed: (0..count)
                .map(|i| {
                    AppResource::rendered(
                        ResourceKey::new("", "ConfigMap", "web", &format!("settings-{}", i)),
                        &diff,
                    )
                })
                .collect(),
            total_resource_count: count,
        }
    }

    #[tokio::test]
    async fn test_rerun_edits_in_place() {
        let github = Arc::new(FakeGitHub::new());
        github.add_pull_request(9, SHA, "feature", "main");
        let ctx = context(Config::default(), github.clone(), platform_with_changes(2));

        let first = process_code_change(pr_event(9, "feature", "main"), &ctx)
            .await
            .unwrap();
        assert_eq!(first.comment.unwrap().created, 1);

        let second = process_code_change(pr_event(9, "feature", "main"), &ctx)
            .await
            .unwrap();
        let summary = second.comment.unwrap();
        assert_eq!(summary.created, 0);
        assert_eq!(summary.edited, 1);

        let comments = github.comments(9);
        assert_eq!(comments.len(), 1);
        assert!(comments[0].body.contains(COMMENT_IDENTIFIER));
        assert_eq!(github.created_count(), 1);
        assert_eq!(github.identity_calls(), 1);
    }

    #[tokio::test]
    async fn test_shrinking_diff_marks_extra_pages_outdated() {
        let github = Arc::new(FakeGitHub::new());
        github.add_pull_request(10, SHA, "feature", "main");

        let large = context(Config::default(), github.clone(), platform_with(large_changes(5)));
        let outcome = process_code_change(pr_event(10, "feature", "main"), &large)
            .await
            .unwrap();
        let pages = outcome.pages.len();
        assert!(pages > 1);
        assert_eq!(github.comments(10).len(), pages);

        let small = context(Config::default(), github.clone(), platform_with_changes(1));
        let outcome = process_code_change(pr_event(10, "feature", "main"), &small)
            .await
            .unwrap();
        assert_eq!(outcome.pages.len(), 1);
        let summary = outcome.comment.unwrap();
        assert_eq!(summary.created, 0);
        assert_eq!(summary.outdated, pages - 1);

        let comments = github.comments(10);
        assert_eq!(comments.len(), pages);
        assert!(comments[0].body.contains("deploy-000"));
        for comment in &comments[1..] {
            assert!(comment.body.starts_with(OUTDATED_BODY));
        }
    }

    #[tokio::test]
    async fn test_stale_head_is_not_commented() {
        let github = Arc::new(FakeGitHub::new());
        // the pull request moved on to another commit
        github.add_pull_request(11, "fedcba9876543210fedcba9876543210fedcba98", "feature", "main");
        let ctx = context(Config::default(), github.clone(), platform_with_changes(1));

        let outcome = process_code_change(pr_event(11, "feature", "main"), &ctx)
            .await
            .unwrap();
        assert_eq!(outcome.pages.len(), 1);
        assert!(outcome.comment.unwrap().skipped);
        assert!(github.comments(11).is_empty());
    }
}
