use argodiff_defs::{ApplicationDiffResult, CommitState, Config, ResourceDiff};
use argodiff_utils::unified_diff;

use crate::markdown::CommentMarkdown;

/// Folds per-application results into the commit status and the comment body.
pub struct DiffAggregator {
    error_count: usize,
    change_count: usize,
    unknown_count: usize,
    app_count: usize,
    first_error: String,
    new_file_name: String,
    comment_preamble: String,
    markdown: CommentMarkdown,
}

impl DiffAggregator {
    pub fn new(config: &Config, short_sha: &str) -> Self {
        DiffAggregator {
            error_count: 0,
            change_count: 0,
            unknown_count: 0,
            app_count: 0,
            first_error: String::new(),
            new_file_name: format!("{}.yaml", short_sha),
            comment_preamble: config.comment_preamble.trim().to_string(),
            markdown: CommentMarkdown::new(&config.ui_base_url, config.comment_line_max_chars),
        }
    }

    pub fn with_page_budget(mut self, page_budget: usize) -> Self {
        self.markdown = self.markdown.with_page_budget(page_budget);
        self
    }

    pub fn add(&mut self, result: &ApplicationDiffResult) {
        let app = &result.application;
        self.app_count += 1;

        if let Some(warning) = &result.warning {
            log::trace!("{} has warning {}", app.name(), warning.message);
            let label = if warning.kind.is_soft() {
                self.unknown_count += 1;
                "Unknown"
            } else {
                self.error_count += 1;
                "Error"
            };
            if self.first_error.is_empty() {
                self.first_error = warning.message.clone();
            }
            self.markdown.add_app(
                app.name(),
                &format!("{}: {}", label, warning.message),
                &app.status.sync.status,
                &app.status.health.status,
                &app.status.health.message,
            );
            return;
        }

        log::trace!(
            "{} has {} changed resources",
            app.name(),
            result.changed_resources.len()
        );
        if !result.has_changes() {
            return;
        }
        self.change_count += 1;
        let new_file_name = self.new_file_name.clone();
        let app_md = self.markdown.add_app(
            app.name(),
            "",
            &app.status.sync.status,
            &app.status.health.status,
            &app.status.health.message,
        );
        for resource in &result.changed_resources {
            let diff = match &resource.diff {
                ResourceDiff::Rendered { diff_text } => diff_text.clone(),
                ResourceDiff::Raw {
                    live_yaml,
                    predicted_yaml,
                } => unified_diff("live.yaml", &new_file_name, live_yaml, predicted_yaml),
            };
            app_md.add_resource_diff(&resource.key, &diff);
        }
    }

    pub fn change_count_str(&self) -> String {
        let mut s = format!("{} of {} apps with changes", self.change_count, self.app_count);
        if self.unknown_count > 0 {
            s.push_str(&format!(" [{} apps unknown]", self.unknown_count));
        }
        s
    }

    /// Final commit state and description. Errors fail the commit; unknowns only annotate it.
    pub fn status(&self) -> (CommitState, String) {
        let counts = self.change_count_str();
        if self.error_count > 0 {
            (
                CommitState::Failure,
                format!(
                    "{}; {} had an error; first error: {}",
                    counts, self.error_count, self.first_error
                ),
            )
        } else if !self.first_error.is_empty() {
            (
                CommitState::Success,
                format!("{}; diff generator failed; first error: {}", counts, self.first_error),
            )
        } else {
            (CommitState::Success, format!("{} - no errors", counts))
        }
    }

    /// False when there is nothing to report, in which case old comments are retired.
    pub fn has_comment_content(&self) -> bool {
        self.change_count > 0 || !self.first_error.is_empty()
    }

    pub fn comment_pages(&mut self, timestamp: &str) -> Vec<String> {
        let mut preamble = String::new();
        if !self.comment_preamble.is_empty() {
            preamble.push_str(&self.comment_preamble);
            preamble.push_str("\n\n");
        }
        preamble.push_str(&format!(
            "{} compared to live state\n\n{}\n",
            self.change_count_str(),
            timestamp
        ));
        self.markdown.preamble = preamble;
        self.markdown.pages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argodiff_defs::{AppResource, Application, ChangeErrorKind, ResourceKey};
    use pretty_assertions::assert_eq;

    fn app(name: &str) -> Application {
        let mut app = Application::default();
        app.metadata.name = name.to_string();
        app.status.sync.status = "OutOfSync".to_string();
        app.status.health.status = "Healthy".to_string();
        app
    }

    fn changed(name: &str) -> ApplicationDiffResult {
        let mut result = ApplicationDiffResult::new(app(name));
        result.changed_resources.push(AppResource::raw(
            ResourceKey::new("", "ConfigMap", "web", "settings"),
            "data:\n  mode: blue\n",
            "data:\n  mode: green\n",
        ));
        result
    }

    fn warned(name: &str, kind: ChangeErrorKind, message: &str) -> ApplicationDiffResult {
        let mut result = ApplicationDiffResult::new(app(name));
        result.set_warning(kind, message.to_string());
        result
    }

    #[test]
    fn test_no_results() {
        let aggregator = DiffAggregator::new(&Config::default(), "abc1234");
        assert_eq!(
            aggregator.status(),
            (CommitState::Success, "0 of 0 apps with changes - no errors".to_string())
        );
        assert!(!aggregator.has_comment_content());
    }

    #[test]
    fn test_error_fails_status() {
        let mut aggregator = DiffAggregator::new(&Config::default(), "abc1234");
        aggregator.add(&changed("web"));
        aggregator.add(&warned("api", ChangeErrorKind::Diff, "connection refused"));
        assert_eq!(
            aggregator.status(),
            (
                CommitState::Failure,
                "1 of 2 apps with changes; 1 had an error; first error: connection refused"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_unknown_keeps_success() {
        let mut aggregator = DiffAggregator::new(&Config::default(), "abc1234");
        aggregator.add(&warned("api", ChangeErrorKind::BaseManifestFetch, "no live state"));
        let (state, description) = aggregator.status();
        assert_eq!(state, CommitState::Success);
        assert_eq!(
            description,
            "0 of 1 apps with changes [1 apps unknown]; diff generator failed; first error: no live state"
        );
        assert!(aggregator.has_comment_content());
    }

    #[test]
    fn test_raw_diff_rendered_with_short_sha() {
        let config = Config {
            comment_preamble: "Cluster: staging".to_string(),
            ..Default::default()
        };
        let mut aggregator = DiffAggregator::new(&config, "abc1234");
        aggregator.add(&changed("web"));
        let pages = aggregator.comment_pages("1:00PM UTC, 2 Jan 2024");
        assert_eq!(pages.len(), 1);
        assert!(pages[0].starts_with(
            "Cluster: staging\n\n1 of 1 apps with changes compared to live state\n\n1:00PM UTC, 2 Jan 2024\n"
        ));
        assert!(pages[0].contains("--- live.yaml\n+++ abc1234.yaml\n"));
        assert!(pages[0].contains("+  mode: green\n"));
        assert!(pages[0].contains("===== /ConfigMap web/settings ====="));
    }

    #[test]
    fn test_warning_rendered_in_header() {
        let mut aggregator = DiffAggregator::new(&Config::default(), "abc1234");
        aggregator.add(&warned("api", ChangeErrorKind::Diff, "boom"));
        let pages = aggregator.comment_pages("now");
        assert!(pages[0].contains("Error: boom\n"));
        assert!(!pages[0].contains("```diff"));
    }
}
