mod aggregate;
mod comment;
mod events;
mod github;
mod markdown;
mod process;
mod signature;
mod status;

#[cfg(any(test, feature = "test-mode"))]
pub mod fakes;

pub use aggregate::DiffAggregator;
pub use comment::{
    comment_marker, is_pr_head, reconcile_comments, CommentIdentity, CommentSummary,
    COMMENT_IDENTIFIER, OUTDATED_BODY,
};
pub use events::{
    is_refresh_request, normalize_issue_comment, normalize_pull_request, normalize_push,
    push_changed_files,
};
pub use github::{bot_login, create_app_jwt, GitHubClient, GitHubRestClient};
pub use markdown::{
    health_string, sync_string, AppMarkdown, CommentMarkdown, CONTINUED_NOTE, MAX_COMMENT_LEN,
    MAX_RESOURCE_DIFF_LEN, TOO_LARGE_PLACEHOLDER,
};
pub use process::{process_code_change, resolve_refresh, ProcessContext, ProcessOutcome};
pub use signature::{sign_payload, verify_signature};
pub use status::{set_status, status_context, status_request, STATUS_CONTEXT};
