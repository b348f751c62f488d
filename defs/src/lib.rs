mod application;
mod config;
mod errors;
mod event;
mod gitprovider;
mod resource;

pub use application::{
    Application, ApplicationDestination, ApplicationList, ApplicationSource, ApplicationSpec,
    ApplicationStatus, HealthStatus, ObjectMeta, SyncPolicy, SyncPolicyAutomated, SyncStatus,
    HEAD_REVISION, MANIFEST_PATHS_ANNOTATION,
};
pub use config::{
    ArgoCdConfig, Config, GitHubAuth, GitHubConfig, PlatformClientKind,
    DEFAULT_CLI_COMMAND, DEFAULT_COMMENT_LINE_MAX_CHARS, DEFAULT_GITHUB_API_URL,
    DEFAULT_LISTEN_ADDR, DEFAULT_WORKER_TIMEOUT,
};
pub use errors::{EventError, GitHubError, PlatformError};
pub use event::ChangeEvent;
pub use gitprovider::{
    AppInfo, CommitState, CommitStatusRequest, GitRef, HeadCommit, Issue, IssueComment,
    IssueCommentEvent, Owner, PullRequest, PullRequestEvent, PullRequestFile, PushCommit,
    PushEvent, Repository, User,
};
pub use resource::{
    AppResource, ApplicationDiffResult, ChangeErrorKind, ChangeWarning, K8sManifest,
    K8sMetadata, ResourceDiff, ResourceKey, APPLICATION_GROUP, APPLICATION_KIND,
};
