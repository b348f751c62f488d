use thiserror::Error;

use crate::resource::ChangeErrorKind;

#[derive(Error, Debug)]
pub enum EventError {
    #[error("Failed to decode event payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Event is missing {0}")]
    MissingField(&'static str),

    #[error("Invalid event: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("{command}: exit code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("{command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Request to {endpoint} failed: {message}")]
    Http { endpoint: String, message: String },

    #[error("Request to {endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode {context}: {message}")]
    Decode { context: String, message: String },

    #[error("Version check failed: {0}")]
    Version(String),

    #[error("Empty application list returned by the platform")]
    EmptyInventory,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unable to read live state: {0}")]
    LiveState(String),

    #[error("Unable to decode live state: {0}")]
    LiveStateDecode(String),

    #[error("Unable to render target manifests: {0}")]
    TargetState(String),
}

impl PlatformError {
    /// Maps a failed diff to the warning class shown on the application.
    pub fn change_error_kind(&self) -> ChangeErrorKind {
        match self {
            PlatformError::LiveState(_) => ChangeErrorKind::BaseManifestFetch,
            PlatformError::LiveStateDecode(_) => ChangeErrorKind::BaseManifestDecode,
            PlatformError::TargetState(_) => ChangeErrorKind::NewManifestFetch,
            PlatformError::InvalidRequest(_) => ChangeErrorKind::Discovery,
            _ => ChangeErrorKind::Diff,
        }
    }
}

#[derive(Error, Debug)]
pub enum GitHubError {
    #[error("Request to {endpoint} failed: {message}")]
    Http { endpoint: String, message: String },

    #[error("Request to {endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("GitHub authentication failed: {0}")]
    Auth(String),

    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("No GitHub credentials configured")]
    NotConfigured,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_command_failed_message() {
        let err = PlatformError::CommandFailed {
            command: "app diff guestbook --revision abc".to_string(),
            code: 20,
            stderr: "rpc error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "app diff guestbook --revision abc: exit code 20: rpc error"
        );
    }

    #[test]
    fn test_change_error_kind() {
        assert_eq!(
            PlatformError::LiveState("503".to_string()).change_error_kind(),
            ChangeErrorKind::BaseManifestFetch
        );
        assert_eq!(
            PlatformError::TargetState("bad chart".to_string()).change_error_kind(),
            ChangeErrorKind::NewManifestFetch
        );
        assert_eq!(
            PlatformError::EmptyInventory.change_error_kind(),
            ChangeErrorKind::Diff
        );
    }
}
