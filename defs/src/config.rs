use std::time::Duration;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_CLI_COMMAND: &str = "argocd";
pub const DEFAULT_COMMENT_LINE_MAX_CHARS: usize = 175;
pub const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlatformClientKind {
    #[default]
    Cli,
    Http,
}

#[derive(Clone, Debug, Default)]
pub struct ArgoCdConfig {
    pub server_addr: String,
    pub base_url: String,
    pub auth_token: String,
    pub insecure: bool,
    pub plaintext: bool,
    pub grpc_web: bool,
    pub grpc_web_root_path: String,
    pub cli_command: String,
    pub client_kind: PlatformClientKind,
}

#[derive(Clone, Debug)]
pub enum GitHubAuth {
    None,
    Token(String),
    App {
        app_id: String,
        installation_id: u64,
        private_key: String,
    },
}

#[derive(Clone, Debug)]
pub struct GitHubConfig {
    pub api_url: String,
    pub auth: GitHubAuth,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        GitHubConfig {
            api_url: DEFAULT_GITHUB_API_URL.to_string(),
            auth: GitHubAuth::None,
        }
    }
}

/// Process configuration, read once at startup and shared read-only.
#[derive(Clone, Debug)]
pub struct Config {
    pub webhook_secret: String,
    pub argocd: ArgoCdConfig,
    pub github: GitHubConfig,
    pub ui_base_url: String,
    pub dev_mode: bool,
    pub log_level: String,
    pub comment_line_max_chars: usize,
    pub context_str: String,
    pub comment_preamble: String,
    /// Running inside a CI job: commit statuses are skipped and comments are not filtered by author.
    pub automation_mode: bool,
    /// Scope the comment marker by the triggering ref.
    pub ci_mode: bool,
    pub listen_addr: String,
    pub worker_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            webhook_secret: String::new(),
            argocd: ArgoCdConfig {
                cli_command: DEFAULT_CLI_COMMAND.to_string(),
                ..Default::default()
            },
            github: GitHubConfig::default(),
            ui_base_url: String::new(),
            dev_mode: false,
            log_level: "info".to_string(),
            comment_line_max_chars: DEFAULT_COMMENT_LINE_MAX_CHARS,
            context_str: String::new(),
            comment_preamble: String::new(),
            automation_mode: false,
            ci_mode: false,
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            worker_timeout: DEFAULT_WORKER_TIMEOUT,
        }
    }
}
