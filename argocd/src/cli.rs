use std::process::Stdio;

use argodiff_defs::{Application, ArgoCdConfig, PlatformError};
use async_trait::async_trait;
use tokio::process::Command;

use crate::client::{DiffOutcome, DiffTarget, ManagedResource, PlatformClient, PlatformVersion};
use crate::diff_output::parse_diff_output;
use crate::manifests::{parse_manifest_value, split_manifest_documents};

/// Exit code the diff subcommand uses to signal "differences found".
const DIFF_FOUND_EXIT_CODE: i32 = 1;

pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Talks to the platform by shelling out to its CLI.
pub struct CliClient {
    command: String,
    common_args: Vec<String>,
}

impl CliClient {
    pub fn new(config: &ArgoCdConfig) -> Self {
        CliClient {
            command: config.cli_command.clone(),
            common_args: common_args(config),
        }
    }

    async fn run(&self, args: &[String]) -> Result<CommandOutput, PlatformError> {
        log::info!("Executing {} with args {}", self.command, args.join(" "));

        let output = Command::new(&self.command)
            .args(&self.common_args)
            .args(args)
            .env("KUBECTL_EXTERNAL_DIFF", "diff -u")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PlatformError::Spawn {
                command: args.join(" "),
                source: e,
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn run_checked(&self, args: &[String]) -> Result<String, PlatformError> {
        let output = self.run(args).await?;
        match output.code {
            Some(0) => Ok(output.stdout),
            code => Err(PlatformError::CommandFailed {
                command: args.join(" "),
                code: code.unwrap_or(-1),
                stderr: output.stderr.trim().to_string(),
            }),
        }
    }
}

pub fn common_args(config: &ArgoCdConfig) -> Vec<String> {
    let mut args = vec![
        "--server".to_string(),
        config.server_addr.clone(),
        "--auth-token".to_string(),
        config.auth_token.clone(),
    ];
    if config.insecure {
        args.push("--insecure".to_string());
    }
    if config.plaintext {
        args.push("--plaintext".to_string());
    }
    if config.grpc_web {
        args.push("--grpc-web".to_string());
    }
    if !config.grpc_web_root_path.is_empty() {
        args.push("--grpc-web-root-path".to_string());
        args.push(config.grpc_web_root_path.clone());
    }
    args
}

fn with_namespace(mut args: Vec<String>, namespace: &str) -> Vec<String> {
    if !namespace.is_empty() {
        args.push("--app-namespace".to_string());
        args.push(namespace.to_string());
    }
    args
}

pub fn diff_args(name: &str, namespace: &str, target: &DiffTarget) -> Vec<String> {
    let mut args = vec!["app".to_string(), "diff".to_string(), name.to_string()];
    match target {
        DiffTarget::Revision(revision) => {
            args.push("--revision".to_string());
            args.push(revision.clone());
        }
        DiffTarget::Sources {
            revisions,
            positions,
        } => {
            for revision in revisions {
                args.push("--revisions".to_string());
                args.push(revision.clone());
            }
            for position in positions {
                args.push("--source-positions".to_string());
                args.push(position.to_string());
            }
        }
    }
    with_namespace(args, namespace)
}

/// Exit 0 means no changes, exit 1 carries the diff on stdout (or stderr when
/// stdout is empty). Anything else is a failure.
pub fn interpret_diff_output(
    args: &[String],
    output: CommandOutput,
) -> Result<DiffOutcome, PlatformError> {
    match output.code {
        Some(0) => Ok(DiffOutcome::default()),
        Some(DIFF_FOUND_EXIT_CODE) => {
            let raw = if output.stdout.is_empty() {
                &output.stderr
            } else {
                &output.stdout
            };
            let changed = parse_diff_output(raw);
            Ok(DiffOutcome {
                total_resource_count: changed.len(),
                changed,
            })
        }
        code => Err(PlatformError::CommandFailed {
            command: args.join(" "),
            code: code.unwrap_or(-1),
            stderr: output.stderr.trim().to_string(),
        }),
    }
}

/// Extracts client and server versions from `argocd version`, dropping any `+build` suffix.
pub fn parse_version_output(output: &str) -> Result<PlatformVersion, PlatformError> {
    let mut client = String::new();
    let mut server = String::new();
    for line in output.lines() {
        let trimmed = line.trim();
        let target = if trimmed.starts_with("argocd-server:") {
            &mut server
        } else if trimmed.starts_with("argocd:") {
            &mut client
        } else {
            continue;
        };
        if let Some((_, version)) = trimmed.split_once(' ') {
            let version = version.trim();
            *target = version.split('+').next().unwrap_or(version).to_string();
        }
    }
    if client.is_empty() || server.is_empty() {
        return Err(PlatformError::Version(
            "failed to parse client or server version from output".to_string(),
        ));
    }
    Ok(PlatformVersion {
        client: Some(client),
        server,
    })
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl PlatformClient for CliClient {
    async fn list_applications(&self) -> Result<Vec<Application>, PlatformError> {
        log::trace!("list_applications() called");
        let stdout = self
            .run_checked(&args(&["app", "list", "-o", "json"]))
            .await
            .inspect_err(|e| log::error!("Application List failed: {}", e))?;
        serde_json::from_str::<Option<Vec<Application>>>(&stdout)
            .map(|apps| apps.unwrap_or_default())
            .map_err(|e| PlatformError::Decode {
                context: "application list".to_string(),
                message: e.to_string(),
            })
    }

    async fn get_application(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Application, PlatformError> {
        let cmd = with_namespace(args(&["app", "get", name, "--refresh", "-o", "json"]), namespace);
        let stdout = self.run_checked(&cmd).await?;
        serde_json::from_str(&stdout).map_err(|e| PlatformError::Decode {
            context: format!("application {}", name),
            message: e.to_string(),
        })
    }

    async fn get_managed_resources(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Vec<ManagedResource>, PlatformError> {
        let cmd = with_namespace(args(&["app", "manifests", name, "--source", "live"]), namespace);
        let stdout = self
            .run_checked(&cmd)
            .await
            .map_err(|e| PlatformError::LiveState(e.to_string()))?;

        let mut resources = vec![];
        for doc in split_manifest_documents(&stdout) {
            let value = parse_manifest_value(&doc)
                .map_err(|e| PlatformError::LiveStateDecode(format!("{}: {}", name, e)))?;
            let resource = ManagedResource {
                group: value.group().to_string(),
                kind: value.manifest.kind.clone(),
                namespace: value.manifest.metadata.namespace.clone().unwrap_or_default(),
                name: value.manifest.metadata.name.clone(),
                normalized_live_state: value.json.to_string(),
            };
            resources.push(resource);
        }
        Ok(resources)
    }

    async fn get_manifests(
        &self,
        name: &str,
        namespace: &str,
        revision: &str,
    ) -> Result<Vec<String>, PlatformError> {
        let cmd = with_namespace(
            args(&["app", "manifests", name, "--revision", revision]),
            namespace,
        );
        let stdout = self.run_checked(&cmd).await.inspect_err(|e| {
            log::error!(
                "Get Argo application manifests for {} at {} failed: {}",
                name,
                revision,
                e
            )
        })?;
        Ok(split_manifest_documents(&stdout))
    }

    async fn diff_application(
        &self,
        name: &str,
        namespace: &str,
        target: &DiffTarget,
    ) -> Result<DiffOutcome, PlatformError> {
        log::trace!("diff_application({}, {})", name, target.describe());
        let cmd = diff_args(name, namespace, target);
        let output = self.run(&cmd).await?;
        let outcome = interpret_diff_output(&cmd, output).inspect_err(|e| {
            log::error!(
                "Application diff for {}, revision {}, failed: {}",
                name,
                target.describe(),
                e
            )
        })?;
        log::debug!(
            "Application {} revision {} has {} changed resources",
            name,
            target.describe(),
            outcome.changed.len()
        );
        Ok(outcome)
    }

    async fn version(&self) -> Result<PlatformVersion, PlatformError> {
        let stdout = self.run_checked(&args(&["version"])).await?;
        parse_version_output(&stdout)
    }
}
