use std::sync::Arc;

use anyhow::{bail, Context, Result};
use argocd::{connectivity_check, new_platform_client};
use argodiff_defs::Config;
use argodiff_server::{create_router, event_from_env, event_from_file, run_worker, AppState, Dispatcher};
use argodiff_utils::{load_config, log_config, setup_logging};
use clap::{Parser, Subcommand};
use gitops::{CommentIdentity, GitHubRestClient, ProcessContext};
use tokio::net::TcpListener;

/// Posts ArgoCD application diffs to GitHub commits and pull requests
#[derive(Parser, Debug)]
#[command(name = "argo-diff")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Listen for GitHub webhooks (default)
    Serve,

    /// Process a single change event and exit
    RunOnce {
        /// JSON file holding the change event, or "-" for stdin
        #[arg(short, long)]
        file: String,
    },

    /// Process the pull request of the current GitHub Actions job
    GithubAction,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config();
    setup_logging(&config.log_level).context("Failed to set up logging")?;
    log_config(&config);

    let config = Arc::new(config);
    let ctx = build_context(config.clone()).await?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, ctx).await,
        Commands::RunOnce { file } => {
            let event = event_from_file(&file)?;
            run_worker(&ctx, event, config.worker_timeout).await?;
            Ok(())
        }
        Commands::GithubAction => {
            let event = event_from_env(|key| std::env::var(key).ok())?;
            run_worker(&ctx, event, config.worker_timeout).await?;
            Ok(())
        }
    }
}

/// Creates both clients and checks that they can reach their services.
async fn build_context(config: Arc<Config>) -> Result<ProcessContext> {
    let platform = new_platform_client(&config.argocd).context("Failed to create ArgoCD client")?;
    connectivity_check(platform.as_ref())
        .await
        .context("ArgoCD connectivity check failed")?;

    let github = Arc::new(GitHubRestClient::new(&config.github).context("Failed to create GitHub client")?);
    let identity = Arc::new(CommentIdentity::new());
    if !config.automation_mode {
        log::info!("Calling Github API for a connectivity test");
        if let Err(e) = identity.resolve(github.as_ref()).await {
            if config.dev_mode {
                log::warn!("GitHub connectivity check failed: {}", e);
            } else {
                return Err(e).context("GitHub connectivity check failed");
            }
        }
    }

    Ok(ProcessContext {
        config,
        platform,
        github,
        identity,
    })
}

async fn serve(config: Arc<Config>, ctx: ProcessContext) -> Result<()> {
    if config.webhook_secret.is_empty() && !config.dev_mode {
        bail!("GITHUB_WEBHOOK_SECRET must be set");
    }
    if config.dev_mode {
        log::warn!("Dev Mode is enabled - signature validations are disabled!");
        log::warn!("Dev Mode is enabled - commit status updates are disabled!");
    }

    let dispatcher = Dispatcher::new(ctx);
    let app = create_router(AppState {
        config: config.clone(),
        dispatcher: dispatcher.clone(),
    });

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    log::info!("Listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    dispatcher.drain().await;
    log::info!("Server gracefully stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("Shutting down...");
}
