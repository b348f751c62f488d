use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use argodiff_defs::{ChangeEvent, Config};
use gitops::{normalize_issue_comment, normalize_pull_request, normalize_push, verify_signature};

use crate::dispatcher::Dispatcher;

pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";
pub const EVENT_HEADER: &str = "X-GitHub-Event";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Dispatcher,
}

pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/healthz", get(healthz));
    if state.config.dev_mode {
        router = router.route("/dev", post(handle_dev_event));
    }
    router.with_state(state)
}

async fn healthz() -> &'static str {
    log::debug!("healthz endpoint");
    "healthy\n"
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let payload = match body {
        Ok(payload) => payload,
        Err(e) => {
            log::error!("Error reading request body: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Error reading request body\n").into_response();
        }
    };

    if state.config.dev_mode {
        log::info!("Running in dev mode - skipping signature validation");
    } else if !verify_signature(
        &payload,
        header(&headers, SIGNATURE_HEADER),
        &state.config.webhook_secret,
    ) {
        return (StatusCode::UNAUTHORIZED, "Invalid signature\n").into_response();
    }

    let event_type = header(&headers, EVENT_HEADER);
    let normalized = match event_type {
        "ping" => {
            log::info!("ping event received");
            return (StatusCode::OK, "ping event processed\n").into_response();
        }
        "pull_request" => normalize_pull_request(&payload),
        "push" => normalize_push(&payload),
        "issue_comment" => normalize_issue_comment(&payload, &state.config.context_str),
        other => {
            log::info!("Ignoring X-GitHub-Event {}", other);
            return (StatusCode::OK, "event ignored\n").into_response();
        }
    };

    let event = match normalized {
        Ok(event) => event,
        Err(e) => {
            log::error!("Could not process {} event data: {}", event_type, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Could not process {} event data\n", event_type),
            )
                .into_response();
        }
    };

    if event.ignore {
        log::info!("Ignoring {} event: {:?}", event_type, event);
        return (StatusCode::OK, format!("{} event ignored\n", event_type)).into_response();
    }

    log::info!(
        "Accepted {} event for {}/{} (sha '{}', pr {})",
        event_type,
        event.repo_owner,
        event.repo_name,
        event.commit_sha,
        event.pr_number
    );
    state.dispatcher.dispatch(event);
    (StatusCode::OK, "event accepted for processing\n").into_response()
}

async fn handle_dev_event(State(state): State<AppState>, body: Bytes) -> Response {
    let event: ChangeEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            log::warn!("Cannot decode dev event: {}", e);
            return (StatusCode::BAD_REQUEST, "Cannot decode POST'ed json as a change event\n")
                .into_response();
        }
    };
    if let Err(e) = event.validate() {
        return (StatusCode::BAD_REQUEST, format!("Invalid change event: {}\n", e)).into_response();
    }
    state.dispatcher.dispatch(event);
    (StatusCode::OK, "event dispatched for processing\n").into_response()
}
