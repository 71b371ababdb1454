//! Webhook handler for GitHub push events

use axum::{
    body::Bytes,
    extract::Query,
    extract::State as AxumState,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::collections::HashMap;
use tracing::{error, info, warn};

use crate::SharedState;
use crate::signature::{SIGNATURE_HEADER, verify_signature};
use crate::webhook::parse_push_event;

/// Handles the GitHub webhook POST request.
pub async fn handle_webhook(
    AxumState(state): AxumState<SharedState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    // Nothing is parsed before the signature checks out
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !verify_signature(state.webhook_secret.as_deref(), &body, signature) {
        error!("Signature verification failed, rejecting webhook");
        return (StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    // Only handle "push" events; ping and friends are acknowledged
    let event_opt = headers.get("X-GitHub-Event").and_then(|v| v.to_str().ok());
    if event_opt.is_some_and(|e| e != "push") {
        info!("Not push event; Received {:?} event", event_opt);
        return (StatusCode::NO_CONTENT, "");
    }

    let event = match parse_push_event(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("Rejecting webhook: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid JSON payload");
        }
    };

    let dry_run = params.get("dry_run").map(|v| v == "true").unwrap_or(false)
        || headers.get("X-Dry-Run").is_some();

    let changed = event.changed_files();
    info!(
        "Push event received for repository {} with {} modified file(s)",
        event.repository,
        changed.len()
    );

    if changed.is_empty() {
        info!("No modified files, nothing to sync");
        return (StatusCode::OK, "Webhook processed");
    }

    if dry_run {
        let report = state.dispatcher.plan(&event);
        info!(
            "[DRY_RUN] Dispatch {} planned {} file(s)",
            report.dispatch_id,
            report.outcomes.len()
        );
        return (StatusCode::OK, "Webhook processed (dry run)");
    }

    // Respond right away; remote calls can take far longer than GitHub waits
    state.spawn_dispatch(event).await;

    (StatusCode::OK, "Webhook processed")
}
