use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Json, Response},
    routing::post,
    Router,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{error, info};

use crate::host::{Identity, RepoRef};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GitHubWebhookPayload {
    pub action: Option<String>,
    pub repository: Option<Repository>,
    pub installation: Option<Installation>,
    pub comment: Option<Comment>,
    pub issue: Option<Issue>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Comment {
    pub id: u64,
    pub body: String,
    pub user: User,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Issue {
    pub number: u64,
    pub pull_request: Option<PullRequestLink>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PullRequestLink {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Installation {
    pub id: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub owner: User,
}

#[derive(Debug, Deserialize, Clone)]
pub struct User {
    pub id: u64,
    pub login: String,
}

#[derive(Serialize)]
pub struct WebhookResponse {
    pub message: String,
}

/// A pull request comment that should be handed to the command processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTrigger {
    pub installation_id: u64,
    pub pr_number: u64,
    pub comment_id: u64,
    pub body: String,
    pub user: Identity,
}

/// Pick out newly created pull request comments on `upstream` that contain at
/// least one line starting with `/`.
pub fn command_trigger(payload: &GitHubWebhookPayload, upstream: &RepoRef) -> Option<CommandTrigger> {
    if payload.action.as_deref() != Some("created") {
        return None;
    }
    let (comment, issue) = (payload.comment.as_ref()?, payload.issue.as_ref()?);
    issue.pull_request.as_ref()?;

    let repository = payload.repository.as_ref()?;
    if repository.owner.login != upstream.owner || repository.name != upstream.name {
        info!(
            "Ignoring comment on {}, not {}/{}",
            repository.full_name, upstream.owner, upstream.name
        );
        return None;
    }
    if !comment.body.lines().any(|line| line.starts_with('/')) {
        return None;
    }

    Some(CommandTrigger {
        installation_id: payload.installation.as_ref()?.id,
        pr_number: issue.number,
        comment_id: comment.id,
        body: comment.body.clone(),
        user: Identity::new(comment.user.login.clone(), comment.user.id),
    })
}

type HmacSha256 = Hmac<Sha256>;

fn verify_github_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Some(signature_hex) = signature.strip_prefix("sha256=") else {
        return false;
    };

    let signature_bytes = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };

    mac.update(payload);

    // Use constant-time verification
    mac.verify_slice(&signature_bytes).is_ok()
}

async fn verify_webhook_signature(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let signature = parts
        .headers
        .get("x-hub-signature-256")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !verify_github_signature(&state.webhook_secret, &bytes, signature) {
        error!("Invalid webhook signature");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let request = Request::from_parts(parts, axum::body::Body::from(bytes));
    Ok(next.run(request).await)
}

pub async fn github_webhook_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<WebhookResponse>, StatusCode> {
    info!("Received webhook payload");

    let (_parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let payload: GitHubWebhookPayload =
        serde_json::from_slice(&bytes).map_err(|_| StatusCode::BAD_REQUEST)?;

    let Some(trigger) = command_trigger(&payload, &state.dispatch.session.upstream) else {
        return Ok(Json(WebhookResponse {
            message: "Ignored".to_string(),
        }));
    };

    info!(
        "Comment {} on PR #{} by {} may contain commands",
        trigger.comment_id, trigger.pr_number, trigger.user.login
    );
    tokio::spawn(async move {
        let processor = state.command_processor(trigger.installation_id);
        if let Err(e) = processor
            .run(
                trigger.pr_number,
                &trigger.body,
                trigger.comment_id,
                &trigger.user,
            )
            .await
        {
            error!(
                "Failed to process commands for PR #{}: {:#}",
                trigger.pr_number, e
            );
        }
    });

    Ok(Json(WebhookResponse {
        message: "Processing commands".to_string(),
    }))
}

pub fn webhook_router(middleware_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/webhook", post(github_webhook_handler))
        .route_layer(middleware::from_fn_with_state(
            middleware_state,
            verify_webhook_signature,
        ))
}
