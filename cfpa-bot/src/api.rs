use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::webhook::webhook_router;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub link: String,
}

async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "cfpa-bot"
    })))
}

/// Check `Authorization: Bearer <token>` against the configured token.
///
/// With no token configured the endpoint is disabled.
fn check_bearer(expected: Option<&str>, headers: &HeaderMap) -> Result<(), StatusCode> {
    let expected = expected.ok_or(StatusCode::FORBIDDEN)?;
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;
    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<AnalyzeRequest>,
) -> Response {
    if let Err(status) = check_bearer(state.analyze_auth_token.as_deref(), &headers) {
        warn!("Rejected /analyze request: {}", status);
        return status.into_response();
    }

    info!("Analyze requested for {}", request.link);
    match state.analyzer.analyze(&request.link).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            error!("Failed to analyze {}: {:#}", request.link, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("{:#}", e) })),
            )
                .into_response()
        }
    }
}

/// All routes, with request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/analyze", post(analyze_handler))
        .merge(webhook_router(state.clone()))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::RepoAnalyzer;
    use crate::dispatcher::DispatchSettings;
    use crate::github::GitHubClient;
    use crate::host::RepoRef;
    use crate::lock_registry::LockRegistry;
    use crate::mapping::MappingStore;
    use crate::session::SessionSettings;
    use crate::testing::{FakeModHost, FakeVcs};
    use axum::body::Body;
    use axum::http::Request;
    use hmac::{Hmac, Mac};
    use sha2::Sha256;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const SECRET: &str = "webhook-secret";
    const TOKEN: &str = "analyze-token";

    async fn app(vcs: FakeVcs, analyze_token: Option<&str>) -> (Router, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(vcs);
        let mappings = MappingStore::load(dir.path().join("config/mod_id_mapping.json"))
            .await
            .unwrap();
        let state = AppState {
            github_client: GitHubClient::new(1, "not a key".to_string()),
            mod_host: Arc::new(FakeModHost::default()),
            mappings: Arc::new(mappings),
            vcs: vcs.clone(),
            analyzer: Arc::new(RepoAnalyzer::new(
                vcs,
                Arc::new(LockRegistry::new()),
                dir.path().join("config/repo_analyze_results"),
                dir.path().join("caches"),
            )),
            dispatch: DispatchSettings {
                session: SessionSettings {
                    scratch_dir: dir.path().join("caches"),
                    upstream: RepoRef::new("CFPAOrg", "Minecraft-Mod-Language-Package"),
                    protected_branch: "main".to_string(),
                },
                admin_login: "Cyl18".to_string(),
                bypass_logins: Vec::new(),
            },
            webhook_secret: SECRET.to_string(),
            analyze_auth_token: analyze_token.map(str::to_string),
        };
        (router(Arc::new(state)), dir)
    }

    fn analyze_request(token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/analyze")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder
            .body(Body::from(r#"{"link":"https://github.com/someone/SomeMod"}"#))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _dir) = app(FakeVcs::default(), None).await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"status": "healthy", "service": "cfpa-bot"})
        );
    }

    #[tokio::test]
    async fn test_analyze_is_disabled_without_token() {
        let (app, _dir) = app(FakeVcs::default(), None).await;
        let response = app.oneshot(analyze_request(Some(TOKEN))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_check_bearer() {
        let mut headers = HeaderMap::new();
        assert_eq!(check_bearer(None, &headers), Err(StatusCode::FORBIDDEN));
        assert_eq!(check_bearer(Some(TOKEN), &headers), Err(StatusCode::UNAUTHORIZED));

        for wrong in ["Bearer analyze-toke", "Bearer analyze-tokenx", "analyze-token"] {
            headers.insert(header::AUTHORIZATION, wrong.parse().unwrap());
            assert_eq!(
                check_bearer(Some(TOKEN), &headers),
                Err(StatusCode::UNAUTHORIZED),
                "{wrong}"
            );
        }

        headers.insert(header::AUTHORIZATION, "Bearer analyze-token".parse().unwrap());
        assert_eq!(check_bearer(Some(TOKEN), &headers), Ok(()));
    }

    #[tokio::test]
    async fn test_analyze_rejects_wrong_token() {
        let (app, _dir) = app(FakeVcs::default(), Some(TOKEN)).await;
        let response = app.clone().oneshot(analyze_request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let response = app.oneshot(analyze_request(Some("nope"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_analyze_returns_scan() {
        let vcs = FakeVcs::default().with_branch("main", "abc", &["lang/zh_cn.json"]);
        let (app, _dir) = app(vcs, Some(TOKEN)).await;
        let response = app.oneshot(analyze_request(Some(TOKEN))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["owner"], "someone");
        assert_eq!(body["results"][0]["lang"], "CN");
        assert_eq!(body["results"][0]["commit_sha"], "abc");
    }

    #[tokio::test]
    async fn test_analyze_failure_is_500() {
        let (app, _dir) = app(FakeVcs::default().failing_clone(), Some(TOKEN)).await;
        let response = app.oneshot(analyze_request(Some(TOKEN))).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_json(response).await["error"]
            .as_str()
            .unwrap()
            .contains("Failed to clone"));
    }

    #[tokio::test]
    async fn test_webhook_requires_signature() {
        let (app, _dir) = app(FakeVcs::default(), None).await;
        let body = r#"{"action":"created"}"#;

        let unsigned = Request::post("/webhook").body(Body::from(body)).unwrap();
        let response = app.clone().oneshot(unsigned).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body.as_bytes());
        let signature = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));
        let signed = Request::post("/webhook")
            .header("x-hub-signature-256", signature)
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(signed).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"message": "Ignored"}));
    }
}
