//! HTTP server receiving GitHub activity webhooks.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::app::LabelerApp;
use crate::event::{ActivityEvent, EventKind};
use crate::webhooks::verify_signature;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub app: LabelerApp,
    /// Webhook secret; signatures are only checked when set.
    pub webhook_secret: Option<String>,
}

/// Build the HTTP router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/github", post(github_webhook_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Handle a GitHub webhook delivery.
///
/// Verifies the signature (if a secret is configured), then routes activity
/// events into the reversal flow. Other events are acknowledged and ignored.
pub async fn github_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, StatusCode> {
    let event_type = header(&headers, "X-GitHub-Event").unwrap_or("unknown");
    let delivery_id = header(&headers, "X-GitHub-Delivery").unwrap_or("unknown");

    info!(
        event_type = %event_type,
        delivery_id = %delivery_id,
        "Received GitHub webhook"
    );

    if let Some(secret) = &state.webhook_secret {
        let Some(signature) = header(&headers, "X-Hub-Signature-256") else {
            warn!(delivery_id = %delivery_id, "Missing X-Hub-Signature-256 header");
            return Err(StatusCode::UNAUTHORIZED);
        };
        if !verify_signature(&body, signature, secret) {
            warn!(delivery_id = %delivery_id, "Invalid webhook signature");
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    let Some(kind) = EventKind::from_header(event_type) else {
        debug!(event_type = %event_type, "Ignoring event");
        return Ok(Json(json!({
            "status": "ignored",
            "reason": "unhandled_event"
        })));
    };

    let event = ActivityEvent::parse(kind, &body).map_err(|e| {
        error!(error = %e, delivery_id = %delivery_id, "Failed to parse GitHub webhook payload");
        StatusCode::BAD_REQUEST
    })?;

    match state.app.on_activity(&event).await {
        Ok(outcome) => {
            info!(
                repository = %event.repository,
                number = event.number(),
                outcome = outcome.as_str(),
                "Activity processed"
            );
            Ok(Json(json!({
                "status": "processed",
                "outcome": outcome.as_str()
            })))
        }
        Err(e) => {
            error!(
                repository = %event.repository,
                number = event.number(),
                error = %e,
                "Failed to process activity"
            );
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG_PATH;
    use crate::github::fake::{Call, FakeGitHub};
    use crate::github::{ItemState, RepoRef};
    use crate::webhooks::sign;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    const SECRET: &str = "hook-secret";

    fn router(github: &Arc<FakeGitHub>, secret: Option<&str>) -> Router {
        build_router(AppState {
            app: LabelerApp::new(github.clone(), github.clone(), false),
            webhook_secret: secret.map(ToString::to_string),
        })
    }

    fn comment_payload() -> String {
        json!({
            "action": "created",
            "issue": {"number": 3, "state": "open", "labels": [{"name": "rfc"}, {"name": "consensus"}]},
            "comment": {"body": "Still relevant"},
            "repository": {"name": "rfcs", "owner": {"login": "acme"}},
            "sender": {"login": "octocat", "type": "User"}
        })
        .to_string()
    }

    fn request(event: &str, body: &str, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::post("/webhooks/github")
            .header("X-GitHub-Event", event)
            .header("X-GitHub-Delivery", "d-1")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header("X-Hub-Signature-256", signature);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn configured() -> Arc<FakeGitHub> {
        Arc::new(
            FakeGitHub::new()
                .with_file(&RepoRef::new("acme", "rfcs"), CONFIG_PATH, "limitPerRun: 10\n")
                .with_item(3, ItemState::Open, &["rfc", "consensus"]),
        )
    }

    #[tokio::test]
    async fn health() {
        let github = Arc::new(FakeGitHub::new());
        let response = router(&github, None)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn signed_comment_unmarks() {
        let github = configured();
        let body = comment_payload();
        let response = router(&github, Some(SECRET))
            .oneshot(request("issue_comment", &body, Some(sign(body.as_bytes(), SECRET))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "processed");
        assert_eq!(json["outcome"], "unmarked");
        assert_eq!(
            github.mutations(),
            vec![Call::RemoveLabel(3, "consensus".to_string())]
        );
    }

    #[tokio::test]
    async fn bad_signature_is_rejected() {
        let github = configured();
        let body = comment_payload();
        let response = router(&github, Some(SECRET))
            .oneshot(request("issue_comment", &body, Some(sign(b"other", SECRET))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router(&github, Some(SECRET))
            .oneshot(request("issue_comment", &body, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(github.calls().is_empty());
    }

    #[tokio::test]
    async fn unrelated_events_are_ignored() {
        let github = configured();
        let response = router(&github, None)
            .oneshot(request("push", "{}", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ignored");
        assert!(github.calls().is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_is_bad_request() {
        let github = configured();
        let response = router(&github, None)
            .oneshot(request("pull_request", "{\"action\":", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
