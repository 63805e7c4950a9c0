//! HTTP binding of the control surface.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use farmctl_core::{ConfigUpdate, LogEntry, RuntimeConfig, SessionStatus, StatsRecord};
use farmctl_login::LoginCode;
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    app::ControlPlane,
    protocol::{
        ApiError, ApiResponse, ErrorCode, LoginStatusResponse, LogsQuery, StartRequest,
        StatsResponse, StopResponse,
    },
    sse,
};

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

impl ErrorCode {
    /// HTTP status for this failure kind.
    #[must_use]
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::AlreadyRunning | Self::NotRunning => StatusCode::CONFLICT,
            Self::ConnectionFailed | Self::IssuanceError | Self::PollError | Self::ExchangeError => {
                StatusCode::BAD_GATEWAY
            }
            Self::ValidationError => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::PersistenceError | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.code.status_code().is_server_error() {
            tracing::error!(code = ?self.code, "{}", self.message);
        }
        (
            self.code.status_code(),
            Json(ApiResponse::<()>::err(&self)),
        )
            .into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

/// Build the `/api` router.
pub fn router(plane: Arc<ControlPlane>) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/session/start", post(start_session))
        .route("/api/session/stop", post(stop_session))
        .route("/api/login/request-code", post(request_login_code))
        .route("/api/login/status/{code}", get(login_status))
        .route("/api/config", get(config).post(update_config))
        .route("/api/stats", get(stats))
        .route("/api/stats/reset", post(reset_stats))
        .route("/api/logs", get(logs))
        .route("/api/logs/clear", post(clear_logs))
        .route("/api/farm/check", post(check_farm))
        .route("/api/events", get(sse::events))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(plane)
}

async fn status(State(plane): State<Arc<ControlPlane>>) -> ApiResult<SessionStatus> {
    ok(plane.status())
}

async fn start_session(
    State(plane): State<Arc<ControlPlane>>,
    body: Result<Json<StartRequest>, JsonRejection>,
) -> ApiResult<SessionStatus> {
    let Json(request) = body?;
    ok(plane.start_session(request).await?)
}

async fn stop_session(State(plane): State<Arc<ControlPlane>>) -> ApiResult<StopResponse> {
    ok(plane.stop_session().await)
}

async fn request_login_code(State(plane): State<Arc<ControlPlane>>) -> ApiResult<LoginCode> {
    ok(plane.request_login_code().await?)
}

async fn login_status(
    State(plane): State<Arc<ControlPlane>>,
    Path(code): Path<String>,
) -> ApiResult<LoginStatusResponse> {
    ok(plane.login_status(&code).await?)
}

async fn config(State(plane): State<Arc<ControlPlane>>) -> ApiResult<RuntimeConfig> {
    ok(plane.config())
}

async fn update_config(
    State(plane): State<Arc<ControlPlane>>,
    body: Result<Json<ConfigUpdate>, JsonRejection>,
) -> ApiResult<RuntimeConfig> {
    let Json(update) = body?;
    ok(plane.update_config(&update)?)
}

async fn stats(State(plane): State<Arc<ControlPlane>>) -> ApiResult<StatsResponse> {
    ok(plane.stats().await)
}

async fn reset_stats(State(plane): State<Arc<ControlPlane>>) -> ApiResult<StatsRecord> {
    ok(plane.reset_stats().await)
}

async fn logs(
    State(plane): State<Arc<ControlPlane>>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Vec<LogEntry>> {
    ok(plane.logs(query.limit))
}

async fn clear_logs(State(plane): State<Arc<ControlPlane>>) -> ApiResult<()> {
    plane.clear_logs();
    ok(())
}

async fn check_farm(State(plane): State<Arc<ControlPlane>>) -> ApiResult<()> {
    plane.check_farm().await?;
    ok(())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, header},
    };
    use farmctl_login::LoginStatus;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::app::tests::fixture;

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(body) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_session_lifecycle_over_http() {
        let f = fixture(vec![LoginStatus::Wait]);
        let app = router(f.plane);

        let (code, body) = call(&app, "GET", "/api/status", None).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["running"], false);

        let start = json!({"credential": "good", "platform": "wx"});
        let (code, body) = call(&app, "POST", "/api/session/start", Some(start.clone())).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["data"]["running"], true);
        assert_eq!(body["data"]["player"]["name"], "farmer");

        let (code, body) = call(&app, "POST", "/api/session/start", Some(start)).await;
        assert_eq!(code, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "AlreadyRunning");

        let (_, body) = call(&app, "POST", "/api/session/stop", None).await;
        assert_eq!(body["data"]["stopped"], true);
        let (_, body) = call(&app, "POST", "/api/session/stop", None).await;
        assert_eq!(body["data"]["stopped"], false);
    }

    #[tokio::test]
    async fn test_malformed_body_uses_envelope() {
        let f = fixture(vec![LoginStatus::Wait]);
        let app = router(f.plane);

        let (code, body) = call(&app, "POST", "/api/session/start", Some(json!({"platform": 1}))).await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "ValidationError");
    }

    #[tokio::test]
    async fn test_config_routes() {
        let f = fixture(vec![LoginStatus::Wait]);
        let app = router(f.plane);

        let (_, body) = call(&app, "GET", "/api/config", None).await;
        assert_eq!(body["data"]["farmCheckIntervalMs"], 10_000);

        let (code, body) = call(
            &app,
            "POST",
            "/api/config",
            Some(json!({"farmCheckIntervalMs": 500})),
        )
        .await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "ValidationError");

        let (_, body) = call(
            &app,
            "POST",
            "/api/config",
            Some(json!({"friendCheckIntervalMs": 2000, "forceLowestLevelCrop": true})),
        )
        .await;
        assert_eq!(body["data"]["friendCheckIntervalMs"], 2000);
        assert_eq!(body["data"]["farmCheckIntervalMs"], 10_000);
        assert_eq!(body["data"]["forceLowestLevelCrop"], true);
    }

    #[tokio::test]
    async fn test_login_routes() {
        let f = fixture(vec![LoginStatus::Used]);
        let app = router(f.plane);

        let (_, body) = call(&app, "POST", "/api/login/request-code", None).await;
        assert_eq!(body["data"]["code"], "c-1");

        let (_, body) = call(&app, "GET", "/api/login/status/c-1", None).await;
        assert_eq!(body["data"]["status"], "Used");
        assert_eq!(body["data"]["message"], LoginStatus::Used.message());
    }

    #[tokio::test]
    async fn test_stats_and_logs_routes() {
        let f = fixture(vec![LoginStatus::Wait]);
        let app = router(Arc::clone(&f.plane));

        let (_, body) = call(&app, "GET", "/api/stats", None).await;
        assert_eq!(body["data"]["harvestCount"], 0);
        assert_eq!(body["data"]["user"], Value::Null);

        let (_, body) = call(&app, "POST", "/api/stats/reset", None).await;
        assert_eq!(body["data"]["sellGold"], 0);

        let (_, body) = call(&app, "GET", "/api/logs?limit=5", None).await;
        assert_eq!(body["data"], json!([]));

        let (_, body) = call(&app, "POST", "/api/logs/clear", None).await;
        assert_eq!(body["success"], true);

        let (code, body) = call(&app, "POST", "/api/farm/check", None).await;
        assert_eq!(code, StatusCode::CONFLICT);
        assert_eq!(body["code"], "NotRunning");
    }
}
