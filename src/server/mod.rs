use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::error::Error;
use crate::ingest::{BatchSummary, Pipeline};
use crate::store::Store;
use crate::types::{Badge, Contribution, Goal, MonthlySummary};

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub pipeline: Arc<Pipeline>,
}

/// API error that converts to a proper HTTP response
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound => Self::not_found("not found"),
            Error::Upstream(_) | Error::Warehouse(_) => Self {
                status: StatusCode::BAD_GATEWAY,
                message: err.to_string(),
            },
            other => Self::internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "data": null, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

/// Triggers one ingestion batch and returns its summary. The pipeline is
/// blocking, so it runs on the blocking pool.
async fn run_ingest(State(state): State<Arc<AppState>>) -> Result<Json<BatchSummary>, ApiError> {
    let pipeline = state.pipeline.clone();
    let summary = tokio::task::spawn_blocking(move || pipeline.run())
        .await
        .map_err(|e| ApiError::internal(format!("ingest task failed: {e}")))??;
    Ok(Json(summary))
}

async fn list_goals(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Goal>>, ApiError> {
    Ok(Json(state.store.list_goals()?))
}

async fn user_contributions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Contribution>>, ApiError> {
    state
        .store
        .get_user(&user_id)?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    Ok(Json(state.store.list_user_contributions(&user_id)?))
}

async fn user_badges(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Badge>>, ApiError> {
    state
        .store
        .get_user(&user_id)?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    Ok(Json(state.store.list_user_badges(&user_id)?))
}

async fn monthly_summary(
    State(state): State<Arc<AppState>>,
    Path((user_id, year, month)): Path<(String, i32, u32)>,
) -> Result<Json<Vec<MonthlySummary>>, ApiError> {
    if !(1..=12).contains(&month) {
        return Err(ApiError::bad_request("month must be between 1 and 12"));
    }

    state
        .store
        .get_user(&user_id)?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    Ok(Json(
        state.store.monthly_contribution_summary(&user_id, year, month)?,
    ))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/ingest/run", post(run_ingest))
        .route("/api/v1/goals", get(list_goals))
        .route("/api/v1/users/{user_id}/contributions", get(user_contributions))
        .route("/api/v1/users/{user_id}/badges", get(user_badges))
        .route(
            "/api/v1/users/{user_id}/summary/{year}/{month}",
            get(monthly_summary),
        )
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use chrono::Utc;
    use tempfile::TempDir;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::error::Result;
    use crate::github::{RepoDetails, RepoMetadataSource};
    use crate::source::{EventSource, FetchWindow};
    use crate::store::SqliteStore;
    use crate::types::{RawEvent, User};

    struct EmptySource;

    impl EventSource for EmptySource {
        fn fetch_window(&self, _logins: &[String], _window: FetchWindow) -> Result<Vec<RawEvent>> {
            Ok(Vec::new())
        }
    }

    struct NoMetadata;

    impl RepoMetadataSource for NoMetadata {
        fn fetch_repository(&self, _repo_url: &str) -> Result<RepoDetails> {
            Err(Error::NotFound)
        }
    }

    fn test_state() -> (TempDir, Arc<AppState>) {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::new(temp.path().join("test.db")).unwrap());
        store.initialize().unwrap();

        let pipeline = Arc::new(Pipeline::new(
            store.clone(),
            Arc::new(EmptySource),
            Arc::new(NoMetadata),
        ));

        (
            temp,
            Arc::new(AppState {
                store,
                pipeline,
            }),
        )
    }

    #[tokio::test]
    async fn test_health() {
        let (_temp, state) = test_state();
        let app = create_router(state);

        let response = app
            .oneshot(HttpRequest::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_user_is_404() {
        let (_temp, state) = test_state();
        let app = create_router(state);

        let response = app
            .oneshot(
                HttpRequest::get("/api/v1/users/nope/contributions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_month_is_400() {
        let (_temp, state) = test_state();

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            github_id: 42,
            github_username: "octocat".to_string(),
            email: None,
            avatar_url: None,
            current_balance: 0,
            current_active_goal_id: None,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        state.store.create_user(&user).unwrap();
        let app = create_router(state);

        let response = app
            .oneshot(
                HttpRequest::get(format!("/api/v1/users/{}/summary/2026/13", user.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ingest_run_with_no_users_reports_empty_batch() {
        let (_temp, state) = test_state();
        let app = create_router(state);

        let response = app
            .oneshot(
                HttpRequest::post("/api/v1/ingest/run")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
