//! API routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;

use tickler_scheduler::{Job, JobId, Scheduler, SchedulerError};

use crate::WebError;

/// Shared state for the API server.
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
}

/// Body of `POST /jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobRequest {
    #[serde(default)]
    pub description: String,
    pub execute_at: DateTime<Utc>,
}

/// Create the API router.
pub fn create_router(scheduler: Arc<Scheduler>) -> Router {
    let state = Arc::new(AppState { scheduler });

    Router::new()
        .route("/jobs", get(list_jobs).post(create_job))
        .route("/jobs/{id}", get(get_job).delete(cancel_job))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn create_job(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateJobRequest>, JsonRejection>,
) -> Result<Json<Job>, WebError> {
    let Json(request) = payload.map_err(|e| WebError::BadRequest(e.body_text()))?;

    let job = state
        .scheduler
        .create_job(request.description, request.execute_at)
        .await?;

    Ok(Json(job))
}

async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<Job>> {
    Json(state.scheduler.get_jobs().await)
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Job>, WebError> {
    let id: JobId = id.parse()?;
    Ok(Json(state.scheduler.get_job(&id).await?))
}

/// Unknown ids are a client error here, not a 404.
async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, WebError> {
    let result = match id.parse::<JobId>() {
        Ok(id) => state.scheduler.cancel_job(&id).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => Ok(StatusCode::NO_CONTENT),
        Err(e @ SchedulerError::JobNotFound(_)) => Err(WebError::BadRequest(e.to_string())),
        Err(e) => Err(e.into()),
    }
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": if state.scheduler.is_shutting_down() { "shutting_down" } else { "ok" },
        "jobs": state.scheduler.job_count().await,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use chrono::Duration as ChronoDuration;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use tickler_scheduler::{JobStatus, SchedulerConfig};
    use tower::ServiceExt;

    fn test_scheduler() -> Arc<Scheduler> {
        Arc::new(Scheduler::with_config(SchedulerConfig {
            work_duration: Duration::from_millis(20),
        }))
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    fn post_job(body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/jobs")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(body).unwrap()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn delete(uri: &str) -> Request<Body> {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_job() {
        let scheduler = test_scheduler();
        let at = Utc::now() + ChronoDuration::hours(1);

        let (status, json) = send(
            create_router(Arc::clone(&scheduler)),
            post_job(&json!({ "description": "Test Job", "execute_at": at })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["description"], "Test Job");
        assert_eq!(json["status"], "scheduled");
        assert!(json.get("executed_at").is_none());

        let id: JobId = json["id"].as_str().unwrap().parse().unwrap();
        assert_eq!(scheduler.get_job(&id).await.unwrap().execute_at, at);
    }

    #[tokio::test]
    async fn test_create_job_without_description() {
        let scheduler = test_scheduler();
        let at = Utc::now() + ChronoDuration::hours(1);

        let (status, json) = send(
            create_router(Arc::clone(&scheduler)),
            post_job(&json!({ "execute_at": at })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["description"], "");
        assert_eq!(json["status"], "scheduled");
        assert_eq!(scheduler.job_count().await, 1);
    }

    #[tokio::test]
    async fn test_create_job_in_past_is_bad_request() {
        let scheduler = test_scheduler();
        let at = Utc::now() - ChronoDuration::hours(1);

        let (status, json) = send(
            create_router(Arc::clone(&scheduler)),
            post_job(&json!({ "description": "Past Job", "execute_at": at })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("future"));
        assert_eq!(scheduler.job_count().await, 0);
    }

    #[tokio::test]
    async fn test_create_job_malformed_body_is_bad_request() {
        let router = create_router(test_scheduler());

        let (status, json) = send(
            router.clone(),
            post_job(&json!({ "description": "No time" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());

        let request = Request::builder()
            .method("POST")
            .uri("/jobs")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _) = send(router.clone(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            router,
            post_job(&json!({ "description": "Bad time", "execute_at": "tomorrow" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_jobs() {
        let scheduler = test_scheduler();
        let router = create_router(Arc::clone(&scheduler));

        let (status, json) = send(router.clone(), get("/jobs")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!([]));

        for i in 1..=2 {
            scheduler
                .create_job(format!("Job {i}"), Utc::now() + ChronoDuration::hours(i))
                .await
                .unwrap();
        }

        let (status, json) = send(router, get("/jobs")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_job() {
        let scheduler = test_scheduler();
        let job = scheduler
            .create_job("Get Job".to_string(), Utc::now() + ChronoDuration::hours(1))
            .await
            .unwrap();

        let (status, json) = send(
            create_router(scheduler),
            get(&format!("/jobs/{}", job.id)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["id"], job.id.to_string());
        assert_eq!(json["description"], "Get Job");
    }

    #[tokio::test]
    async fn test_get_unknown_job_is_not_found() {
        let router = create_router(test_scheduler());

        let (status, _) = send(router.clone(), get(&format!("/jobs/{}", JobId::new()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(router, get("/jobs/invalid-id")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_job() {
        let scheduler = test_scheduler();
        let job = scheduler
            .create_job("Delete Job".to_string(), Utc::now() + ChronoDuration::hours(1))
            .await
            .unwrap();
        let router = create_router(Arc::clone(&scheduler));

        let (status, body) = send(router.clone(), delete(&format!("/jobs/{}", job.id))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let (status, _) = send(router, get(&format!("/jobs/{}", job.id))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_unknown_job_is_bad_request() {
        let router = create_router(test_scheduler());

        let (status, json) = send(router.clone(), delete(&format!("/jobs/{}", JobId::new()))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("not found"));

        let (status, _) = send(router, delete("/jobs/non-existent-id")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_executed_job_is_bad_request() {
        let scheduler = test_scheduler();
        let job = scheduler
            .create_job("Quick".to_string(), Utc::now() + ChronoDuration::milliseconds(20))
            .await
            .unwrap();

        for _ in 0..100 {
            if scheduler.get_job(&job.id).await.unwrap().status == JobStatus::Executed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let router = create_router(Arc::clone(&scheduler));
        let (status, json) = send(router.clone(), get(&format!("/jobs/{}", job.id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "executed");
        assert!(json["executed_at"].is_string());

        let (status, _) = send(router, delete(&format!("/jobs/{}", job.id))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let scheduler = test_scheduler();
        scheduler
            .create_job("One".to_string(), Utc::now() + ChronoDuration::hours(1))
            .await
            .unwrap();

        let (status, json) = send(create_router(scheduler), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["jobs"], 1);
    }

    #[tokio::test]
    async fn test_create_after_shutdown_is_unavailable() {
        let scheduler = test_scheduler();
        scheduler.shutdown().await;

        let (status, _) = send(
            create_router(scheduler),
            post_job(&json!({
                "description": "Late",
                "execute_at": Utc::now() + ChronoDuration::hours(1)
            })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
