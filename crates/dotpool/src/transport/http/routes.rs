//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::dispatcher::DispatchError;
use crate::health::Health;
use crate::matrix::Matrix;
use crate::pool::{PoolError, PoolStats};
use crate::service::{HealthSnapshot, MultiplyError, MultiplyService};
use crate::version::VersionInfo;

#[derive(Debug, Deserialize)]
pub struct MultiplyRequest {
    pub matrix1: Matrix,
    pub matrix2: Matrix,
}

#[derive(Debug, Serialize)]
pub struct MultiplyResponse {
    pub result: Matrix,
}

#[derive(Debug, Serialize)]
pub struct ChangeResponse {
    pub workers: usize,
    /// Set when the requested count exceeded the service's limit.
    pub clamped: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: Health,
    pub pool: PoolStats,
    pub version: VersionInfo,
}

impl From<HealthSnapshot> for HealthCheckResponse {
    fn from(snapshot: HealthSnapshot) -> Self {
        Self {
            status: snapshot.state,
            pool: snapshot.pool,
            version: snapshot.version,
        }
    }
}

fn error_body(status: StatusCode, body: serde_json::Value) -> Response {
    (status, Json(body)).into_response()
}

fn multiply_error_response(err: MultiplyError) -> Response {
    let status = match &err {
        MultiplyError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        MultiplyError::Dispatch(DispatchError::Cell { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
        MultiplyError::Dispatch(DispatchError::Pool(PoolError::Exhausted)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        MultiplyError::Dispatch(DispatchError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        MultiplyError::Dispatch(DispatchError::Pool(PoolError::Closed))
        | MultiplyError::Dispatch(DispatchError::Task(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::warn!(error = %err, "Multiplication failed");
    } else {
        tracing::debug!(error = %err, "Multiplication rejected");
    }

    let mut body = serde_json::json!({ "error": err.to_string() });
    if let MultiplyError::Dispatch(DispatchError::Cell { row, col, .. }) = err {
        body["cell"] = serde_json::json!([row, col]);
    }
    error_body(status, body)
}

/// The body is decoded as JSON whatever the `Content-Type` header says.
async fn multiply(State(service): State<Arc<MultiplyService>>, body: Bytes) -> Response {
    let request = match serde_json::from_slice::<MultiplyRequest>(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "Invalid multiply request body");
            return error_body(
                StatusCode::BAD_REQUEST,
                serde_json::json!({
                    "error": "Invalid request body",
                    "detail": e.to_string()
                }),
            );
        }
    };

    match service.multiply(request.matrix1, request.matrix2).await {
        Ok(result) => (StatusCode::OK, Json(MultiplyResponse { result })).into_response(),
        Err(e) => multiply_error_response(e),
    }
}

/// Worker count from the `number` query parameter, capped at `max`.
///
/// Anything that is not a non-negative integer counts as 0. The flag is true
/// when the cap was applied.
fn parse_worker_count(raw: Option<&str>, max: usize) -> (usize, bool) {
    let Some(raw) = raw else {
        tracing::warn!("No worker count supplied, using 0");
        return (0, false);
    };

    let n = match raw.trim().parse::<i64>() {
        Ok(n) if n < 0 => {
            tracing::warn!(number = n, "Negative worker count, using 0");
            return (0, false);
        }
        Ok(n) => usize::try_from(n).unwrap_or(usize::MAX),
        Err(e) => {
            tracing::warn!(number = %raw, error = %e, "Non-numeric worker count, using 0");
            return (0, false);
        }
    };

    if n > max {
        tracing::warn!(number = n, max, "Worker count clamped");
        (max, true)
    } else {
        (n, false)
    }
}

/// Repeated `number` keys resolve to the first one.
async fn change(
    State(service): State<Arc<MultiplyService>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Json<ChangeResponse> {
    let number = params
        .iter()
        .find(|(key, _)| key == "number")
        .map(|(_, value)| value.as_str());

    let (workers, clamped) = parse_worker_count(number, service.max_workers());
    service.resize_pool(workers).await;
    Json(ChangeResponse { workers, clamped })
}

async fn health_check(State(service): State<Arc<MultiplyService>>) -> Json<HealthCheckResponse> {
    Json(service.health().await.into())
}

async fn shutdown(State(service): State<Arc<MultiplyService>>) -> impl IntoResponse {
    tracing::info!("Shutdown requested via HTTP");
    service.trigger_shutdown();
    (StatusCode::OK, Json(serde_json::json!({})))
}

pub fn routes(service: Arc<MultiplyService>) -> Router {
    Router::new()
        .route("/health-check", get(health_check))
        .route("/multiply", post(multiply))
        .route("/change", get(change).post(change))
        .route("/shutdown", post(shutdown))
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceConfig;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn response_json(response: axum::response::Response) -> serde_json::Value {
        let body = response.into_body();
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn multiply_request(body: &str) -> Request<Body> {
        Request::post("/multiply")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn multiply_returns_product() {
        let app = routes(Arc::new(MultiplyService::default()));

        let response = app
            .oneshot(multiply_request(
                r#"{"matrix1":[[1,2],[3,4]],"matrix2":[[5,6],[7,8]]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        insta::assert_json_snapshot!(json, @r#"
        {
          "result": [
            [
              19,
              22
            ],
            [
              43,
              50
            ]
          ]
        }
        "#);
    }

    #[tokio::test]
    async fn multiply_rejects_other_methods() {
        let app = routes(Arc::new(MultiplyService::default()));

        let response = app
            .oneshot(Request::get("/multiply").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn multiply_rejects_malformed_body() {
        let app = routes(Arc::new(MultiplyService::default()));

        let response = app
            .oneshot(multiply_request(r#"{"matrix1": "nope"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert_eq!(json["error"], "Invalid request body");
    }

    #[tokio::test]
    async fn multiply_accepts_body_without_content_type() {
        let app = routes(Arc::new(MultiplyService::default()));

        let response = app
            .oneshot(
                Request::post("/multiply")
                    .body(Body::from(
                        r#"{"matrix1":[[1,2],[3,4]],"matrix2":[[5,6],[7,8]]}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["result"], serde_json::json!([[19, 22], [43, 50]]));
    }

    #[tokio::test]
    async fn multiply_rejects_empty_body() {
        let app = routes(Arc::new(MultiplyService::default()));

        let response = app
            .oneshot(Request::post("/multiply").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert_eq!(json["error"], "Invalid request body");
        assert!(json["detail"].is_string());
    }

    #[tokio::test]
    async fn multiply_rejects_dimension_mismatch() {
        let service = Arc::new(MultiplyService::default());
        let app = routes(Arc::clone(&service));

        let response = app
            .oneshot(multiply_request(
                r#"{"matrix1":[[1,2,3]],"matrix2":[[1],[2]]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = response_json(response).await;
        assert_eq!(json["error"], "matrix1 has 3 columns but matrix2 has 2 rows");
        assert_eq!(service.health().await.pool.completed, 0);
    }

    #[tokio::test]
    async fn multiply_reports_overflowing_cell() {
        let app = routes(Arc::new(MultiplyService::default()));
        let body = format!(r#"{{"matrix1":[[{}, 1]],"matrix2":[[2],[0]]}}"#, i64::MAX);

        let response = app.oneshot(multiply_request(&body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = response_json(response).await;
        assert_eq!(json["cell"], serde_json::json!([0, 0]));
    }

    #[tokio::test]
    async fn change_resizes_pool() {
        let service = Arc::new(MultiplyService::default());

        let response = routes(Arc::clone(&service))
            .oneshot(Request::get("/change?number=3").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["workers"], 3);
        assert_eq!(json["clamped"], false);
        assert_eq!(service.pool().await.capacity(), 3);

        let response = routes(service)
            .oneshot(multiply_request(
                r#"{"matrix1":[[1,2],[3,4]],"matrix2":[[5,6],[7,8]]}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn change_with_non_numeric_value_degenerates_pool() {
        let service = Arc::new(MultiplyService::default());

        let response = routes(Arc::clone(&service))
            .oneshot(
                Request::post("/change?number=lots")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["workers"], 0);

        let response = routes(Arc::clone(&service))
            .oneshot(multiply_request(
                r#"{"matrix1":[[1,2],[3,4]],"matrix2":[[5,6],[7,8]]}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = routes(service)
            .oneshot(Request::get("/health-check").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response_json(response).await["status"], "DEGENERATE");
    }

    #[tokio::test]
    async fn change_uses_first_number_when_repeated() {
        let service = Arc::new(MultiplyService::default());

        let response = routes(Arc::clone(&service))
            .oneshot(
                Request::get("/change?number=2&number=3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["workers"], 2);
        assert_eq!(service.pool().await.capacity(), 2);
    }

    #[tokio::test]
    async fn change_without_number_degenerates_pool() {
        let service = Arc::new(MultiplyService::default());

        let response = routes(Arc::clone(&service))
            .oneshot(Request::get("/change?other=5").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["workers"], 0);
        assert!(service.pool().await.is_degenerate());
    }

    #[tokio::test]
    async fn change_reports_clamped_count() {
        let service = Arc::new(MultiplyService::new(ServiceConfig {
            max_workers: 16,
            ..ServiceConfig::default()
        }));

        let response = routes(Arc::clone(&service))
            .oneshot(Request::get("/change?number=5000").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        insta::assert_json_snapshot!(json, @r#"
        {
          "clamped": true,
          "workers": 16
        }
        "#);
        assert_eq!(service.pool().await.capacity(), 16);
    }

    #[test]
    fn worker_count_parsing() {
        assert_eq!(parse_worker_count(Some("12"), 64), (12, false));
        assert_eq!(parse_worker_count(Some("+4"), 64), (4, false));
        assert_eq!(parse_worker_count(Some(" 7 "), 64), (7, false));
        assert_eq!(parse_worker_count(Some("-2"), 64), (0, false));
        assert_eq!(parse_worker_count(Some("ten"), 64), (0, false));
        assert_eq!(parse_worker_count(Some(""), 64), (0, false));
        assert_eq!(parse_worker_count(None, 64), (0, false));
        assert_eq!(parse_worker_count(Some("64"), 64), (64, false));
        assert_eq!(parse_worker_count(Some("1000000"), 64), (64, true));
    }

    #[tokio::test]
    async fn health_check_reports_pool() {
        let app = routes(Arc::new(MultiplyService::default()));

        let response = app
            .oneshot(Request::get("/health-check").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["status"], "READY");
        assert_eq!(json["pool"]["capacity"], 10);
        assert_eq!(json["pool"]["available"], 10);
        assert!(json["version"]["dotpool"].is_string());
    }

    #[tokio::test]
    async fn health_check_busy_when_all_workers_leased() {
        let service = Arc::new(MultiplyService::default());
        let pool = service.resize_pool(1).await;
        let _held = pool.acquire().await.unwrap();

        let response = routes(service)
            .oneshot(Request::get("/health-check").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json = response_json(response).await;
        assert_eq!(json["status"], "BUSY");
        assert_eq!(json["pool"]["in_use"], 1);
    }

    #[tokio::test]
    async fn shutdown_triggers_service_shutdown() {
        let service = Arc::new(MultiplyService::default());
        let mut rx = service.shutdown_rx();
        let app = routes(service);

        assert!(!*rx.borrow());

        let response = app
            .oneshot(Request::post("/shutdown").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }
}
