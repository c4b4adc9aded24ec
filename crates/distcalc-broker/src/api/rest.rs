use crate::Broker;
use distcalc_core::{Expression, ExpressionId, QueueError, Task, TaskReport};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// REST API routes
pub fn create_rest_api(broker: Arc<Broker>) -> Router {
    Router::new()
        .route("/api/v1/calculate", post(calculate))
        .route("/api/v1/expressions", get(list_expressions))
        .route("/api/v1/expressions/:id", get(get_expression))
        .route("/internal/task", get(claim_task).post(report_task))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(broker)
}

#[derive(Debug, Deserialize)]
struct CalculateRequest {
    expression: String,
    #[serde(default)]
    owner: u64,
}

#[derive(Debug, Serialize)]
struct CalculateResponse {
    id: ExpressionId,
}

#[derive(Debug, Deserialize)]
struct ListExpressionsQuery {
    owner: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ExpressionResponse {
    id: ExpressionId,
    owner: u64,
    expression: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    postfix: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Expression> for ExpressionResponse {
    fn from(expr: Expression) -> Self {
        let status = expr.status();
        ExpressionResponse {
            id: expr.id,
            owner: expr.owner_id,
            status: status.as_str().to_string(),
            result: status.result(),
            error: status.error().map(str::to_string),
            postfix: expr.program.to_string(),
            expression: expr.raw_text,
            created_at: expr.created_at,
            updated_at: expr.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct ExpressionsResponse {
    expressions: Vec<ExpressionResponse>,
}

#[derive(Debug, Serialize)]
struct TaskResponse {
    task: Task,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    queued_tasks: usize,
    expressions: usize,
}

/// Submit an expression for evaluation
async fn calculate(
    State(broker): State<Arc<Broker>>,
    Json(req): Json<CalculateRequest>,
) -> Result<(StatusCode, Json<CalculateResponse>), ApiError> {
    let id = broker
        .submit(&req.expression, req.owner)
        .map_err(|e| ApiError::BadRequest(format!("Invalid expression: {}", e)))?;

    Ok((StatusCode::CREATED, Json(CalculateResponse { id })))
}

async fn list_expressions(
    State(broker): State<Arc<Broker>>,
    Query(query): Query<ListExpressionsQuery>,
) -> Json<ExpressionsResponse> {
    let expressions = broker
        .list(query.owner)
        .into_iter()
        .map(ExpressionResponse::from)
        .collect();

    Json(ExpressionsResponse { expressions })
}

async fn get_expression(
    State(broker): State<Arc<Broker>>,
    Path(id): Path<ExpressionId>,
) -> Result<Json<ExpressionResponse>, ApiError> {
    let expr = broker.status(id)?;
    Ok(Json(expr.into()))
}

/// Worker poll: hand out one task
async fn claim_task(State(broker): State<Arc<Broker>>) -> Result<Json<TaskResponse>, ApiError> {
    broker
        .poll()
        .map(|task| Json(TaskResponse { task }))
        .ok_or(ApiError::NoTask)
}

/// Worker report: accept the result of a claimed task
async fn report_task(
    State(broker): State<Arc<Broker>>,
    Json(report): Json<TaskReport>,
) -> Result<Json<serde_json::Value>, ApiError> {
    broker.report(report)?;
    Ok(Json(serde_json::json!({})))
}

/// Health check endpoint
async fn health_check(State(broker): State<Arc<Broker>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        queued_tasks: broker.queue().len(),
        expressions: broker.expressions().len(),
    })
}

/// API error types
#[derive(Debug)]
enum ApiError {
    NotFound(String),
    NoTask,
    BadRequest(String),
}

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        ApiError::NotFound(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::NoTask => (StatusCode::NOT_FOUND, "No task available".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BrokerConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use distcalc_core::OperationTimes;
    use tower::ServiceExt;

    fn app() -> Router {
        let mut config = BrokerConfig::default();
        config.operations = OperationTimes::uniform(1000);
        create_rest_api(Arc::new(Broker::new(config).unwrap()))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_calculate_round_trip() {
        let app = app();

        let (status, body) = send(&app, post_json("/api/v1/calculate", serde_json::json!({"expression": "2*(3+4)"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_u64().unwrap();

        let (status, body) = send(&app, get("/internal/task")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["task"]["operation"], "+");
        assert_eq!(body["task"]["expression"], id);
        let task_id = body["task"]["id"].as_u64().unwrap();

        let (status, _) = send(&app, post_json("/internal/task", serde_json::json!({"id": task_id, "result": 7}))).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, get("/internal/task")).await;
        assert_eq!(body["task"]["operation"], "*");
        assert_eq!((body["task"]["arg1"].as_i64(), body["task"]["arg2"].as_i64()), (Some(2), Some(7)));
        let task_id = body["task"]["id"].as_u64().unwrap();
        send(&app, post_json("/internal/task", serde_json::json!({"id": task_id, "result": 14, "error": ""}))).await;

        let (status, body) = send(&app, get(&format!("/api/v1/expressions/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "done");
        assert_eq!(body["result"], 14);
    }

    #[tokio::test]
    async fn test_invalid_expression_is_bad_request() {
        let app = app();
        let (status, body) = send(&app, post_json("/api/v1/calculate", serde_json::json!({"expression": "(1+2"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid expression: mismatched parentheses");

        let (_, body) = send(&app, get("/api/v1/expressions")).await;
        assert_eq!(body["expressions"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn test_not_found_paths() {
        let app = app();
        assert_eq!(send(&app, get("/internal/task")).await.0, StatusCode::NOT_FOUND);
        assert_eq!(send(&app, get("/api/v1/expressions/9")).await.0, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, post_json("/internal/task", serde_json::json!({"id": 5, "result": 1}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_by_owner() {
        let app = app();
        send(&app, post_json("/api/v1/calculate", serde_json::json!({"expression": "1", "owner": 3}))).await;
        send(&app, post_json("/api/v1/calculate", serde_json::json!({"expression": "2", "owner": 4}))).await;

        let (_, body) = send(&app, get("/api/v1/expressions?owner=4")).await;
        let expressions = body["expressions"].as_array().unwrap();
        assert_eq!(expressions.len(), 1);
        assert_eq!(expressions[0]["result"], 2);
        assert_eq!(expressions[0]["expression"], "2");
    }
}
