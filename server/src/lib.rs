//! HTTP/JSON todo service backed by SQLite.
//!
//! # Overview
//! Four CRUD endpoints under `/api/todos` plus `GET /health`. Each handler
//! validates its input, runs one store operation and maps the outcome to a
//! status code. Nothing is cached between requests; the `todos` table is the
//! only state.
//!
//! # Design
//! - The `TodoStore` is router state, created by the caller and closed by
//!   the caller once `run` returns.
//! - Unknown paths and unsupported methods both answer 404.
//! - Panics inside a handler become a generic 500.

pub mod config;
pub mod cors;
pub mod error;
pub mod extract;
pub mod model;
pub mod store;

use std::{any::Any, future::Future, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

pub use config::Config;
pub use error::{ApiError, ErrorBody};
pub use model::{NewTodo, Todo, TodoPatch};
pub use store::{StoreError, TodoStore};

use cors::OriginPolicy;
use extract::JsonBody;

/// Routes listed in the startup log.
pub const ENDPOINTS: [&str; 5] = [
    "GET    /api/todos",
    "POST   /api/todos",
    "PUT    /api/todos/{id}",
    "DELETE /api/todos/{id}",
    "GET    /health",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub message: String,
}

pub fn app(store: TodoStore, allowed_origins: &[String]) -> Router {
    let policy = Arc::new(OriginPolicy::new(allowed_origins));
    Router::new()
        .route(
            "/api/todos",
            get(list_todos).post(create_todo).fallback(endpoint_not_found),
        )
        .route(
            "/api/todos/{id}",
            put(update_todo).delete(delete_todo).fallback(endpoint_not_found),
        )
        .route("/health", get(health).fallback(endpoint_not_found))
        .fallback(endpoint_not_found)
        .with_state(store)
        .layer(policy.cors_layer())
        .layer(middleware::from_fn_with_state(policy, cors::reject_unlisted))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
}

/// Serves `app` until `shutdown` resolves, then drains open connections.
pub async fn run<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
    tracing::info!("shutting down gracefully");
}

async fn list_todos(State(store): State<TodoStore>) -> Result<Json<Vec<Todo>>, ApiError> {
    Ok(Json(store.list().await?))
}

async fn create_todo(
    State(store): State<TodoStore>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<Todo>), ApiError> {
    let new = NewTodo::from_json(&body)?;
    let todo = store.create(new).await?;
    Ok((StatusCode::CREATED, Json(todo)))
}

async fn update_todo(
    State(store): State<TodoStore>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<Json<Todo>, ApiError> {
    let id = model::parse_id(&id)?;
    let patch = TodoPatch::from_json(&body)?;
    let empty = patch.is_empty();

    let todo = store.update(id, patch).await?.ok_or(ApiError::NotFound)?;
    if empty {
        return Err(ApiError::Validation("No valid fields to update".into()));
    }
    tracing::debug!(id, completed = todo.completed, "todo updated");
    Ok(Json(todo))
}

async fn delete_todo(
    State(store): State<TodoStore>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = model::parse_id(&id)?;
    if !store.delete(id).await? {
        return Err(ApiError::NotFound);
    }
    tracing::debug!(id, "todo deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "OK".to_string(),
        message: "Todo API is running".to_string(),
    })
}

async fn endpoint_not_found() -> ApiError {
    ApiError::RouteNotFound
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    tracing::error!(panic = detail, "unhandled error while handling request");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new("Internal server error")),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn boom() -> &'static str {
        panic!("secret detail")
    }

    #[tokio::test]
    async fn panics_become_generic_500() {
        let app = Router::new()
            .route("/boom", get(boom))
            .layer(CatchPanicLayer::custom(handle_panic));

        let resp = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({"error": "Internal server error"}));
    }
}
