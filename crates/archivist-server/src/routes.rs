use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use archivist_core::task::TaskStatus;
use archivist_core::task_queue::TaskQueue;
use archivist_core::traits::EntryStore;
use archivist_core::{ArchiveRequest, TaskResponse as ConsumerResponse};

use crate::auth::require_api_key;
use crate::dto::{
    ArchiveOutcomeResponse, ArchiveTaskPayload, EntryRequest, EntryResponse, ErrorResponse,
    HealthResponse, ListTasksQuery, PutEntryResponse, TaskListResponse, TaskResponse,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Entry bodies carry a title and a link list; anything larger is a client bug.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/tasks/archive", post(archive_task))
        .route("/v1/entries/{id}", put(put_entry))
        .route("/v1/entries/{id}", get(get_entry))
        .route("/v1/tasks", get(list_tasks))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

// ---------------------------------------------------------------------------
// Archive consumer
// ---------------------------------------------------------------------------

/// Deliver one archive task.
///
/// A 200 tells the task system the task is finished, whatever the outcome.
/// A 503 asks for redelivery.
#[utoipa::path(
    post,
    path = "/tasks/archive",
    request_body = ArchiveTaskPayload,
    responses(
        (status = 200, description = "Task finished", body = ArchiveOutcomeResponse),
        (status = 400, description = "Malformed payload"),
        (status = 401, description = "Unauthorized"),
        (status = 503, description = "Redeliver later", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "archive"
)]
pub async fn archive_task(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<ArchiveTaskPayload>,
) -> impl IntoResponse {
    let request = ArchiveRequest::from(body);

    match state.consumer().handle(&request).await {
        ConsumerResponse::Done(outcome) => {
            axum::Json(ArchiveOutcomeResponse::from(outcome)).into_response()
        }
        ConsumerResponse::Redeliver { reason } => {
            let body = ErrorResponse {
                error: "redeliver".to_string(),
                message: reason,
            };
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(body)).into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Save an entry and enqueue archive tasks for its new links.
#[utoipa::path(
    put,
    path = "/v1/entries/{id}",
    params(
        ("id" = String, Path, description = "Entry ID")
    ),
    request_body = EntryRequest,
    responses(
        (status = 200, description = "Entry saved", body = PutEntryResponse),
        (status = 400, description = "Malformed body"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "entries"
)]
pub async fn put_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    axum::Json(body): axum::Json<EntryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state.db.entry_repo().upsert_entry(body.into_entry(id)).await?;
    let enqueued = state.dispatcher().dispatch(&entry).await?;

    // Re-read so the response shows the claim flags set by dispatch.
    let entry = state
        .db
        .entry_repo()
        .get_entry(&entry.id)
        .await?
        .unwrap_or(entry);

    let response = PutEntryResponse {
        entry: EntryResponse::from(entry),
        enqueued: enqueued.into_iter().map(ArchiveTaskPayload::from).collect(),
    };

    Ok(axum::Json(response))
}

#[utoipa::path(
    get,
    path = "/v1/entries/{id}",
    params(
        ("id" = String, Path, description = "Entry ID")
    ),
    responses(
        (status = 200, description = "Entry with link archive state", body = EntryResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "entries"
)]
pub async fn get_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state.db.entry_repo().get_entry(&id).await?;

    match entry {
        Some(entry) => Ok(axum::Json(EntryResponse::from(entry)).into_response()),
        None => {
            let body = ErrorResponse {
                error: "not_found".to_string(),
                message: format!("Entry not found: {id}"),
            };
            Ok((StatusCode::NOT_FOUND, axum::Json(body)).into_response())
        }
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/tasks",
    params(ListTasksQuery),
    responses(
        (status = 200, description = "List of archive tasks", body = TaskListResponse),
        (status = 400, description = "Unknown status filter", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTasksQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status_filter = match query.status.map(|s| s.parse::<TaskStatus>()).transpose() {
        Ok(filter) => filter,
        Err(message) => {
            let body = ErrorResponse {
                error: "validation_error".to_string(),
                message,
            };
            return Ok((StatusCode::BAD_REQUEST, axum::Json(body)).into_response());
        }
    };

    let limit = query.limit.unwrap_or(20).min(100);
    let tasks = state.db.task_repo().list_tasks(status_filter, limit).await?;
    let total = tasks.len();

    let response = TaskListResponse {
        tasks: tasks.into_iter().map(TaskResponse::from).collect(),
        total,
    };

    Ok(axum::Json(response).into_response())
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_status = match state.db.health_check().await {
        Ok(()) => "ok",
        Err(_) => "error",
    };

    let status = if db_status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if db_status == "ok" {
            "healthy"
        } else {
            "unhealthy"
        },
        database: db_status,
    };

    (status, axum::Json(response))
}
