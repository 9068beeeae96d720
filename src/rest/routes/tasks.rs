// rest/routes/tasks.rs — Task CRUD routes.
//
// Thin adapters over the Task Store: decode the body, call the store, map
// the result to a status code. Storage failures become 500 with the raw
// error message as the body; undecodable bodies become 400.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use crate::store::{StoreError, Task, TaskDraft};
use crate::AppContext;

type ApiError = (StatusCode, String);

fn bad_request(rejection: JsonRejection) -> ApiError {
    (StatusCode::BAD_REQUEST, rejection.body_text())
}

fn storage_error(err: StoreError) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

pub async fn list_tasks(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = ctx.store.list().await.map_err(storage_error)?;
    Ok(Json(tasks))
}

pub async fn create_task(
    State(ctx): State<Arc<AppContext>>,
    body: Result<Json<TaskDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let Json(draft) = body.map_err(bad_request)?;
    let task = ctx.store.add(draft).await.map_err(storage_error)?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    body: Result<Json<TaskDraft>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let Json(draft) = body.map_err(bad_request)?;
    let task = ctx.store.update(&id, draft).await.map_err(storage_error)?;
    Ok(Json(task))
}

pub async fn delete_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    ctx.store.delete(&id).await.map_err(storage_error)?;
    Ok(StatusCode::NO_CONTENT)
}
