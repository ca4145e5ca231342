use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{parse_due_date, CreateTaskRequest},
    repo_types::{NewTask, Task},
};
use crate::{auth::extractors::AuthUser, error::AppError, state::AppState};

pub fn task_routes() -> Router<AppState> {
    Router::new().route("/api/tasks", get(list_tasks).post(create_task))
}

#[instrument(skip(state, who), fields(user_id = %who.id))]
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
) -> Result<Json<Vec<Task>>, AppError> {
    let tasks = state.tasks.list_for_user(who.id).await?;
    Ok(Json(tasks))
}

#[instrument(skip(state, who, payload), fields(user_id = %who.id))]
pub async fn create_task(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let Json(body) = payload.map_err(|_| AppError::Validation("Invalid request body".into()))?;

    let title = body.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".into()));
    }
    let due_date = match body.due_date.as_deref().map(str::trim) {
        Some("") | None => None,
        Some(raw) => Some(parse_due_date(raw)?),
    };
    let category = body
        .category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "Uncategorized".into());

    let task = state
        .tasks
        .create(NewTask {
            user_id: who.id,
            title,
            description: body.description,
            due_date,
            priority: body.priority.unwrap_or_default(),
            category,
            status: body.status.unwrap_or_default(),
        })
        .await?;

    info!(task_id = %task.id, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}
