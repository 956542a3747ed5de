use axum::{
    Extension, Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{delete, put},
};
use db::{
    models::todo::{Todo, TodoError},
    types::{TodoPriority, TodoStatus},
};
use deployment::Deployment;
use serde::Deserialize;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::load_todo_middleware};

#[derive(Debug, Deserialize, TS)]
pub struct SetTodoStatus {
    pub status: TodoStatus,
}

#[derive(Debug, Deserialize, TS)]
pub struct SetTodoPriority {
    pub priority: TodoPriority,
}

pub async fn delete_todo(
    Extension(todo): Extension<Todo>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected = Todo::delete(&deployment.db().pool, todo.id).await?;
    if rows_affected == 0 {
        return Err(TodoError::TodoNotFound.into());
    }
    tracing::info!(todo_id = %todo.id, project_id = %todo.project_id, "todo deleted");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn set_todo_status(
    Extension(todo): Extension<Todo>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<SetTodoStatus>,
) -> Result<ResponseJson<ApiResponse<Todo>>, ApiError> {
    let todo = Todo::set_status(&deployment.db().pool, todo.id, payload.status).await?;
    Ok(ResponseJson(ApiResponse::success(todo)))
}

pub async fn set_todo_priority(
    Extension(todo): Extension<Todo>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<SetTodoPriority>,
) -> Result<ResponseJson<ApiResponse<Todo>>, ApiError> {
    let todo = Todo::set_priority(&deployment.db().pool, todo.id, payload.priority).await?;
    Ok(ResponseJson(ApiResponse::success(todo)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let todo_id_router = Router::new()
        .route("/", delete(delete_todo))
        .route("/status", put(set_todo_status))
        .route("/priority", put(set_todo_priority))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_todo_middleware::<DeploymentImpl>,
        ));

    Router::new().nest("/todos/{todo_id}", todo_id_router)
}
