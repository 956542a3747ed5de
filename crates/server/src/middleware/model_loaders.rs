use std::{fmt::Display, future::Future};

use axum::{
    Extension,
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use db::{
    DBService,
    models::{project::Project, todo::Todo, user::User},
};
use deployment::Deployment;
use uuid::Uuid;

use crate::error::ApiError;

pub trait ModelLoaderDeps {
    fn db_service(&self) -> &DBService;
}

impl<D> ModelLoaderDeps for D
where
    D: Deployment,
{
    fn db_service(&self) -> &DBService {
        self.db()
    }
}

async fn fetch_model_or_error<M, E, Fut>(
    model_name: &'static str,
    model_id: Uuid,
    load_future: Fut,
) -> Result<M, ApiError>
where
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    match load_future.await {
        Ok(Some(model)) => Ok(model),
        Ok(None) => {
            tracing::warn!("{model_name} {model_id} not found");
            Err(ApiError::NotFound(format!("{model_name} not found")))
        }
        Err(error) => {
            tracing::error!("Failed to fetch {model_name} {model_id}: {error}");
            Err(ApiError::Internal(format!("failed to load {model_name}")))
        }
    }
}

/// Rejects users that are not members of `project_id`.
async fn ensure_member(
    db: &DBService,
    project_id: Uuid,
    user: &User,
) -> Result<(), ApiError> {
    if Project::is_member(&db.pool, project_id, user.id).await? {
        return Ok(());
    }
    tracing::warn!(
        project_id = %project_id,
        user_id = %user.id,
        "Rejected access to project by non-member"
    );
    Err(ApiError::Forbidden(
        "You are not a member of this project".to_string(),
    ))
}

pub async fn load_project_middleware<S>(
    State(deployment): State<S>,
    Path(project_id): Path<Uuid>,
    Extension(user): Extension<User>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    let db = deployment.db_service();
    let project = fetch_model_or_error(
        "Project",
        project_id,
        Project::find_by_id(&db.pool, project_id),
    )
    .await?;
    ensure_member(db, project.id, &user).await?;

    request.extensions_mut().insert(project);
    Ok(next.run(request).await)
}

pub async fn load_todo_middleware<S>(
    State(deployment): State<S>,
    Path(todo_id): Path<Uuid>,
    Extension(user): Extension<User>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    let db = deployment.db_service();
    let todo = fetch_model_or_error("Todo", todo_id, Todo::find_by_id(&db.pool, todo_id)).await?;
    ensure_member(db, todo.project_id, &user).await?;

    request.extensions_mut().insert(todo);
    Ok(next.run(request).await)
}
