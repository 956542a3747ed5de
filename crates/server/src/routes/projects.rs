use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::{
    models::{
        project::{Project, ProjectError, UpdateProject},
        todo::{CreateTodo, Todo, TodoWithAssignee},
        user::User,
    },
    types::TodoStatus,
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::{
    ai_service::{AnalyzeDocument, Graph},
    project::CreateProjectRequest,
};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::load_project_middleware};

/// Upper bound for the multipart body of a new project.
const CREATE_PROJECT_BODY_LIMIT: usize = 50 * 1024 * 1024;

#[derive(Debug, Serialize, TS)]
pub struct CreateProjectResponse {
    pub project: Project,
    pub todos: Vec<Todo>,
}

#[derive(Debug, Deserialize, TS)]
pub struct InviteMembers {
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, TS)]
pub struct ToggleAllTodos {
    pub completed: bool,
}

/// Accepts `user_ids` either as one id per part or as a JSON array.
fn parse_user_ids(value: &str) -> Result<Vec<Uuid>, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(Vec::new());
    }
    if value.starts_with('[') {
        return serde_json::from_str(value)
            .map_err(|_| ApiError::BadRequest("Invalid user_ids".to_string()));
    }
    value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            Uuid::parse_str(id).map_err(|_| ApiError::BadRequest(format!("Invalid user id: {id}")))
        })
        .collect()
}

async fn read_create_project_form(
    mut multipart: Multipart,
) -> Result<CreateProjectRequest, ApiError> {
    let mut request = CreateProjectRequest {
        name: String::new(),
        description: String::new(),
        member_ids: Vec::new(),
        documents: Vec::new(),
    };

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "name" => request.name = field.text().await?.trim().to_string(),
            "description" => request.description = field.text().await?.trim().to_string(),
            "user_ids" | "user_ids[]" => {
                let ids = parse_user_ids(&field.text().await?)?;
                request.member_ids.extend(ids);
            }
            "files" | "files[]" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                if file_name.is_empty() || bytes.is_empty() {
                    continue;
                }
                request.documents.push(AnalyzeDocument {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            other => tracing::debug!("Ignoring unknown create-project field {other}"),
        }
    }

    Ok(request)
}

pub async fn get_my_projects(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
) -> Result<ResponseJson<ApiResponse<Vec<Project>>>, ApiError> {
    let projects = Project::find_for_user(&deployment.db().pool, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(projects)))
}

pub async fn create_project(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
    multipart: Multipart,
) -> Result<ResponseJson<ApiResponse<CreateProjectResponse>>, ApiError> {
    let request = read_create_project_form(multipart).await?;
    let (project, todos) = deployment
        .project()
        .create_with_analysis(&deployment.db().pool, &user, request)
        .await?;

    tracing::info!(
        project_id = %project.id,
        created_by = %user.id,
        todos = todos.len(),
        "project created"
    );
    Ok(ResponseJson(ApiResponse::success(CreateProjectResponse {
        project,
        todos,
    })))
}

pub async fn get_project(
    Extension(project): Extension<Project>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn update_project(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    if payload
        .name
        .as_deref()
        .is_some_and(|name| name.trim().is_empty())
    {
        return Err(ApiError::BadRequest("Project name is required".to_string()));
    }
    let project = Project::update(&deployment.db().pool, project.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn delete_project(
    Extension(project): Extension<Project>,
    Extension(user): Extension<User>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected = Project::delete(&deployment.db().pool, project.id).await?;
    if rows_affected == 0 {
        return Err(ProjectError::ProjectNotFound.into());
    }
    tracing::info!(project_id = %project.id, deleted_by = %user.id, "project deleted");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn get_members(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<User>>>, ApiError> {
    let members = Project::members(&deployment.db().pool, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(members)))
}

pub async fn invite_members(
    Extension(project): Extension<Project>,
    Extension(user): Extension<User>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<InviteMembers>,
) -> Result<ResponseJson<ApiResponse<Vec<User>>>, ApiError> {
    let pool = &deployment.db().pool;
    let added = Project::add_members(pool, project.id, &payload.user_ids).await?;
    tracing::info!(
        project_id = %project.id,
        invited_by = %user.id,
        added,
        "members invited"
    );
    let members = Project::members(pool, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(members)))
}

pub async fn sync_tasks(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Todo>>>, ApiError> {
    let created = deployment
        .project()
        .sync_tasks(&deployment.db().pool, &project)
        .await?;
    Ok(ResponseJson(ApiResponse::success(created)))
}

pub async fn get_graph(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Graph>>, ApiError> {
    let graph = deployment
        .project()
        .graph(&deployment.db().pool, &project)
        .await?;
    Ok(ResponseJson(ApiResponse::success(graph)))
}

pub async fn get_todos(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<TodoWithAssignee>>>, ApiError> {
    let todos = Todo::find_by_project(&deployment.db().pool, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(todos)))
}

pub async fn create_todo(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateTodo>,
) -> Result<ResponseJson<ApiResponse<Todo>>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Todo name is required".to_string()));
    }
    let todo = Todo::create(&deployment.db().pool, project.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(todo)))
}

pub async fn toggle_all_todos(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<ToggleAllTodos>,
) -> Result<ResponseJson<ApiResponse<Vec<TodoWithAssignee>>>, ApiError> {
    let status = if payload.completed {
        TodoStatus::Completed
    } else {
        TodoStatus::Pending
    };
    let pool = &deployment.db().pool;
    Todo::set_status_for_project(pool, project.id, status).await?;
    let todos = Todo::find_by_project(pool, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(todos)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let project_id_router = Router::new()
        .route(
            "/",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/members", get(get_members).post(invite_members))
        .route("/sync", post(sync_tasks))
        .route("/graph", get(get_graph))
        .route("/todos", get(get_todos).post(create_todo))
        .route("/todos/toggle-all", post(toggle_all_todos))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_project_middleware::<DeploymentImpl>,
        ));

    let projects_router = Router::new()
        .route(
            "/",
            get(get_my_projects)
                .post(create_project)
                .layer(DefaultBodyLimit::max(CREATE_PROJECT_BODY_LIMIT)),
        )
        .nest("/{id}", project_id_router);

    Router::new().nest("/projects", projects_router)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::test_support::{
        AiStub, MultipartBody, json_body, register_user, request, setup_deployment,
    };

    #[test]
    fn user_ids_accept_json_arrays_and_plain_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(
            parse_user_ids(&format!("[\"{a}\",\"{b}\"]")).unwrap(),
            vec![a, b]
        );
        assert_eq!(parse_user_ids(&format!(" {a} ")).unwrap(), vec![a]);
        assert_eq!(parse_user_ids(&format!("{a},{b}")).unwrap(), vec![a, b]);
        assert!(parse_user_ids("").unwrap().is_empty());
        assert!(parse_user_ids("nope").is_err());
    }

    #[tokio::test]
    async fn create_project_imports_tasks_and_relabels_graph() {
        let ai_url = AiStub::default().spawn().await;
        let (_env_guard, deployment) = setup_deployment(&ai_url).await;
        let (owner, token) = register_user(&deployment, "owner@example.com").await;
        let (teammate, _) = register_user(&deployment, "mate@example.com").await;
        let app = crate::http::router(deployment);

        let response = app
            .clone()
            .oneshot(
                MultipartBody::new()
                    .text("name", "Apollo")
                    .text("description", "Moon landing")
                    .text("user_ids", &json!([teammate.id]).to_string())
                    .file("files", "brief.txt", b"Build a rocket")
                    .file("files", "", b"")
                    .into_request("/api/projects", &token),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        let project_id = json["data"]["project"]["id"].as_str().unwrap().to_string();
        let todos = json["data"]["todos"].as_array().unwrap();
        assert_eq!(todos.len(), 2);
        assert!(todos.iter().all(|todo| todo["status"] == "in_progress"));
        assert!(todos.iter().all(|todo| todo["priority"] == "high"));

        let response = app
            .clone()
            .oneshot(request(
                "GET",
                &format!("/api/projects/{project_id}/todos"),
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        let json = json_body(response).await;
        let mut emails: Vec<&str> = json["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|todo| todo["assignee_email"].as_str().unwrap())
            .collect();
        emails.sort();
        assert_eq!(emails, vec!["mate@example.com", "owner@example.com"]);

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                &format!("/api/projects/{project_id}/sync"),
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        assert!(json_body(response).await["data"].as_array().unwrap().is_empty());

        let response = app
            .clone()
            .oneshot(request(
                "GET",
                &format!("/api/projects/{project_id}/graph"),
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        let json = json_body(response).await;
        let nodes = json["data"]["nodes"].as_array().unwrap();
        assert_eq!(nodes[0]["label"], "Apollo");
        assert_eq!(nodes[0]["properties"]["name"], "Apollo");
        let mut labels: Vec<&str> = nodes[1..]
            .iter()
            .map(|node| node["label"].as_str().unwrap())
            .collect();
        labels.sort();
        let mut expected = vec![owner.full_name(), teammate.full_name()];
        expected.sort();
        assert_eq!(labels, expected);

        let response = app
            .oneshot(request("GET", "/api/projects", Some(&token), None))
            .await
            .unwrap();
        let json = json_body(response).await;
        assert_eq!(json["data"].as_array().unwrap().len(), 1);
        assert_eq!(json["data"][0]["name"], "Apollo");
    }

    #[tokio::test]
    async fn create_project_requires_documents() {
        let ai_url = AiStub::default().spawn().await;
        let (_env_guard, deployment) = setup_deployment(&ai_url).await;
        let (_owner, token) = register_user(&deployment, "owner@example.com").await;
        let app = crate::http::router(deployment);

        let response = app
            .oneshot(
                MultipartBody::new()
                    .text("name", "Empty")
                    .text("description", "")
                    .into_request("/api/projects", &token),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["message"],
            "At least one document is required"
        );
    }

    #[tokio::test]
    async fn failed_analysis_removes_project_and_reports_bad_gateway() {
        let ai_url = AiStub {
            fail_analyze: true,
            ..Default::default()
        }
        .spawn()
        .await;
        let (_env_guard, deployment) = setup_deployment(&ai_url).await;
        let (owner, token) = register_user(&deployment, "owner@example.com").await;
        let app = crate::http::router(deployment.clone());

        let response = app
            .oneshot(
                MultipartBody::new()
                    .text("name", "Doomed")
                    .text("description", "")
                    .file("files", "brief.txt", b"content")
                    .into_request("/api/projects", &token),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(response).await["message"], "Processing failed");

        let projects = Project::find_for_user(&deployment.db().pool, owner.id)
            .await
            .unwrap();
        assert!(projects.is_empty());
    }

    #[tokio::test]
    async fn members_todos_and_access_control() {
        let ai_url = AiStub::default().spawn().await;
        let (_env_guard, deployment) = setup_deployment(&ai_url).await;
        let (_owner, token) = register_user(&deployment, "owner@example.com").await;
        let (guest, guest_token) = register_user(&deployment, "guest@example.com").await;
        let app = crate::http::router(deployment);

        let response = app
            .clone()
            .oneshot(
                MultipartBody::new()
                    .text("name", "Hermes")
                    .text("description", "")
                    .file("files", "brief.txt", b"content")
                    .into_request("/api/projects", &token),
            )
            .await
            .unwrap();
        let project_id = json_body(response).await["data"]["project"]["id"]
            .as_str()
            .unwrap()
            .to_string();
        let base = format!("/api/projects/{project_id}");

        let response = app
            .clone()
            .oneshot(request("GET", &base, Some(&guest_token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            json_body(response).await["message"],
            "You are not a member of this project"
        );

        let response = app
            .clone()
            .oneshot(request(
                "GET",
                &format!("/api/projects/{}", Uuid::new_v4()),
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                &format!("{base}/todos"),
                Some(&token),
                Some(json!({ "name": "Write docs", "role": "Writer", "user_id": guest.id })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(request(
                    "POST",
                    &format!("{base}/members"),
                    Some(&token),
                    Some(json!({ "user_ids": [guest.id] })),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(json_body(response).await["data"].as_array().unwrap().len(), 2);
        }

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                &format!("{base}/todos"),
                Some(&guest_token),
                Some(json!({
                    "name": "Write docs",
                    "role": "Writer",
                    "user_id": guest.id,
                    "priority": "medium"
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["data"]["status"], "pending");
        assert_eq!(json["data"]["priority"], "medium");
        let todo_id = json["data"]["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(request(
                "PUT",
                &format!("/api/todos/{todo_id}/status"),
                Some(&token),
                Some(json!({ "status": "completed" })),
            ))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["data"]["status"], "completed");

        let response = app
            .clone()
            .oneshot(request(
                "PUT",
                &format!("/api/todos/{todo_id}/priority"),
                Some(&token),
                Some(json!({ "priority": "low" })),
            ))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["data"]["priority"], "low");

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                &format!("{base}/todos/toggle-all"),
                Some(&token),
                Some(json!({ "completed": false })),
            ))
            .await
            .unwrap();
        let json = json_body(response).await;
        let todos = json["data"].as_array().unwrap();
        assert_eq!(todos.len(), 2);
        assert!(todos.iter().all(|todo| todo["status"] == "pending"));

        let response = app
            .clone()
            .oneshot(request(
                "DELETE",
                &format!("/api/todos/{todo_id}"),
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request(
                "PUT",
                &base,
                Some(&token),
                Some(json!({ "name": "Hermes II" })),
            ))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["data"]["name"], "Hermes II");

        let response = app
            .clone()
            .oneshot(request("DELETE", &base, Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request("GET", "/api/projects", Some(&token), None))
            .await
            .unwrap();
        assert!(json_body(response).await["data"].as_array().unwrap().is_empty());
    }
}
