use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{
    DbErr,
    models::{project::ProjectError, todo::TodoError, user::UserError},
};
use services::services::{
    ai_service::AiServiceError, auth::AuthServiceError, project::ProjectServiceError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error, ts_rs::TS)]
#[ts(type = "string")]
pub enum ApiError {
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Todo(#[from] TodoError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Auth(#[from] AuthServiceError),
    #[error(transparent)]
    AiService(#[from] AiServiceError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl From<ProjectServiceError> for ApiError {
    fn from(err: ProjectServiceError) -> Self {
        match err {
            ProjectServiceError::Validation(msg) => ApiError::BadRequest(msg),
            ProjectServiceError::MissingDocuments => ApiError::BadRequest(err.to_string()),
            ProjectServiceError::Project(err) => ApiError::Project(err),
            ProjectServiceError::Todo(err) => ApiError::Todo(err),
            ProjectServiceError::User(err) => ApiError::User(err),
            ProjectServiceError::Database(err) => ApiError::Database(err),
            ProjectServiceError::AiService(err) => ApiError::AiService(err),
        }
    }
}

impl ApiError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Project(err) => match err {
                ProjectError::ProjectNotFound => (StatusCode::NOT_FOUND, "ProjectError"),
                ProjectError::UserNotFound => (StatusCode::BAD_REQUEST, "ProjectError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "ProjectError"),
            },
            ApiError::Todo(err) => match err {
                TodoError::TodoNotFound | TodoError::ProjectNotFound => {
                    (StatusCode::NOT_FOUND, "TodoError")
                }
                TodoError::AssigneeNotMember => (StatusCode::BAD_REQUEST, "TodoError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "TodoError"),
            },
            ApiError::User(err) => match err {
                UserError::UserNotFound | UserError::RoleNotFound | UserError::SkillNotFound => {
                    (StatusCode::NOT_FOUND, "UserError")
                }
                UserError::DuplicateEmail => (StatusCode::CONFLICT, "UserError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "UserError"),
            },
            ApiError::Auth(err) => match err {
                AuthServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "AuthError"),
                AuthServiceError::DuplicateEmail => (StatusCode::CONFLICT, "AuthError"),
                AuthServiceError::UserNotFound => (StatusCode::NOT_FOUND, "AuthError"),
                AuthServiceError::WrongPassword => (StatusCode::UNAUTHORIZED, "AuthError"),
                AuthServiceError::User(
                    UserError::RoleNotFound | UserError::SkillNotFound | UserError::UserNotFound,
                ) => (StatusCode::NOT_FOUND, "AuthError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "AuthError"),
            },
            ApiError::AiService(_) => (StatusCode::BAD_GATEWAY, "AiServiceError"),
            ApiError::Database(db_err) => match db_err {
                DbErr::RecordNotFound(_) => (StatusCode::NOT_FOUND, "DatabaseError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            },
            ApiError::Multipart(_) => (StatusCode::BAD_REQUEST, "MultipartError"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "ForbiddenError"),
        }
    }

    fn user_message(&self) -> String {
        match self {
            ApiError::AiService(err) => err.user_message(),
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) | ApiError::Forbidden(msg) => {
                msg.clone()
            }
            ApiError::Internal(_) => "Internal server error".to_string(),
            ApiError::Database(DbErr::RecordNotFound(msg)) => msg.clone(),
            ApiError::Database(_) => "Database error".to_string(),
            ApiError::Project(ProjectError::Database(_))
            | ApiError::Todo(TodoError::Database(_))
            | ApiError::User(UserError::Database(_)) => "Database error".to_string(),
            ApiError::Auth(
                AuthServiceError::Database(_)
                | AuthServiceError::Hash(_)
                | AuthServiceError::Jwt(_)
                | AuthServiceError::Join(_),
            ) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = self.status_and_type();
        let error_message = self.user_message();

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
        } else {
            tracing::debug!(status = %status_code, error_type, error = %self, "API request rejected");
        }

        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}
