use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{delete, get},
};
use db::models::{
    role::{CreateRole, Role},
    skill::{CreateSkill, Skill},
    user::User,
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct SkillQuery {
    /// Comma separated skill ids to leave out.
    #[serde(default)]
    pub id_not_in: Option<String>,
}

#[derive(Debug, Deserialize, TS)]
pub struct AddSkillRequest {
    pub skill_id: Uuid,
}

#[derive(Debug, Deserialize, TS)]
pub struct SetRoleRequest {
    pub role_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct UserInfo {
    pub experience: Option<String>,
}

pub(crate) fn parse_id_list(raw: Option<&str>) -> Result<Vec<Uuid>, ApiError> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            Uuid::parse_str(value).map_err(|_| ApiError::BadRequest(format!("Invalid id: {value}")))
        })
        .collect()
}

fn require_name(name: &str, what: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{what} name is required")));
    }
    Ok(())
}

pub async fn get_roles(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Role>>>, ApiError> {
    let roles = Role::find_all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(roles)))
}

pub async fn create_role(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateRole>,
) -> Result<ResponseJson<ApiResponse<Role>>, ApiError> {
    require_name(&payload.name, "Role")?;
    let role = Role::create(&deployment.db().pool, &payload).await?;
    tracing::info!(role_id = %role.id, name = %role.name, "role created");
    Ok(ResponseJson(ApiResponse::success(role)))
}

pub async fn get_skills(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<SkillQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Skill>>>, ApiError> {
    let exclude = parse_id_list(query.id_not_in.as_deref())?;
    let skills = Skill::find_all(&deployment.db().pool, &exclude).await?;
    Ok(ResponseJson(ApiResponse::success(skills)))
}

pub async fn create_skill(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateSkill>,
) -> Result<ResponseJson<ApiResponse<Skill>>, ApiError> {
    require_name(&payload.name, "Skill")?;
    let skill = Skill::create(&deployment.db().pool, &payload).await?;
    tracing::info!(skill_id = %skill.id, name = %skill.name, "skill created");
    Ok(ResponseJson(ApiResponse::success(skill)))
}

pub async fn get_my_skills(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
) -> Result<ResponseJson<ApiResponse<Vec<Skill>>>, ApiError> {
    let skills = User::skills(&deployment.db().pool, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(skills)))
}

pub async fn add_my_skill(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
    Json(payload): Json<AddSkillRequest>,
) -> Result<ResponseJson<ApiResponse<Vec<Skill>>>, ApiError> {
    let pool = &deployment.db().pool;
    User::add_skill(pool, user.id, payload.skill_id).await?;
    let skills = User::skills(pool, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(skills)))
}

pub async fn remove_my_skill(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
    Path(skill_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Skill>>>, ApiError> {
    let pool = &deployment.db().pool;
    User::remove_skill(pool, user.id, skill_id).await?;
    let skills = User::skills(pool, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(skills)))
}

pub async fn get_my_role(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
) -> Result<ResponseJson<ApiResponse<Option<Role>>>, ApiError> {
    let role = User::role(&deployment.db().pool, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(role)))
}

pub async fn set_my_role(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
    Json(payload): Json<SetRoleRequest>,
) -> Result<ResponseJson<ApiResponse<Option<Role>>>, ApiError> {
    let role = User::set_role(&deployment.db().pool, user.id, payload.role_id).await?;
    Ok(ResponseJson(ApiResponse::success(role)))
}

pub async fn get_my_info(
    Extension(user): Extension<User>,
) -> ResponseJson<ApiResponse<UserInfo>> {
    ResponseJson(ApiResponse::success(UserInfo {
        experience: user.experience,
    }))
}

pub async fn update_my_info(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
    Json(payload): Json<UserInfo>,
) -> Result<ResponseJson<ApiResponse<UserInfo>>, ApiError> {
    let updated = User::set_experience(&deployment.db().pool, user.id, payload.experience).await?;
    Ok(ResponseJson(ApiResponse::success(UserInfo {
        experience: updated.experience,
    })))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/roles", get(get_roles).post(create_role))
        .route("/skills", get(get_skills).post(create_skill))
        .route("/me/skills", get(get_my_skills).post(add_my_skill))
        .route("/me/skills/{skill_id}", delete(remove_my_skill))
        .route("/me/role", get(get_my_role).put(set_my_role))
        .route("/me/info", get(get_my_info).put(update_my_info))
}
