use axum::{
    Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::user::{User, UserSearch, UserSearchResult};
use deployment::Deployment;
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, routes::settings::parse_id_list};

#[derive(Debug, Default, Deserialize)]
pub struct AutocompleteQuery {
    #[serde(default)]
    pub query: String,
    /// Comma separated user ids to leave out.
    #[serde(default)]
    pub id_not_in: Option<String>,
    #[serde(default)]
    pub not_in_project_id: Option<Uuid>,
}

pub async fn autocomplete(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<AutocompleteQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<UserSearchResult>>>, ApiError> {
    let search = UserSearch {
        query: query.query,
        id_not_in: parse_id_list(query.id_not_in.as_deref())?,
        not_in_project_id: query.not_in_project_id,
    };
    let users = User::search(&deployment.db().pool, &search).await?;
    Ok(ResponseJson(ApiResponse::success(users)))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/users/autocomplete", get(autocomplete))
}
