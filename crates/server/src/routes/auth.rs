use axum::{
    Extension, Json, Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use db::models::user::User;
use deployment::Deployment;
use services::services::auth::{LoginRequest, RegisterRequest};
use utils::response::ApiResponse;
use utils_jwt::SESSION_TTL_SECS;

use crate::{DeploymentImpl, error::ApiError, http::auth::SESSION_COOKIE};

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(time::Duration::seconds(SESSION_TTL_SECS))
        .secure(secure)
        .build()
}

pub async fn register(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<RegisterRequest>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = deployment
        .auth()
        .register(&deployment.db().pool, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        user,
        "Register successfully.",
    )))
}

pub async fn login(
    State(deployment): State<DeploymentImpl>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, ResponseJson<ApiResponse<User>>), ApiError> {
    let (user, token) = deployment
        .auth()
        .login(&deployment.db().pool, &payload)
        .await?;
    let secure = deployment.secure_cookies().await;

    tracing::info!(user_id = %user.id, "user logged in");
    let jar = jar.add(session_cookie(token, secure));
    Ok((
        jar,
        ResponseJson(ApiResponse::success_with_message(user, "Logged in!")),
    ))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, ResponseJson<ApiResponse<()>>) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (
        jar,
        ResponseJson(ApiResponse::<()>::message_only("Logout completed.")),
    )
}

pub async fn me(Extension(user): Extension<User>) -> ResponseJson<ApiResponse<User>> {
    ResponseJson(ApiResponse::success(user))
}

/// Routes reachable without a session.
pub fn public_router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/auth/me", get(me))
}
