use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use db::models::user::User;
use deployment::Deployment;
use utils::response::ApiResponse;

use crate::DeploymentImpl;

pub const SESSION_COOKIE: &str = "token";

fn parse_authorization_bearer(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    let (prefix, rest) = trimmed.split_once(' ')?;
    if !prefix.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

/// Session token from the `token` cookie, falling back to
/// `Authorization: Bearer <token>`.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let value = cookie.value().trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_authorization_bearer)
        .map(str::to_string)
}

fn unauthorized() -> Response {
    let response = ApiResponse::<()>::error("Unauthorized");
    (StatusCode::UNAUTHORIZED, Json(response)).into_response()
}

/// Resolves the session user and stores it as a request extension. Requests
/// without a valid session are answered with 401.
pub async fn require_session(
    State(deployment): State<DeploymentImpl>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_session_token(req.headers()) else {
        tracing::warn!(
            path = %req.uri().path(),
            method = %req.method(),
            reason = "missing_token",
            "Unauthorized API request"
        );
        return unauthorized();
    };

    let claims = match deployment.auth().verify_token(&token) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::warn!(
                path = %req.uri().path(),
                method = %req.method(),
                reason = %err,
                "Unauthorized API request"
            );
            return unauthorized();
        }
    };

    let user = match User::find_by_id(&deployment.db().pool, claims.sub).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!(user_id = %claims.sub, "Session refers to a missing user");
            return unauthorized();
        }
        Err(err) => {
            tracing::error!(user_id = %claims.sub, "Failed to load session user: {err}");
            let response = ApiResponse::<()>::error("Internal server error");
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response();
        }
    };

    req.extensions_mut().insert(user);
    next.run(req).await
}
