use axum::{Router, middleware::from_fn_with_state, routing::get};

use crate::{DeploymentImpl, routes};

pub mod auth;

pub fn router(deployment: DeploymentImpl) -> Router {
    let protected_routes = Router::new()
        .merge(routes::auth::router())
        .merge(routes::settings::router())
        .merge(routes::users::router())
        .merge(routes::projects::router(&deployment))
        .merge(routes::todos::router(&deployment))
        .layer(from_fn_with_state(
            deployment.clone(),
            auth::require_session,
        ));

    let api_routes = Router::new()
        .merge(routes::auth::public_router())
        .merge(protected_routes);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .with_state(deployment)
}
