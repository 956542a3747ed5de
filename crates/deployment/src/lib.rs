use std::sync::Arc;

use async_trait::async_trait;
use db::{DBService, DbErr};
use services::services::{
    ai_service::AiServiceError,
    auth::AuthService,
    config::{Config, ConfigError},
    project::ProjectService,
};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    AiService(#[from] AiServiceError),
}

/// Everything a request handler needs, wired once at startup.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Arc<RwLock<Config>>;

    fn db(&self) -> &DBService;

    fn auth(&self) -> &AuthService;

    fn project(&self) -> &ProjectService;

    /// Whether session cookies carry the `Secure` attribute.
    async fn secure_cookies(&self) -> bool {
        self.config().read().await.session.secure_cookies
    }
}
