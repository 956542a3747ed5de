use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use services::services::{
    ai_service::AiServiceClient,
    auth::AuthService,
    config::{Config, load_config_from_file, save_config_to_file},
    project::ProjectService,
};
use tokio::sync::RwLock;
use utils::assets::config_path;

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<RwLock<Config>>,
    db: DBService,
    auth: AuthService,
    project: ProjectService,
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let config = Self::load_runtime_config().await?;
        let db = DBService::new().await?;
        Self::from_parts(config, db)
    }

    fn config(&self) -> &Arc<RwLock<Config>> {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn auth(&self) -> &AuthService {
        &self.auth
    }

    fn project(&self) -> &ProjectService {
        &self.project
    }
}

impl LocalDeployment {
    /// Reads `config.json`, writes back the normalised file, then layers the
    /// environment overrides on top.
    async fn load_runtime_config() -> Result<Config, DeploymentError> {
        let path = config_path();
        let raw_config = load_config_from_file(&path).await;
        save_config_to_file(&raw_config, &path).await?;
        Ok(raw_config.with_env_overrides())
    }

    pub fn from_parts(config: Config, db: DBService) -> Result<Self, DeploymentError> {
        let ai = AiServiceClient::from_config(&config.ai_service)?;
        tracing::info!(ai_service = %ai.base_url(), "AI service client configured");
        let auth = AuthService::new(config.jwt_secret());

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            db,
            auth,
            project: ProjectService::new(ai),
        })
    }

    /// Replaces the auth service, e.g. with a cheaper bcrypt cost.
    pub fn with_auth(mut self, auth: AuthService) -> Self {
        self.auth = auth;
        self
    }
}
