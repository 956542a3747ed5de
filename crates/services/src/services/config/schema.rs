use serde::{Deserialize, Serialize};

pub const CURRENT_CONFIG_VERSION: &str = "v1";

/// Used when neither the config file nor `JWT_SECRET` provides one.
pub const DEV_JWT_SECRET: &str = "mindforge-development-secret";

const DEFAULT_AI_SERVICE_URL: &str = "http://localhost:8000";
const DEFAULT_AI_TIMEOUT_SECS: u64 = 120;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AiServiceConfig {
    #[serde(alias = "baseUrl")]
    pub base_url: String,
    #[serde(alias = "timeoutSecs")]
    pub timeout_secs: u64,
}

impl Default for AiServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_AI_SERVICE_URL.to_string(),
            timeout_secs: DEFAULT_AI_TIMEOUT_SECS,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    #[serde(alias = "jwtSecret")]
    pub jwt_secret: Option<String>,
    /// Marks the session cookie `Secure`.
    #[serde(alias = "secureCookies")]
    pub secure_cookies: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(alias = "configVersion")]
    pub config_version: String,
    #[serde(alias = "aiService")]
    pub ai_service: AiServiceConfig,
    pub session: SessionConfig,
}

impl Config {
    pub fn from_raw(raw_config: &str) -> Self {
        match serde_json::from_str::<Config>(raw_config) {
            Ok(config) => config.normalized(),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse config (line {}, column {}): {}, using default",
                    e.line(),
                    e.column(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn normalized(mut self) -> Self {
        self.config_version = CURRENT_CONFIG_VERSION.to_string();

        let trimmed = self.ai_service.base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            tracing::warn!("Empty AI service URL, resetting to default");
            self.ai_service.base_url = DEFAULT_AI_SERVICE_URL.to_string();
        } else {
            self.ai_service.base_url = trimmed.to_string();
        }

        if self.ai_service.timeout_secs == 0 {
            self.ai_service.timeout_secs = DEFAULT_AI_TIMEOUT_SECS;
        }

        if matches!(
            self.session.jwt_secret.as_deref(),
            Some(secret) if secret.trim().is_empty()
        ) {
            self.session.jwt_secret = None;
        }

        self
    }

    /// Applies `AI_SERVICE_URL`, `JWT_SECRET` and `MINDFORGE_ENV` on top of
    /// the file values. Overrides are never written back to disk.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("AI_SERVICE_URL") {
            self.ai_service.base_url = url;
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.session.jwt_secret = Some(secret);
        }
        if let Ok(env) = std::env::var("MINDFORGE_ENV") {
            self.session.secure_cookies = env.eq_ignore_ascii_case("production");
        }
        self.normalized()
    }

    pub fn jwt_secret(&self) -> String {
        match self.session.jwt_secret.as_deref() {
            Some(secret) => secret.to_string(),
            None => {
                tracing::warn!("JWT_SECRET is not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: CURRENT_CONFIG_VERSION.to_string(),
            ai_service: AiServiceConfig::default(),
            session: SessionConfig::default(),
        }
    }
}
