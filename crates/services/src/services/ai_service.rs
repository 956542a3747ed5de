//! HTTP client for the external AI analysis service.

use std::{collections::BTreeMap, time::Duration};

use rand::Rng;
use reqwest::{
    Client, Response, StatusCode,
    multipart::{Form, Part},
};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use thiserror::Error;
use ts_rs::TS;

use super::config::AiServiceConfig;

/// Length of ids handed to the AI service for people and workspaces.
pub const AI_SERVICE_ID_LEN: usize = 16;

/// Random lowercase ASCII id used as a person or workspace key on the AI
/// service.
pub fn generate_ai_service_id() -> String {
    let mut rng = rand::thread_rng();
    (0..AI_SERVICE_ID_LEN)
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect()
}

#[derive(Debug, Clone, Error)]
pub enum AiServiceError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("AI service request timed out")]
    Timeout,
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("json error: {0}")]
    Serde(String),
}

impl AiServiceError {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Http { message, .. } => message.clone(),
            Self::Timeout => "AI service request timed out".to_string(),
            Self::Transport(_) => "AI service is unreachable".to_string(),
            Self::Serde(_) => "AI service returned an unexpected response".to_string(),
        }
    }
}

/// A document uploaded to `/analyze`.
#[derive(Debug, Clone)]
pub struct AnalyzeDocument {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMemberDetails {
    pub current_role: String,
    pub skills: Vec<String>,
    pub experience: String,
}

/// Sent as the `team_details` form field, keyed by each member's
/// AI-service id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamDetails {
    pub team_members: BTreeMap<String, TeamMemberDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiTask {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub task: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub role: String,
    pub node_id: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub created_at: Option<Value>,
    #[serde(default)]
    pub estimated_hours: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Task and role names are `null` for graph nodes that have no `name`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// `GET /workspace/{id}/tasks`: task lists keyed by person.
pub type TasksByPerson = BTreeMap<String, Vec<AiTask>>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct GraphNode {
    pub id: i64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "type", default)]
    pub node_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub created_at: Option<Value>,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub properties: Map<String, Value>,
    #[serde(flatten)]
    #[ts(skip)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct GraphEdge {
    pub id: i64,
    pub from: i64,
    pub to: i64,
    #[serde(rename = "type", default)]
    pub edge_type: Option<String>,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub properties: Map<String, Value>,
    #[serde(flatten)]
    #[ts(skip)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct AiServiceClient {
    http: Client,
    base_url: String,
}

impl AiServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AiServiceError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mindforge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AiServiceError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &AiServiceConfig) -> Result<Self, AiServiceError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `POST /analyze` with the workspace id, team composition and documents.
    /// Returns the raw JSON body.
    pub async fn analyze(
        &self,
        workspace_id: &str,
        team: &TeamDetails,
        documents: Vec<AnalyzeDocument>,
    ) -> Result<Value, AiServiceError> {
        let team_details =
            serde_json::to_string(team).map_err(|e| AiServiceError::Serde(e.to_string()))?;

        let mut form = Form::new()
            .text("workspace_id", workspace_id.to_string())
            .text("team_details", team_details);
        for document in documents {
            let mut part = Part::bytes(document.bytes).file_name(document.file_name);
            if let Some(content_type) = document.content_type.as_deref() {
                part = part
                    .mime_str(content_type)
                    .map_err(|e| AiServiceError::Transport(e.to_string()))?;
            }
            form = form.part("files", part);
        }

        tracing::debug!(workspace_id, "posting documents to AI service");
        let res = self
            .http
            .post(self.url("/analyze"))
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_json(res).await
    }

    pub async fn tasks(&self, workspace_id: &str) -> Result<TasksByPerson, AiServiceError> {
        self.get_json(&format!("/workspace/{workspace_id}/tasks"))
            .await
    }

    pub async fn graph(&self, workspace_id: &str) -> Result<Graph, AiServiceError> {
        self.get_json(&format!("/workspace/{workspace_id}/graph"))
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AiServiceError> {
        let res = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_json(res).await
    }
}

async fn read_json<T: DeserializeOwned>(res: Response) -> Result<T, AiServiceError> {
    let status = res.status();
    if status.is_success() {
        return res
            .json::<T>()
            .await
            .map_err(|e| AiServiceError::Serde(e.to_string()));
    }

    let body = res.text().await.unwrap_or_default();
    let message = extract_error_message(status, &body);
    tracing::warn!(status = status.as_u16(), %message, "AI service request failed");
    Err(AiServiceError::Http {
        status: status.as_u16(),
        message,
    })
}

/// Prefers a `detail` or `message` field of a JSON body, then the status
/// reason phrase.
pub fn extract_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["detail", "message"] {
            match map.get(key) {
                Some(Value::String(text)) if !text.trim().is_empty() => return text.clone(),
                Some(Value::String(_)) | Some(Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
    }
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("AI service returned status {}", status.as_u16()))
}

fn map_reqwest_error(e: reqwest::Error) -> AiServiceError {
    if e.is_timeout() {
        AiServiceError::Timeout
    } else {
        AiServiceError::Transport(e.to_string())
    }
}
