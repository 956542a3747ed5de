use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, OnceLock},
};

use axum::{
    Json, Router,
    body::{Body, to_bytes},
    extract::{Multipart, Path as UrlPath, State},
    http::{Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use db::models::user::User;
use deployment::Deployment;
use serde_json::{Value, json};
use services::services::auth::{AuthService, LoginRequest, RegisterRequest};
use uuid::Uuid;

use crate::DeploymentImpl;

pub const TEST_JWT_SECRET: &str = "mindforge-test-secret";

const GUARDED_VARS: [&str; 4] = [
    "MINDFORGE_ASSET_DIR",
    "DATABASE_URL",
    "AI_SERVICE_URL",
    "JWT_SECRET",
];

pub fn test_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

pub struct TestEnvGuard {
    _lock: MutexGuard<'static, ()>,
    previous: Vec<(&'static str, Option<String>)>,
}

impl TestEnvGuard {
    pub fn new(temp_root: &Path, db_url: String, ai_service_url: &str) -> Self {
        let lock = test_lock().lock().unwrap_or_else(|err| err.into_inner());
        let previous = GUARDED_VARS
            .iter()
            .map(|name| (*name, std::env::var(name).ok()))
            .collect();

        // SAFETY: tests using TestEnvGuard are serialized by test_lock.
        unsafe {
            std::env::set_var("MINDFORGE_ASSET_DIR", temp_root);
            std::env::set_var("DATABASE_URL", db_url);
            std::env::set_var("AI_SERVICE_URL", ai_service_url);
            std::env::set_var("JWT_SECRET", TEST_JWT_SECRET);
        }

        Self {
            _lock: lock,
            previous,
        }
    }
}

impl Drop for TestEnvGuard {
    fn drop(&mut self) {
        // SAFETY: tests using TestEnvGuard are serialized by test_lock.
        unsafe {
            for (name, value) in &self.previous {
                match value {
                    Some(value) => std::env::set_var(name, value),
                    None => std::env::remove_var(name),
                }
            }
        }
    }
}

/// Deployment backed by a fresh sqlite file and the given AI service URL.
pub async fn setup_deployment(ai_service_url: &str) -> (TestEnvGuard, DeploymentImpl) {
    let temp_root = std::env::temp_dir().join(format!("mindforge-test-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&temp_root).unwrap();

    let db_path = temp_root.join("db.sqlite");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
    let env_guard = TestEnvGuard::new(&temp_root, db_url, ai_service_url);

    let deployment = DeploymentImpl::new()
        .await
        .unwrap()
        .with_auth(AuthService::new(TEST_JWT_SECRET.to_string()).with_bcrypt_cost(4));

    (env_guard, deployment)
}

/// Registers a user and logs them in, returning the session token.
pub async fn register_user(deployment: &DeploymentImpl, email: &str) -> (User, String) {
    let (first_name, last_name) = email
        .split_once('@')
        .map(|(local, _)| (local.to_string(), "Tester".to_string()))
        .unwrap();
    let request = RegisterRequest {
        first_name,
        last_name,
        email: email.to_string(),
        password: "password123".to_string(),
        confirm_password: "password123".to_string(),
        role_id: None,
        skill_ids: Vec::new(),
    };
    deployment
        .auth()
        .register(&deployment.db().pool, &request)
        .await
        .unwrap();
    deployment
        .auth()
        .login(
            &deployment.db().pool,
            &LoginRequest {
                email: email.to_string(),
                password: "password123".to_string(),
            },
        )
        .await
        .unwrap()
}

pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("token={token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn json_body(response: Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// AI service stand-in that remembers each workspace's team and hands back
/// one task per member.
#[derive(Clone, Default)]
pub struct AiStub {
    pub(crate) workspaces: Arc<Mutex<HashMap<String, Vec<String>>>>,
    pub fail_analyze: bool,
}

async fn stub_analyze(State(stub): State<AiStub>, mut multipart: Multipart) -> Response {
    let mut workspace_id = None;
    let mut members = Vec::new();
    let mut files = 0;
    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name().unwrap_or_default() {
            "workspace_id" => workspace_id = field.text().await.ok(),
            "team_details" => {
                let team: Value = field
                    .text()
                    .await
                    .ok()
                    .and_then(|text| serde_json::from_str(&text).ok())
                    .unwrap_or_default();
                if let Some(team_members) = team["team_members"].as_object() {
                    members = team_members.keys().cloned().collect();
                }
            }
            "files" => files += 1,
            _ => {}
        }
    }

    if stub.fail_analyze || files == 0 {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "Processing failed" })),
        )
            .into_response();
    }
    let Some(workspace_id) = workspace_id else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": "workspace_id missing" })),
        )
            .into_response();
    };
    stub.workspaces
        .lock()
        .unwrap()
        .insert(workspace_id, members);
    Json(json!({ "status": "success" })).into_response()
}

async fn stub_tasks(State(stub): State<AiStub>, UrlPath(id): UrlPath<String>) -> Response {
    let Some(members) = stub.workspaces.lock().unwrap().get(&id).cloned() else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Workspace not found" })),
        )
            .into_response();
    };
    let tasks: serde_json::Map<String, Value> = members
        .iter()
        .enumerate()
        .map(|(index, member)| {
            (
                member.clone(),
                json!([{
                    "task": format!("Task {}", index + 1),
                    "role": "Engineer",
                    "node_id": index as i64 + 100,
                    "status": "in_progress",
                    "priority": "high",
                }]),
            )
        })
        .collect();
    Json(Value::Object(tasks)).into_response()
}

async fn stub_graph(State(stub): State<AiStub>, UrlPath(id): UrlPath<String>) -> Response {
    let Some(members) = stub.workspaces.lock().unwrap().get(&id).cloned() else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Workspace not found" })),
        )
            .into_response();
    };
    let mut nodes = vec![json!({
        "id": 1, "label": id, "type": "workspace", "properties": { "name": id }
    })];
    let mut edges = Vec::new();
    for (index, member) in members.iter().enumerate() {
        let node_id = index as i64 + 2;
        nodes.push(json!({
            "id": node_id, "label": member, "type": "user", "properties": {}
        }));
        edges.push(json!({
            "id": node_id + 100, "from": 1, "to": node_id, "type": "HAS_MEMBER", "properties": {}
        }));
    }
    Json(json!({ "nodes": nodes, "edges": edges })).into_response()
}

impl AiStub {
    /// Serves the stub on an ephemeral port and returns its base URL.
    pub async fn spawn(self) -> String {
        let app = Router::new()
            .route("/analyze", post(stub_analyze))
            .route("/workspace/{id}/tasks", get(stub_tasks))
            .route("/workspace/{id}/graph", get(stub_graph))
            .with_state(self);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}

/// Hand-built `multipart/form-data` body.
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: format!("mindforge-{}", Uuid::new_v4().simple()),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: text/plain\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(content);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, uri: &str, token: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, format!("token={token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}
