use std::sync::LazyLock;

use db::{
    DatabaseConnection, DbErr, TransactionTrait,
    models::user::{CreateUser, User, UserError},
};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use ts_rs::TS;
use utils_jwt::{JwtError, SessionClaims, issue_session_token, verify_session_token};
use uuid::Uuid;

use super::ai_service::generate_ai_service_id;

pub const BCRYPT_COST: u32 = 12;
const MAX_FIELD_LEN: usize = 255;
const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
});

#[derive(Debug, Error)]
pub enum AuthServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("Duplicate email, Please try another email.")]
    DuplicateEmail,
    #[error("Not found this user")]
    UserNotFound,
    #[error("Wrong password, please try again")]
    WrongPassword,
    #[error(transparent)]
    User(UserError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Hash(#[from] bcrypt::BcryptError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("password hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<UserError> for AuthServiceError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::DuplicateEmail => Self::DuplicateEmail,
            UserError::Database(db) => Self::Database(db),
            other => Self::User(other),
        }
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub role_id: Option<Uuid>,
    #[serde(default)]
    pub skill_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    /// Field rules checked before anything touches the database.
    pub fn validate(&self) -> Result<(), AuthServiceError> {
        let too_long = |value: &str| value.chars().count() > MAX_FIELD_LEN;
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(AuthServiceError::Validation(
                "First and last name are required".to_string(),
            ));
        }
        if too_long(&self.first_name) || too_long(&self.last_name) {
            return Err(AuthServiceError::Validation(format!(
                "Names must be at most {MAX_FIELD_LEN} characters long"
            )));
        }
        let email = self.email.trim();
        if too_long(email) || !EMAIL_RE.is_match(email) {
            return Err(AuthServiceError::Validation("Invalid email".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN
            || self.confirm_password.chars().count() < MIN_PASSWORD_LEN
        {
            return Err(AuthServiceError::Validation(
                "The password must be at least 8 characters long".to_string(),
            ));
        }
        if self.password != self.confirm_password {
            return Err(AuthServiceError::Validation(
                "Passwords don't match".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self {
            jwt_secret,
            bcrypt_cost: BCRYPT_COST,
        }
    }

    /// Lower cost for tests; production keeps `BCRYPT_COST`.
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub async fn register(
        &self,
        db: &DatabaseConnection,
        request: &RegisterRequest,
    ) -> Result<User, AuthServiceError> {
        request.validate()?;
        let email = request.email.trim().to_string();
        if User::find_by_email(db, &email).await?.is_some() {
            return Err(AuthServiceError::DuplicateEmail);
        }

        let password = request.password.clone();
        let cost = self.bcrypt_cost;
        let password_hash =
            tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;

        let tx = db.begin().await?;
        let user = User::create(
            &tx,
            &CreateUser {
                first_name: request.first_name.clone(),
                last_name: request.last_name.clone(),
                email,
                password_hash,
                ai_service_id: generate_ai_service_id(),
                role_id: request.role_id,
                skill_ids: request.skill_ids.clone(),
            },
        )
        .await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Checks the password and returns the user with a fresh session token.
    pub async fn login(
        &self,
        db: &DatabaseConnection,
        request: &LoginRequest,
    ) -> Result<(User, String), AuthServiceError> {
        let email = request.email.trim();
        let credentials = User::find_credentials_by_email(db, email)
            .await?
            .ok_or(AuthServiceError::UserNotFound)?;

        let password = request.password.clone();
        let hash = credentials.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
        if !valid {
            tracing::info!(user_id = %credentials.id, "login rejected: wrong password");
            return Err(AuthServiceError::WrongPassword);
        }

        let user = User::find_by_id(db, credentials.id)
            .await?
            .ok_or(AuthServiceError::UserNotFound)?;
        let token = issue_session_token(user.id, &self.jwt_secret)?;
        Ok((user, token))
    }

    pub fn verify_token(&self, token: &str) -> Result<SessionClaims, JwtError> {
        verify_session_token(token, &self.jwt_secret)
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;

    async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn service() -> AuthService {
        AuthService::new("test-secret".to_string()).with_bcrypt_cost(4)
    }

    fn request(email: &str) -> RegisterRequest {
        RegisterRequest {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            password: "correct horse".to_string(),
            confirm_password: "correct horse".to_string(),
            role_id: None,
            skill_ids: Vec::new(),
        }
    }

    fn validation_message(request: &RegisterRequest) -> String {
        match request.validate() {
            Err(AuthServiceError::Validation(message)) => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn validation_rules() {
        assert!(request("ada@example.com").validate().is_ok());

        let mut short = request("ada@example.com");
        short.password = "short".to_string();
        short.confirm_password = "short".to_string();
        assert_eq!(
            validation_message(&short),
            "The password must be at least 8 characters long"
        );

        let mut mismatch = request("ada@example.com");
        mismatch.confirm_password = "different horse".to_string();
        assert_eq!(validation_message(&mismatch), "Passwords don't match");

        assert_eq!(validation_message(&request("not-an-email")), "Invalid email");

        let mut long_name = request("ada@example.com");
        long_name.first_name = "a".repeat(256);
        assert!(validation_message(&long_name).contains("255"));
    }

    #[tokio::test]
    async fn register_then_login() {
        let db = setup_db().await;
        let auth = service();

        let user = auth.register(&db, &request("ada@example.com")).await.unwrap();
        assert_eq!(user.ai_service_id.len(), 16);

        let (logged_in, token) = auth
            .login(
                &db,
                &LoginRequest {
                    email: "ada@example.com".to_string(),
                    password: "correct horse".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);
        assert_eq!(auth.verify_token(&token).unwrap().sub, user.id);
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let db = setup_db().await;
        let auth = service();
        auth.register(&db, &request("ada@example.com")).await.unwrap();

        let err = auth
            .register(&db, &request("ada@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Duplicate email, Please try another email.");
    }

    #[tokio::test]
    async fn login_failures_carry_user_messages() {
        let db = setup_db().await;
        let auth = service();
        auth.register(&db, &request("ada@example.com")).await.unwrap();

        let unknown = auth
            .login(
                &db,
                &LoginRequest {
                    email: "nobody@example.com".to_string(),
                    password: "whatever1".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(unknown.to_string(), "Not found this user");

        let wrong = auth
            .login(
                &db,
                &LoginRequest {
                    email: "ada@example.com".to_string(),
                    password: "wrong horse".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(wrong.to_string(), "Wrong password, please try again");
    }

    #[tokio::test]
    async fn register_with_unknown_skill_rolls_back() {
        let db = setup_db().await;
        let auth = service();
        let mut data = request("ada@example.com");
        data.skill_ids = vec![Uuid::new_v4()];

        let err = auth.register(&db, &data).await.unwrap_err();
        assert!(matches!(err, AuthServiceError::User(UserError::SkillNotFound)));
        assert!(User::find_by_email(&db, "ada@example.com").await.unwrap().is_none());
    }
}
