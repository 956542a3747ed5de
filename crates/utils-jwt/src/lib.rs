use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Sessions last a week; the cookie Max-Age uses the same value.
pub const SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("session secret is empty")]
    EmptySecret,
    #[error("session token expired")]
    Expired,
    #[error("invalid session token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

impl SessionClaims {
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(SESSION_TTL_SECS)).timestamp(),
        }
    }
}

pub fn issue_session_token(user_id: Uuid, secret: &str) -> Result<String, JwtError> {
    sign_claims(&SessionClaims::new(user_id), secret)
}

pub fn sign_claims(claims: &SessionClaims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::EmptySecret);
    }
    let token = encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Checks signature and expiry and returns the claims.
pub fn verify_session_token(token: &str, secret: &str) -> Result<SessionClaims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::EmptySecret);
    }
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|err| match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::Invalid(err),
    })?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn issued_token_verifies_with_same_secret() {
        let user_id = Uuid::new_v4();
        let token = issue_session_token(user_id, SECRET).unwrap();
        let claims = verify_session_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.exp - claims.iat, SESSION_TTL_SECS);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_session_token(Uuid::new_v4(), SECRET).unwrap();
        assert!(matches!(
            verify_session_token(&token, "other-secret"),
            Err(JwtError::Invalid(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: Uuid::new_v4(),
            iat: now - 2 * SESSION_TTL_SECS,
            exp: now - SESSION_TTL_SECS,
        };
        let token = sign_claims(&claims, SECRET).unwrap();
        assert!(matches!(
            verify_session_token(&token, SECRET),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(
            issue_session_token(Uuid::new_v4(), ""),
            Err(JwtError::EmptySecret)
        ));
        assert!(matches!(
            verify_session_token("a.b.c", ""),
            Err(JwtError::EmptySecret)
        ));
    }
}
