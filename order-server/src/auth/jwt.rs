//! JWT token service
//!
//! Tokens are issued by the user directory; this service only needs to
//! validate them. `issue_token` exists for tooling and tests.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use shared::models::{Role, UserId};
use thiserror::Error;

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id; numeric or decimal string
    pub sub: UserId,
    /// Display name
    #[serde(default)]
    pub name: String,
    pub role: Role,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    ExpiredToken,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Token generation failed: {0}")]
    GenerationFailed(String),
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService").finish_non_exhaustive()
    }
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Sign a token valid for `ttl`
    pub fn issue_token(
        &self,
        user_id: UserId,
        name: &str,
        role: Role,
        ttl: Duration,
    ) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            name: name.to_string(),
            role,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::GenerationFailed(e.to_string()))
    }

    /// Validate and decode a token
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["sub", "exp"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                _ => JwtError::InvalidToken(e.to_string()),
            }
        })?;

        Ok(token_data.claims)
    }

    /// Extract the token from an `Authorization` header value
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_keeps_identity_and_role() {
        let jwt = JwtService::new("test-jwt-secret");
        let token = jwt
            .issue_token(UserId::new(42).unwrap(), "Ana", Role::Staff, Duration::minutes(5))
            .unwrap();
        let claims = jwt.validate_token(&token).unwrap();
        assert_eq!(claims.sub.get(), 42);
        assert_eq!(claims.role, Role::Staff);
    }

    #[test]
    fn expired_and_foreign_tokens_rejected() {
        let jwt = JwtService::new("test-jwt-secret");
        let expired = jwt
            .issue_token(UserId::new(1).unwrap(), "Ana", Role::Customer, Duration::hours(-2))
            .unwrap();
        assert!(matches!(jwt.validate_token(&expired), Err(JwtError::ExpiredToken)));

        let other = JwtService::new("another-secret")
            .issue_token(UserId::new(1).unwrap(), "Ana", Role::Admin, Duration::minutes(5))
            .unwrap();
        assert!(matches!(jwt.validate_token(&other), Err(JwtError::InvalidSignature)));
        assert!(jwt.validate_token("garbage").is_err());
    }

    #[test]
    fn string_subject_is_normalized() {
        let jwt = JwtService::new("test-jwt-secret");
        let claims = serde_json::json!({
            "sub": "17",
            "name": "Luis",
            "role": "customer",
            "exp": Utc::now().timestamp() + 60,
        });
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test-jwt-secret")).unwrap();
        assert_eq!(jwt.validate_token(&token).unwrap().sub.get(), 17);
    }

    #[test]
    fn bearer_prefix_required() {
        assert_eq!(JwtService::extract_from_header("Bearer abc"), Some("abc"));
        assert_eq!(JwtService::extract_from_header("Basic abc"), None);
        assert_eq!(JwtService::extract_from_header("Bearer "), None);
    }
}
