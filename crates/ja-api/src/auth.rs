use axum::async_trait;
use axum::extract::FromRef;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use ja_common::api::person::{PersonDto, Role};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
}

/// Identity carried by a verified bearer token. `person_id` stays valid
/// across username changes; `username` is the name at login time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub person_id: i32,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn require(&self, role: Role) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "{} may not perform this action",
                self.username
            )))
        }
    }

    /// Recruiters may act on anyone; everyone else only on themselves.
    pub fn require_self_or_recruiter(&self, person_id: i32) -> Result<(), ApiError> {
        if self.role == Role::Recruiter || self.person_id == person_id {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "{} may only act on their own profile",
                self.username
            )))
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    pid: i32,
    role: Role,
    exp: usize,
}

/// Signs an HS256 token for a person who has just logged in.
pub fn issue_token(config: &AuthConfig, person: &PersonDto) -> Result<String, ApiError> {
    let username = person
        .username
        .clone()
        .ok_or_else(|| ApiError::Unauthorized("person has no username".into()))?;
    let expires_at = Utc::now() + Duration::minutes(config.token_ttl_minutes);

    let claims = Claims {
        sub: username,
        pid: person.person_id,
        role: person.role,
        exp: expires_at.timestamp().max(0) as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|err| ApiError::Internal(format!("failed to sign token: {err}")))
}

fn verify_token(config: &AuthConfig, token: &str) -> Result<AuthUser, ApiError> {
    let validation = Validation::new(Algorithm::HS256);

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|err| ApiError::Unauthorized(format!("invalid token: {err}")))?;

    Ok(AuthUser {
        person_id: data.claims.pid,
        username: data.claims.sub,
        role: data.claims.role,
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AuthConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AuthConfig::from_ref(state);

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("expected Bearer token".into()))?;

        verify_token(&config, token)
    }
}
