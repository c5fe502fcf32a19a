//! Bearer-token principal extraction. The auth system issuing tokens is
//! external; this layer only verifies HS256 tokens and builds the
//! `Principal` the workflow authorizes against.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use reporttracker_core::types::{Principal, Role};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Clone)]
pub struct AuthConfig {
    secret: String,
}

impl AuthConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn issue_token(&self, principal: &Principal, ttl_seconds: u64) -> anyhow::Result<String> {
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = AccessTokenClaims {
            sub: principal.user_id.to_string(),
            role: principal.role.as_str().to_string(),
            code: principal.code.clone(),
            exp: now + ttl_seconds as usize,
            iat: now,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Principal> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<AccessTokenClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )?;
        let user_id = Uuid::parse_str(&data.claims.sub)?;
        let role = Role::parse(&data.claims.role)
            .ok_or_else(|| anyhow::anyhow!("unknown role '{}'", data.claims.role))?;
        Ok(Principal {
            user_id,
            role,
            code: data.claims.code,
        })
    }
}

/// Extractor wrapper so handlers receive a verified `Principal`.
pub struct AuthPrincipal(pub Principal);

impl FromRequestParts<AppState> for AuthPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("No token provided"))?;
        let principal = state
            .auth
            .verify(token)
            .map_err(|_| ApiError::unauthorized("Invalid token"))?;
        Ok(AuthPrincipal(principal))
    }
}
