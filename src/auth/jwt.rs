use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{AuthenticatorProvider, Principal};
use crate::pipeline::request::IncomingRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(sub: impl Into<String>, roles: Vec<String>, expiry_hours: i64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours)).timestamp();

        Self {
            sub: sub.into(),
            roles,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT secret not configured")]
    InvalidSecret,

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Missing Authorization header")]
    MissingHeader,

    #[error("Authorization header must use Bearer token format")]
    InvalidHeader,

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),
}

/// HS256 bearer-token authenticator for the `bearer` scheme
#[derive(Clone)]
pub struct JwtBearer {
    secret: String,
    expiry_hours: i64,
}

impl JwtBearer {
    pub const SCHEME: &'static str = "bearer";

    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expiry_hours: 24,
        }
    }

    pub fn with_expiry_hours(mut self, hours: i64) -> Self {
        self.expiry_hours = hours;
        self
    }

    /// Issue a signed token for a subject
    pub fn issue(&self, subject: &str, roles: &[&str]) -> Result<String, JwtError> {
        if self.secret.is_empty() {
            return Err(JwtError::InvalidSecret);
        }

        let claims = Claims::new(subject, roles.iter().map(|r| r.to_string()).collect(), self.expiry_hours);
        let encoding_key = EncodingKey::from_secret(self.secret.as_bytes());

        encode(&Header::default(), &claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
    }

    /// Validate a token and extract its claims
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        if self.secret.is_empty() {
            return Err(JwtError::InvalidSecret);
        }

        let decoding_key = DecodingKey::from_secret(self.secret.as_bytes());
        let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
            .map_err(|e| JwtError::InvalidToken(e.to_string()))?;

        Ok(token_data.claims)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, JwtError> {
    let auth_str = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(JwtError::MissingHeader)?
        .to_str()
        .map_err(|_| JwtError::InvalidHeader)?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(JwtError::InvalidHeader),
    }
}

#[async_trait]
impl AuthenticatorProvider for JwtBearer {
    async fn authenticate(&self, scheme: &str, request: &IncomingRequest) -> anyhow::Result<Option<Principal>> {
        if !scheme.eq_ignore_ascii_case(Self::SCHEME) {
            anyhow::bail!("JwtBearer cannot handle scheme '{}'", scheme);
        }

        let token = bearer_token(request.headers())?;
        let claims = self.verify(token)?;

        Ok(Some(Principal {
            subject: claims.sub.clone(),
            roles: claims.roles.clone(),
            claims: serde_json::to_value(&claims)?,
        }))
    }
}
