use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::axum_http::error_responses::AppError;

/// Rider token claims; `sub` is the numeric user id.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub exp: usize,
}

/// Scanner token claims issued to a bus for the route it currently serves.
#[derive(Debug, Serialize, Deserialize)]
pub struct BusClaims {
    pub sub: String,
    pub bus_name: String,
    pub route_id: i64,
    pub exp: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthBus {
    pub bus_id: i64,
    pub bus_name: String,
    pub route_id: i64,
}

/// HS256 keys for both token audiences, installed as a request extension.
#[derive(Clone)]
pub struct JwtKeys {
    user: DecodingKey,
    bus: DecodingKey,
}

impl JwtKeys {
    pub fn new(user_secret: &str, bus_secret: &str) -> Self {
        Self {
            user: DecodingKey::from_secret(user_secret.as_bytes()),
            bus: DecodingKey::from_secret(bus_secret.as_bytes()),
        }
    }

    pub fn verify_user(&self, token: &str) -> Result<AuthUser, AppError> {
        let claims = decode::<UserClaims>(token, &self.user, &Validation::new(Algorithm::HS256))
            .map_err(|_| AppError::Unauthorized)?
            .claims;
        let user_id = parse_id(&claims.sub)?;
        Ok(AuthUser { user_id })
    }

    pub fn verify_bus(&self, token: &str) -> Result<AuthBus, AppError> {
        let claims = decode::<BusClaims>(token, &self.bus, &Validation::new(Algorithm::HS256))
            .map_err(|_| AppError::Unauthorized)?
            .claims;
        Ok(AuthBus {
            bus_id: parse_id(&claims.sub)?,
            bus_name: claims.bus_name,
            route_id: claims.route_id,
        })
    }
}

fn parse_id(sub: &str) -> Result<i64, AppError> {
    sub.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or(AppError::Unauthorized)
}

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AppError::Unauthorized)?
        .to_str()
        .map_err(|_| AppError::Unauthorized)?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::Unauthorized)
}

fn jwt_keys(parts: &Parts) -> Result<Arc<JwtKeys>, AppError> {
    parts
        .extensions
        .get::<Arc<JwtKeys>>()
        .cloned()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("jwt keys extension is missing")))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let keys = jwt_keys(parts)?;
        keys.verify_user(bearer_token(parts)?)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthBus
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let keys = jwt_keys(parts)?;
        keys.verify_bus(bearer_token(parts)?)
    }
}

#[cfg(test)]
mod tests;
