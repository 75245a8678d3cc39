/*!
 * # Authentication and Authorization Module
 *
 * Identity comes from bearer JWTs (HS256) issued by an external identity
 * provider. The middleware validates the token, resolves the caller's role
 * and stores an [`AuthUser`] in the request extensions. Capability checks
 * live in [`policy`].
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::errors::ServiceError;

pub mod policy;

pub use policy::{authorize, Action};

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Missing means `buyer`.
    #[serde(default)]
    pub role: Option<String>,
    pub iat: i64,
    pub exp: i64,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub jti: Option<String>,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum UserRole {
    Buyer,
    Supplier,
    Administrator,
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Buyer
    }
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: UserRole,
    pub token_id: Option<String>,
}

impl AuthUser {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.role == role
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(UserRole::Administrator)
    }

    /// Display name recorded on requirements and approvals.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.email.as_deref())
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }
        let role = match claims.role.as_deref().map(str::trim) {
            None | Some("") => UserRole::default(),
            Some(raw) => UserRole::from_str(raw).map_err(|_| AuthError::UnknownRole(raw.to_string()))?,
        };

        Ok(AuthUser {
            user_id: claims.sub,
            name: claims.name,
            email: claims.email,
            role,
            token_id: claims.jti,
        })
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, jwt_issuer: Option<String>, jwt_audience: Option<String>) -> Self {
        Self {
            jwt_secret,
            jwt_issuer,
            jwt_audience,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.jwt_issuer.clone(),
            cfg.jwt_audience.clone(),
        )
    }
}

/// Validates bearer tokens
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("jwt_issuer", &self.config.jwt_issuer)
            .field("jwt_audience", &self.config.jwt_audience)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &config.jwt_issuer {
            validation.set_issuer(&[issuer.as_str()]);
        }
        if let Some(audience) = &config.jwt_audience {
            validation.set_audience(&[audience.as_str()]);
        }

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            config,
        }
    }

    /// Validate a JWT token and extract the claims
    pub async fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })?
            .claims;

        Ok(claims)
    }

    /// Resolves the caller behind `Authorization: Bearer <token>`.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthUser, AuthError> {
        let token = bearer_token(headers)?;
        let claims = self.validate_token(token).await?;
        AuthUser::try_from(claims)
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidToken)?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .ok_or(AuthError::InvalidToken)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

/// Authentication error types
#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("Missing token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Authentication service not available")]
    ServiceUnavailable,
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::ServiceUnavailable => ServiceError::InternalError(err.to_string()),
            other => ServiceError::Unauthenticated(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

/// Authentication middleware that extracts and validates auth tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => return AuthError::ServiceUnavailable.into_response(),
    };

    match auth_service.authenticate(request.headers()).await {
        Ok(user) => {
            debug!(user_id = %user.user_id, role = %user.role, "Authenticated request");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            debug!(error = %e, "Rejected request");
            e.into_response()
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }
}
