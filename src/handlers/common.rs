use crate::errors::ApiError;
use crate::models::{RequirementFilter, RequirementPriority, RequirementStatus};
use axum::{
    async_trait,
    body::Bytes,
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts, Path, Query, Request,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(crate::ApiResponse::success(data))).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(crate::ApiResponse::success(data))).into_response()
}

/// JSON body extractor whose rejections (malformed JSON, missing fields,
/// unknown enum values) render as 400 validation errors.
///
/// Field rules are checked later by the service, after authorization.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::ValidationError("Expected a JSON request body".to_string())
        }
        other => ApiError::ValidationError(other.body_text()),
    }
}

/// Path extractor for resource ids. An id that does not parse names no
/// resource, so it renders as 404 like any other unknown id.
#[derive(Debug, Clone)]
pub struct IdPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for IdPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(PathRejection::FailedToDeserializePathParams(e)) => {
                Err(ApiError::NotFound(format!("Resource not found: {}", e.body_text())))
            }
            Err(other) => Err(ApiError::ValidationError(other.body_text())),
        }
    }
}

/// Query extractor whose rejections render as 400 validation errors.
#[derive(Debug, Clone)]
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|rejection| ApiError::ValidationError(rejection.body_text()))
    }
}

/// Body that may be omitted entirely; an empty body yields `None`.
#[derive(Debug, Clone)]
pub struct OptionalJson<T>(pub Option<T>);

#[async_trait]
impl<S, T> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::ValidationError(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(None));
        }
        serde_json::from_slice(&bytes)
            .map(|value| Self(Some(value)))
            .map_err(|e| ApiError::ValidationError(format!("Invalid JSON body: {}", e)))
    }
}

/// Query parameters accepted by the requirement listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RequirementListQuery {
    /// Filter by status, e.g. `pending_approval`
    pub status: Option<String>,
    /// Filter by priority: low, medium, high or critical
    pub priority: Option<String>,
    /// Filter by creator user id
    pub created_by: Option<String>,
    pub company_id: Option<String>,
    pub cost_center: Option<String>,
    /// Page size (default 10, max 100)
    pub limit: Option<u64>,
    /// Number of records to skip (default 0)
    pub offset: Option<u64>,
}

impl RequirementListQuery {
    pub fn filter(&self) -> Result<RequirementFilter, ApiError> {
        Ok(RequirementFilter {
            status: parse_optional::<RequirementStatus>(self.status.as_deref(), "Invalid status")?,
            priority: parse_optional::<RequirementPriority>(
                self.priority.as_deref(),
                "Invalid priority",
            )?,
            created_by: non_blank(&self.created_by),
            company_id: non_blank(&self.company_id),
            cost_center: non_blank(&self.cost_center),
        })
    }
}

fn parse_optional<T: FromStr>(raw: Option<&str>, message: &str) -> Result<Option<T>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ApiError::ValidationError(format!("{}: {}", message, value))),
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Pagination block of a list response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
    pub has_more: bool,
}

/// Optional body of the cancel transition.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub reason: Option<String>,
}

/// Optional body of the approve and reject transitions.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecisionComments {
    pub comments: Option<String>,
}
