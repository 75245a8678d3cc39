use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Bad Request",
    "message": "Invalid state: Only draft requirements can be deleted",
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    #[schema(example = "Bad Request")]
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Additional error details, such as per-field validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Missing, malformed, or expired identity token.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated, but the actor may not perform the action.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requirement's current status does not allow the action.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(Uuid),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    pub fn db_error(error: impl Into<DbErr>) -> Self {
        ServiceError::DatabaseError(error.into())
    }

    pub fn requirement_not_found(id: Uuid) -> Self {
        ServiceError::NotFound(format!("Requirement {} not found", id))
    }

    pub fn item_not_found(id: Uuid) -> Self {
        ServiceError::NotFound(format!("Requirement item {} not found", id))
    }

    /// Short label used for failure metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidState(_) => "invalid_state",
            Self::ConcurrentModification(_) => "conflict",
            Self::EventError(_) => "event",
            Self::InternalError(_) | Self::Other(_) => "internal",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidState(_) => StatusCode::BAD_REQUEST,
            // Token failures surface as 403 just like permission failures.
            Self::Unauthenticated(_) | Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::ConcurrentModification(_) => StatusCode::CONFLICT,
            Self::DatabaseError(_)
            | Self::EventError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Dependency failures return generic messages.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::EventError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            Self::ConcurrentModification(id) => {
                format!("Requirement {} was modified concurrently, retry the request", id)
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        crate::metrics::record_failure(self.kind());
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: None,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

/// API Error type for HTTP responses
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Service error: {0}")]
    ServiceError(#[from] ServiceError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match self {
            ApiError::ServiceError(service_error) => return service_error.into_response(),
            ApiError::ValidationError(msg) => {
                crate::metrics::record_failure("validation");
                (
                    StatusCode::BAD_REQUEST,
                    "Validation failed".to_string(),
                    Some(msg),
                )
            }
            ApiError::NotFound(msg) => {
                crate::metrics::record_failure("not_found");
                (StatusCode::NOT_FOUND, msg, None)
            }
        };

        let error_response = ErrorResponse {
            error: status
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string(),
            message: error_message,
            details,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn service_error_response_includes_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::NotFound("missing".into()).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
    }

    #[test]
    fn taxonomy_maps_to_http_statuses() {
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::InvalidState("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Unauthenticated("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ConcurrentModification(Uuid::nil()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::db_error(DbErr::Custom("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn dependency_errors_hide_details() {
        assert_eq!(
            ServiceError::db_error(DbErr::Custom("password=hunter2".into())).response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::EventError("channel closed".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::InvalidState("Only draft requirements can be deleted".into())
                .response_message(),
            "Invalid state: Only draft requirements can be deleted"
        );
    }

    #[tokio::test]
    async fn api_validation_error_carries_details() {
        let response = ApiError::ValidationError("title: length".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.message, "Validation failed");
        assert_eq!(payload.details.as_deref(), Some("title: length"));
    }
}
