use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};
use utoipa::ToSchema;
use uuid::Uuid;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Conflict",
    "code": "already_assigned",
    "message": "Order 550e8400-e29b-41d4-a716-446655440000 is already assigned to vendor 7c9e6679-7425-40de-944b-e07fc1f90ae7",
    "details": null,
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    #[schema(example = "Conflict")]
    pub error: String,
    /// Machine-readable error code
    #[schema(example = "already_assigned")]
    pub code: String,
    /// Human-readable error description
    pub message: String,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "req-abc123xyz")]
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

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Order {order_id} is already assigned to vendor {vendor_id}")]
    AlreadyAssigned { order_id: Uuid, vendor_id: Uuid },

    #[error("No vendor is available for order {0}")]
    NoVendorAvailable(Uuid),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Conflict: {0}")]
    Conflict(String),

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
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AuthError(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyAssigned { .. } | Self::InvalidTransition(_) | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::NoVendorAvailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::DatabaseError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code carried in every error body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthError(_) | Self::Forbidden(_) => "auth_error",
            Self::ValidationError(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::AlreadyAssigned { .. } => "already_assigned",
            Self::NoVendorAvailable(_) => "no_vendor_available",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::Conflict(_) => "conflict",
            Self::DatabaseError(_)
            | Self::InternalError(_)
            | Self::Other(_) => "service_error",
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Storage and internal failures collapse to a generic message.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_)
            | Self::InternalError(_)
            | Self::Other(_) => "Service error".to_string(),
            _ => self.to_string(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::AlreadyAssigned {
                order_id,
                vendor_id,
            } => Some(json!({ "order_id": order_id, "vendor_id": vendor_id })),
            Self::NoVendorAvailable(order_id) => Some(json!({ "order_id": order_id })),
            _ => None,
        }
    }

    /// Whether the failure is worth retrying at the storage layer.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError(DbErr::ConnectionAcquire(_) | DbErr::Conn(_))
        )
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Self::InvalidTransition(msg) => warn!(code = self.code(), "{}", msg),
            _ if status.is_server_error() => error!(code = self.code(), error = %self, "request failed"),
            _ => {}
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: self.code().to_string(),
            message: self.response_message(),
            details: self.details(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, http::StatusCode};
    use rstest::rstest;

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
        assert_eq!(payload.code, "not_found");
    }

    #[rstest]
    #[case(ServiceError::AuthError("x".into()), StatusCode::UNAUTHORIZED, "auth_error")]
    #[case(ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN, "auth_error")]
    #[case(ServiceError::ValidationError("x".into()), StatusCode::BAD_REQUEST, "validation_error")]
    #[case(ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND, "not_found")]
    #[case(
        ServiceError::AlreadyAssigned { order_id: Uuid::nil(), vendor_id: Uuid::nil() },
        StatusCode::CONFLICT,
        "already_assigned"
    )]
    #[case(
        ServiceError::NoVendorAvailable(Uuid::nil()),
        StatusCode::SERVICE_UNAVAILABLE,
        "no_vendor_available"
    )]
    #[case(ServiceError::InvalidTransition("x".into()), StatusCode::CONFLICT, "invalid_transition")]
    #[case(ServiceError::Conflict("x".into()), StatusCode::CONFLICT, "conflict")]
    #[case(
        ServiceError::DatabaseError(DbErr::Custom("boom".into())),
        StatusCode::INTERNAL_SERVER_ERROR,
        "service_error"
    )]
    fn status_and_code_mapping(
        #[case] err: ServiceError,
        #[case] status: StatusCode,
        #[case] code: &str,
    ) {
        assert_eq!(err.status_code(), status);
        assert_eq!(err.code(), code);
    }

    #[test]
    fn storage_errors_are_not_leaked() {
        let err = ServiceError::DatabaseError(DbErr::Custom("relation orders missing".into()));
        assert_eq!(err.response_message(), "Service error");

        assert_eq!(
            ServiceError::ValidationError("items must not be empty".into()).response_message(),
            "Validation error: items must not be empty"
        );
    }

    #[tokio::test]
    async fn already_assigned_body_carries_vendor() {
        let order_id = Uuid::new_v4();
        let vendor_id = Uuid::new_v4();
        let response = ServiceError::AlreadyAssigned {
            order_id,
            vendor_id,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        let details = payload.details.unwrap();
        assert_eq!(details["vendor_id"], json!(vendor_id));
    }

    #[test]
    fn only_connection_failures_are_transient() {
        assert!(ServiceError::DatabaseError(DbErr::Conn(sea_orm::RuntimeErr::Internal(
            "reset".into()
        )))
        .is_transient());
        assert!(!ServiceError::DatabaseError(DbErr::Custom("bad".into())).is_transient());
        assert!(!ServiceError::Conflict("x".into()).is_transient());
    }
}
