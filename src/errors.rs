use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Conflict", "Unprocessable Entity")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Operation not valid from the entity's current location/status.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Split children do not sum to the parent's current quantity.
    #[error("Quantity mismatch: children sum to {children_sum}, parent holds {parent_quantity}")]
    QuantityMismatch {
        parent_quantity: i32,
        children_sum: i32,
    },

    /// Hard backpressure: the machine's card pool is exhausted.
    #[error("No free card available for machine {machine_id}")]
    NoCardAvailable { machine_id: i32 },

    /// Mutation attempted on an archived batch.
    #[error("Batch {0} is archived and immutable")]
    ImmutableBatch(i32),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Another writer changed the row between our read and our guarded write.
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::EventError(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::QuantityMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidState(_)
            | Self::NoCardAvailable { .. }
            | Self::ImmutableBatch(_)
            | Self::ConcurrentModification(_) => StatusCode::CONFLICT,
        }
    }

    /// Message safe to expose to callers. Database and internal errors are
    /// logged server-side and replaced with a generic line.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(err) => {
                tracing::error!(error = %err, "database error surfaced to handler");
                "Internal server error".to_string()
            }
            Self::InternalError(err) => {
                tracing::error!(error = %err, "internal error surfaced to handler");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_conflict_family() {
        assert_eq!(
            ServiceError::NoCardAvailable { machine_id: 1 }.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::ImmutableBatch(7).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::QuantityMismatch {
                parent_quantity: 360,
                children_sum: 140
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn database_errors_are_not_leaked() {
        let err = ServiceError::DatabaseError(sea_orm::error::DbErr::Custom("secret".into()));
        assert_eq!(err.response_message(), "Internal server error");
    }
}
