use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dataseal_protocol::ProtocolError;
use dataseal_types::{DataSealError, ErrorCategory};
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    category: &'static str,
}

/// Error returned by handlers, rendered as `{"error": ..., "category": ...}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    category: &'static str,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            category: "precondition",
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::FORBIDDEN,
            category: "precondition",
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            category: "internal",
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<DataSealError> for ApiError {
    fn from(err: DataSealError) -> Self {
        ApiError::from(ProtocolError::from(err))
    }
}

impl From<ProtocolError> for ApiError {
    fn from(err: ProtocolError) -> Self {
        let (status, category) = match (err.rejection(), err.category()) {
            (
                Some(DataSealError::TaskNotFound(_))
                | Some(DataSealError::OracleNotFound(_))
                | Some(DataSealError::EscrowNotFound(_)),
                _,
            ) => (StatusCode::NOT_FOUND, "precondition"),
            (Some(DataSealError::Unauthorized { .. }), _) => (StatusCode::FORBIDDEN, "precondition"),
            (_, ErrorCategory::Precondition) => (StatusCode::CONFLICT, "precondition"),
            (_, ErrorCategory::Economic) => (StatusCode::CONFLICT, "economic"),
            (_, ErrorCategory::Internal) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        ApiError {
            status,
            category,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            category: self.category,
        };
        (self.status, Json(body)).into_response()
    }
}
