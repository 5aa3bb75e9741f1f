use crate::builder::BuildError;
use crate::editor::EditError;
use crate::hcl_documents::LoadError;
use crate::toolchain::ToolchainError;
use crate::value::TypeMismatch;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    TypeMismatch(String),
    #[error("{0}")]
    InvalidIdentifier(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AttributeNotWritable(String),
    #[error("{0}")]
    ToolchainLoadFailure(String),
    #[error("{0}")]
    Io(String),
    #[error("{0}")]
    Internal(String),
}

/// Body of every error response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::TypeMismatch(_) => "TypeMismatch",
            ApiError::InvalidIdentifier(_) => "InvalidIdentifier",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::NotFound(_) => "NotFound",
            ApiError::AttributeNotWritable(_) => "AttributeNotWritable",
            ApiError::ToolchainLoadFailure(_) => "ToolchainLoadFailure",
            ApiError::Io(_) => "IOError",
            ApiError::Internal(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::TypeMismatch(_) | ApiError::InvalidIdentifier(_) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::AttributeNotWritable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::ToolchainLoadFailure(_) | ApiError::Io(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error=%self, "request failed");
        } else {
            tracing::debug!(kind = self.kind(), error=%self, "request rejected");
        }

        let body = ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<TypeMismatch> for ApiError {
    fn from(err: TypeMismatch) -> Self {
        ApiError::TypeMismatch(err.to_string())
    }
}

impl From<LoadError> for ApiError {
    fn from(err: LoadError) -> Self {
        ApiError::ToolchainLoadFailure(err.to_string())
    }
}

impl From<ToolchainError> for ApiError {
    fn from(err: ToolchainError) -> Self {
        ApiError::ToolchainLoadFailure(err.to_string())
    }
}

impl From<EditError> for ApiError {
    fn from(err: EditError) -> Self {
        match err {
            EditError::InvalidAttributeName(_) => ApiError::InvalidIdentifier(err.to_string()),
            EditError::AttributeNotWritable { .. } => ApiError::AttributeNotWritable(err.to_string()),
            EditError::Io { .. } => ApiError::Io(err.to_string()),
        }
    }
}

impl From<BuildError> for ApiError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::InvalidIdentifier(_) => ApiError::InvalidIdentifier(err.to_string()),
            BuildError::TypeMismatch { .. } => ApiError::TypeMismatch(err.to_string()),
            BuildError::Format(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
