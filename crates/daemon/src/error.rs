use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use engine::{ActionError, ContextError, TaskId};
use serde_json::json;

/// Failures surfaced by preprocessing and plan execution.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("video source unreadable: {0}")]
    SourceUnreadable(String),

    #[error("frame describer unavailable: {0}")]
    DescribeUnavailable(String),

    #[error("reasoning model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("transcription unavailable: {0}")]
    TranscriptionUnavailable(String),

    #[error("unknown task {0}")]
    UnknownTask(TaskId),

    #[error("malformed action arguments: {0}")]
    MalformedActionArguments(#[from] ActionError),

    #[error("invalid clip context: {0}")]
    InvalidContext(#[from] ContextError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::SourceUnreadable(_) => "SourceUnreadable",
            CoreError::DescribeUnavailable(_) => "DescribeUnavailable",
            CoreError::ModelUnavailable(_) => "ModelUnavailable",
            CoreError::TranscriptionUnavailable(_) => "TranscriptionUnavailable",
            CoreError::UnknownTask(_) => "UnknownTask",
            CoreError::MalformedActionArguments(_) => "MalformedActionArguments",
            CoreError::InvalidContext(_) => "InvalidContext",
            CoreError::InvalidRequest(_) => "InvalidRequest",
            CoreError::Cancelled => "Cancelled",
            CoreError::Internal(_) => "Internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            CoreError::UnknownTask(_) => StatusCode::NOT_FOUND,
            CoreError::SourceUnreadable(_) | CoreError::MalformedActionArguments(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CoreError::InvalidContext(_) | CoreError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CoreError::DescribeUnavailable(_)
            | CoreError::ModelUnavailable(_)
            | CoreError::TranscriptionUnavailable(_) => StatusCode::BAD_GATEWAY,
            CoreError::Cancelled => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "request failed");
        } else {
            tracing::warn!(kind = self.kind(), error = %self, "request rejected");
        }
        let body = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
