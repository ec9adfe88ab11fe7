use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing multipart field `{0}`")]
    MissingField(&'static str),
    #[error("invalid upload: {0}")]
    InvalidUpload(String),
    #[error("{}", .0.body_text())]
    Multipart(#[from] MultipartError),
    #[error("detector produced no annotated image")]
    NoOutput,
    #[error("detection task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingField(_) | ApiError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            ApiError::Multipart(err) => err.status(),
            ApiError::NoOutput => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Join(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = format!("{:#}", self), "Detect request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Detect request rejected");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
