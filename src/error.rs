//! Error types for the background removal service

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, RemovalError>;

/// Error taxonomy for the request pipeline.
///
/// Variants split into client-input failures (`EmptyUpload`, `InvalidField`)
/// and internal processing failures (everything else), so the HTTP status
/// mapping is a pure function of the variant.
#[derive(Error, Debug)]
pub enum RemovalError {
    /// Uploaded image body was empty
    #[error("Empty upload")]
    EmptyUpload,

    /// Malformed or unparseable multipart form field
    #[error("{0}")]
    InvalidField(String),

    /// Input/output errors (file write failures, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Model resolution or loading errors
    #[error("Model error: {0}")]
    Model(String),

    /// Inference engine errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Pipeline processing errors
    #[error("Processing error: {0}")]
    Processing(String),
}

impl RemovalError {
    /// Create a new invalid field error
    pub fn invalid_field<S: Into<String>>(msg: S) -> Self {
        Self::InvalidField(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Whether this error was caused by the client's input
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::EmptyUpload | Self::InvalidField(_))
    }
}

impl ResponseError for RemovalError {
    fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Client errors surface their own message; processing failures keep
        // the upstream wrapper text so existing callers can match on it.
        let detail = if self.is_client_error() {
            self.to_string()
        } else {
            format!("Failed to remove background: {self}")
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "detail": detail }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_400() {
        assert_eq!(RemovalError::EmptyUpload.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RemovalError::invalid_field("quality must be an integer").status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_processing_errors_map_to_500() {
        assert_eq!(
            RemovalError::processing("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RemovalError::inference("onnx failed").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RemovalError::model("missing file").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_empty_upload_message_is_fixed() {
        assert_eq!(RemovalError::EmptyUpload.to_string(), "Empty upload");
    }
}
