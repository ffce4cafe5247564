use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    DuplicateData(String),

    #[error("Authentication credentials were not provided")]
    Unauthorized,

    #[error("You do not have permission to perform this action")]
    PermissionDenied,

    #[error("Maximum number of profiles (max {0}) per prompt studio project has been reached")]
    MaxProfilesReached(usize),

    #[error("{0} not found")]
    NotFound(String),

    #[error("File not found")]
    FileNotFound,

    #[error("Failed to delete tool, its used in other workflows. Delete its usages first")]
    ToolDeleteBlocked,

    #[error("{0}")]
    ToolExport(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Upload exceeds the maximum size of {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Error while indexing file")]
    IndexingApi,

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AppError {
    fn error_type(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::DuplicateData(_) => "duplicate_data",
            AppError::Unauthorized => "not_authenticated",
            AppError::PermissionDenied => "permission_denied",
            AppError::MaxProfilesReached(_) => "max_profiles_reached",
            AppError::NotFound(_) | AppError::FileNotFound => "not_found",
            AppError::ToolDeleteBlocked => "tool_delete_error",
            AppError::ToolExport(_) => "tool_export_error",
            AppError::UnsupportedFileType(_) => "unsupported_file_type",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::IndexingApi => "indexing_error",
            AppError::InternalError(_)
            | AppError::StorageError(_)
            | AppError::SerializationError(_) => "api_error",
        }
    }

    /// Message sent to the client. Internal failures are reduced to a generic
    /// message; the detail only goes to the log.
    fn public_message(&self) -> String {
        match self {
            AppError::InternalError(_)
            | AppError::StorageError(_)
            | AppError::SerializationError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct JsonError {
    message: String,
    r#type: String,
}

#[derive(Serialize)]
struct JsonErrorWrapper {
    error: JsonError,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateData(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied => StatusCode::FORBIDDEN,
            AppError::MaxProfilesReached(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::FileNotFound => StatusCode::NOT_FOUND,
            AppError::ToolDeleteBlocked => StatusCode::CONFLICT,
            AppError::ToolExport(_) => StatusCode::BAD_REQUEST,
            AppError::UnsupportedFileType(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::IndexingApi => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::SerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            log::error!("{}", self);
        }
        let error_response = JsonErrorWrapper {
            error: JsonError {
                message: self.public_message(),
                r#type: self.error_type().to_string(),
            },
        };
        HttpResponse::build(status_code).json(error_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_errors_hide_detail() {
        let err = AppError::InternalError(anyhow::anyhow!("db password leaked"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_domain_errors_map_to_client_statuses() {
        assert_eq!(
            AppError::MaxProfilesReached(4).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::ToolDeleteBlocked.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::DuplicateData("dup".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::PayloadTooLarge(1024).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert!(AppError::MaxProfilesReached(4)
            .public_message()
            .contains("max 4"));
    }
}
