use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::reference::ReferenceError;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum ErrorCode {
    // Validation errors (VALID_xxx)
    ValidInvalidInput,
    ValidMissingRequiredField,

    // Resource errors (RESOURCE_xxx)
    ResourceNotFound,

    // System errors (SYSTEM_xxx)
    SystemConfigurationError,
    SystemMetadataStoreError,
    SystemExternalServiceError,
    SystemInternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidInvalidInput => "VALID_INVALID_INPUT",
            ErrorCode::ValidMissingRequiredField => "VALID_MISSING_REQUIRED_FIELD",
            ErrorCode::ResourceNotFound => "RESOURCE_NOT_FOUND",
            ErrorCode::SystemConfigurationError => "SYSTEM_CONFIGURATION_ERROR",
            ErrorCode::SystemMetadataStoreError => "SYSTEM_METADATA_STORE_ERROR",
            ErrorCode::SystemExternalServiceError => "SYSTEM_EXTERNAL_SERVICE_ERROR",
            ErrorCode::SystemInternalError => "SYSTEM_INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::ValidInvalidInput | ErrorCode::ValidMissingRequiredField => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::ResourceNotFound => StatusCode::NOT_FOUND,
            ErrorCode::SystemConfigurationError
            | ErrorCode::SystemMetadataStoreError
            | ErrorCode::SystemExternalServiceError
            | ErrorCode::SystemInternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AppError {
    code: ErrorCode,
    message: String,
    details: Option<serde_json::Value>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidInvalidInput, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SystemInternalError, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl From<ReferenceError> for AppError {
    fn from(error: ReferenceError) -> Self {
        let code = match &error {
            ReferenceError::InvalidRequest(_) => ErrorCode::ValidInvalidInput,
            ReferenceError::ConfigurationMissing(_) => ErrorCode::SystemConfigurationError,
            ReferenceError::MetadataStore(_) => ErrorCode::SystemMetadataStoreError,
            ReferenceError::Provider(_) | ReferenceError::DimensionMismatch { .. } => {
                ErrorCode::SystemExternalServiceError
            }
        };
        Self::new(code, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_reports_failure() {
        let body = ApiError {
            success: false,
            error: "deckName must not be empty".to_string(),
            error_code: ErrorCode::ValidInvalidInput.as_str().to_string(),
            details: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error_code"], "VALID_INVALID_INPUT");
    }

    #[test]
    fn test_reference_error_mapping() {
        let bad: AppError = ReferenceError::InvalidRequest("no input".to_string()).into();
        assert_eq!(bad.code.status_code(), StatusCode::BAD_REQUEST);

        let provider: AppError = ReferenceError::Provider("timeout".to_string()).into();
        assert_eq!(provider.code.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed ({}): {}", self.code, self.message);
        }
        let body = ApiError {
            success: false,
            error: self.message,
            error_code: self.code.as_str().to_string(),
            details: self.details,
        };
        (status, Json(body)).into_response()
    }
}
