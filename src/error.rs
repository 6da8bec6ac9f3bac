use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("File upload error: {0}")]
    FileUpload(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Template error: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Validation error: {0}")]
    ValidatorError(#[from] validator::ValidationErrors),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, error_code) = match &self {
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone(), "VALIDATION_ERROR")
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone(), "BAD_REQUEST")
            }
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Service is misconfigured".to_string(), "CONFIGURATION_ERROR")
            }
            AppError::FileUpload(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone(), "FILE_UPLOAD_ERROR")
            }
            AppError::ExternalService(msg) => {
                tracing::error!("External service error: {}", msg);
                (StatusCode::BAD_GATEWAY, "External service error".to_string(), "EXTERNAL_SERVICE_ERROR")
            }
            AppError::Template(e) => {
                tracing::error!("Template error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page".to_string(), "TEMPLATE_ERROR")
            }
            AppError::Serialization(e) => {
                tracing::error!("Serialization error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Serialization error".to_string(), "SERIALIZATION_ERROR")
            }
            AppError::Request(e) => {
                tracing::error!("Request error: {}", e);
                (StatusCode::BAD_GATEWAY, "Upstream request failed".to_string(), "REQUEST_ERROR")
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "IO error".to_string(), "IO_ERROR")
            }
            AppError::Jwt(e) => {
                tracing::error!("JWT signing error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to authorise with Google".to_string(), "JWT_ERROR")
            }
            AppError::ValidatorError(e) => {
                let validation_errors = e
                    .field_errors()
                    .iter()
                    .map(|(field, errors)| {
                        (
                            field.to_string(),
                            errors.iter().map(|e| e.message.as_ref().unwrap_or(&"Invalid value".into()).to_string()).collect::<Vec<_>>()
                        )
                    })
                    .collect::<std::collections::HashMap<String, Vec<String>>>();

                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": {
                            "code": "VALIDATION_ERROR",
                            "message": "Validation failed",
                            "details": validation_errors
                        }
                    }))
                ).into_response();
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": error_message
            }
        }));

        (status, body).into_response()
    }
}

impl AppError {
    pub fn external(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }

    /// 表单上展示给用户的简短说明
    ///
    /// Validator failures are flattened into one line so they fit the
    /// banner above the form.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::BadRequest(msg) | AppError::FileUpload(msg) => msg.clone(),
            AppError::ValidatorError(e) => {
                let mut messages: Vec<String> = e
                    .field_errors()
                    .values()
                    .flat_map(|errors| errors.iter())
                    .map(|err| {
                        err.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("Invalid value for {}", err.code))
                    })
                    .collect();
                messages.sort();
                messages.join(" ")
            }
            other => other.to_string(),
        }
    }

    /// 校验类错误不经过外部服务，直接提示用户修改表单
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_) | AppError::BadRequest(_) | AppError::FileUpload(_) | AppError::ValidatorError(_)
        )
    }
}
