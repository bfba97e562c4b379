use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types for routes that may answer non-2xx.
///
/// The Telein webhook never uses this: it reports failures in-body.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Resource not found error.
    NotFound(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// Error interacting with an external API.
    ExternalApiError(String),
    /// Internal server error.
    InternalError(String),
    /// Unauthorized access error.
    Unauthorized(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status code and JSON body.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::ExternalApiError(msg) => {
                tracing::error!("External API error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "External service error".to_string(),
                )
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized access: {}", msg);
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return (**source).clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Extension trait for adding context to errors.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }
}

/// Outcomes of the webhook pipeline that are not a success.
///
/// These are expected, frequent results rather than faults, so they travel
/// as values and end up in the webhook response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Body was not a JSON object. Recovered by the acquisition fallback chain.
    PayloadDecodeFailure(String),
    /// Webhook body could not be read within the size limit.
    PayloadTooLarge { limit: usize },
    /// A mandatory lead field was empty after every candidate was tried.
    MissingRequiredField(&'static str),
    /// Downstream CRM answered with a non-2xx status.
    DownstreamRejection { status: u16, body: String },
    /// Transport failure talking to the downstream CRM (connect, timeout, ...).
    DownstreamUnreachable(String),
    /// API key is empty or still the deployment placeholder.
    UnconfiguredCredential,
}

impl PipelineError {
    /// Stable snake_case tag reported to webhook callers.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::PayloadDecodeFailure(_) => "payload_decode_failure",
            PipelineError::PayloadTooLarge { .. } => "payload_too_large",
            PipelineError::MissingRequiredField(_) => "missing_required_field",
            PipelineError::DownstreamRejection { .. } => "downstream_rejection",
            PipelineError::DownstreamUnreachable(_) => "downstream_unreachable",
            PipelineError::UnconfiguredCredential => "unconfigured_credential",
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::PayloadDecodeFailure(msg) => {
                write!(f, "Payload is not a JSON object: {}", msg)
            }
            PipelineError::PayloadTooLarge { limit } => {
                write!(f, "Request body exceeds {} bytes", limit)
            }
            PipelineError::MissingRequiredField(field) => {
                write!(f, "Required field '{}' not found in payload", field)
            }
            PipelineError::DownstreamRejection { status, body } => {
                write!(f, "CRM returned {}: {}", status, body)
            }
            PipelineError::DownstreamUnreachable(msg) => write!(f, "CRM request failed: {}", msg),
            PipelineError::UnconfiguredCredential => {
                write!(f, "CRM API key is not configured")
            }
        }
    }
}

impl std::error::Error for PipelineError {}
