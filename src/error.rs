// Pipeline error types
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

/// Terminal outcome of a failed pipeline stage.
///
/// Every stage funnels into one of these and the dispatcher turns it into
/// exactly one response.
#[derive(Debug, Error)]
pub enum PipelineError {
    // 404 Not Found
    #[error("no route matches the request")]
    NotFound,

    // 401 Unauthorized
    #[error("authentication failed")]
    Unauthenticated,

    // 403 Forbidden
    #[error("authorization failed")]
    Unauthorized,

    // 413 Payload Too Large
    #[error("request body exceeds the buffering limit")]
    PayloadTooLarge,

    // 400 Bad Request
    #[error("validation failed")]
    ValidationFailure { errors: Value },

    // 500 Internal Server Error
    #[error("internal failure: {0:#}")]
    InternalFailure(#[from] anyhow::Error),
}

impl PipelineError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::NotFound => 404,
            PipelineError::Unauthenticated => 401,
            PipelineError::Unauthorized => 403,
            PipelineError::PayloadTooLarge => 413,
            PipelineError::ValidationFailure { .. } => 400,
            PipelineError::InternalFailure(_) => 500,
        }
    }

    /// Get error code for log correlation
    pub fn error_code(&self) -> &'static str {
        match self {
            PipelineError::NotFound => "NOT_FOUND",
            PipelineError::Unauthenticated => "UNAUTHENTICATED",
            PipelineError::Unauthorized => "UNAUTHORIZED",
            PipelineError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            PipelineError::ValidationFailure { .. } => "VALIDATION_FAILURE",
            PipelineError::InternalFailure(_) => "INTERNAL_FAILURE",
        }
    }

    /// Body sent to the caller. Only validation failures expose detail.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            PipelineError::ValidationFailure { errors } => Some(json!({ "validationErrors": errors })),
            _ => None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        PipelineError::InternalFailure(anyhow::anyhow!(message.into()))
    }

    pub fn validation(errors: Value) -> Self {
        PipelineError::ValidationFailure { errors }
    }
}

// Automatic HTTP response conversion for Axum
impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match self.to_json() {
            Some(body) => (status, Json(body)).into_response(),
            None => status.into_response(),
        }
    }
}

/// Error an action can raise to report invalid input.
///
/// Recognized by [`ValidationErrors`] when that classifier is configured;
/// otherwise it is an ordinary internal failure.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub errors: Vec<Value>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// Add a field-level error entry
    pub fn field(mut self, path: impl Into<String>, message: impl Into<String>) -> Self {
        self.errors.push(json!({
            "path": path.into(),
            "message": message.into(),
        }));
        self
    }
}

/// Decides whether an action error is a validation error.
///
/// Returns the `errors` payload to expose when it is.
pub trait ValidationClassifier: Send + Sync {
    fn classify(&self, error: &anyhow::Error) -> Option<Value>;
}

impl<F> ValidationClassifier for F
where
    F: Fn(&anyhow::Error) -> Option<Value> + Send + Sync,
{
    fn classify(&self, error: &anyhow::Error) -> Option<Value> {
        self(error)
    }
}

/// Classifier used when no persistence layer is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoValidation;

impl ValidationClassifier for NoValidation {
    fn classify(&self, _error: &anyhow::Error) -> Option<Value> {
        None
    }
}

/// Recognizes [`ValidationError`] anywhere in the error chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValidationErrors;

impl ValidationClassifier for ValidationErrors {
    fn classify(&self, error: &anyhow::Error) -> Option<Value> {
        error
            .chain()
            .find_map(|cause| cause.downcast_ref::<ValidationError>())
            .map(|validation| Value::Array(validation.errors.clone()))
    }
}
