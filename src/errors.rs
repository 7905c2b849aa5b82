use crate::classifier::ClassifierError;
use crate::dataset::DatasetError;
use crate::derivation::DerivationError;
use crate::features::SchemaError;
use crate::validation::FieldViolation;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Resource not found error.
    NotFound(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// Applicant input outside the accepted ranges.
    Validation(Vec<FieldViolation>),
    /// The classifier failed for this request.
    ModelError(String),
    /// A start-up resource (model or dataset) is not loaded.
    ServiceUnavailable(String),
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Validation(violations) => {
                write!(f, "Validation failed on {} field(s)", violations.len())
            }
            AppError::ModelError(msg) => write!(f, "Model error: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and JSON body.
    /// Logs errors appropriately based on their severity.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Validation(violations) => {
                let body = Json(json!({
                    "error": "Validation failed",
                    "violations": violations,
                }));
                return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
            }
            AppError::ModelError(msg) => {
                tracing::error!("Model error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Model inference failed".to_string(),
                )
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone())
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::WithContext { source, context } => {
                // Log full context chain for debugging
                tracing::error!("Error with context: {} -> {}", context, source);
                // Delegate to underlying error's response
                return source.clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<Vec<FieldViolation>> for AppError {
    fn from(violations: Vec<FieldViolation>) -> Self {
        AppError::Validation(violations)
    }
}

impl From<ClassifierError> for AppError {
    /// Every classifier failure is terminal for the request.
    fn from(err: ClassifierError) -> Self {
        AppError::ModelError(err.to_string())
    }
}

impl From<DerivationError> for AppError {
    fn from(err: DerivationError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<SchemaError> for AppError {
    fn from(err: SchemaError) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<DatasetError> for AppError {
    fn from(err: DatasetError) -> Self {
        match err {
            DatasetError::InvalidBins(_) | DatasetError::InvalidLimit(_) => {
                AppError::BadRequest(err.to_string())
            }
            other => AppError::InternalError(other.to_string()),
        }
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    ///
    /// # Arguments
    ///
    /// * `context` - The context message to add.
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

/// Extension for classifier errors to add context
impl<T> ResultExt<T> for Result<T, ClassifierError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::from(e)),
            context: context.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = vec![
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (
                AppError::Validation(Vec::new()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (AppError::ModelError("x".into()), StatusCode::BAD_GATEWAY),
            (
                AppError::ServiceUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::InternalError("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_context_delegates_status_to_source() {
        let result: Result<(), ClassifierError> =
            Err(ClassifierError::Inference("boom".to_string()));
        let err = result.context("Scoring applicant").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Scoring applicant: Model error: Inference failed: boom"
        );
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_invalid_bins_is_bad_request() {
        let err = AppError::from(DatasetError::InvalidBins(0));
        assert!(matches!(err, AppError::BadRequest(_)));
        let err = AppError::from(DatasetError::InvalidLimit(0));
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
