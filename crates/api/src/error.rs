use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ptt_core::error::CoreError;
use ptt_db::OdaError;
use serde::Serialize;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`OdaError`] and adds HTTP-specific variants.
/// Every error renders as `{"detail": "<message>"}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `ptt_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An error raised by the ODA backend.
    #[error(transparent)]
    Oda(#[from] OdaError),

    /// A malformed request (400).
    #[error("{0}")]
    BadRequest(String),

    /// A well-formed request whose content cannot be processed (422).
    #[error("{0}")]
    Unprocessable(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

/// Details of a 500 response, attached as a response extension.
///
/// The client only ever sees them when the server is not running in
/// production mode; see [`crate::middleware::diagnostics`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDiagnostics {
    pub title: String,
    pub description: String,
    pub traceback: String,
}

impl ErrorDiagnostics {
    /// Describe an error and its chain of sources.
    pub fn from_error(title: &str, err: &(dyn std::error::Error + 'static)) -> Self {
        let mut traceback = vec![err.to_string()];
        let mut source = err.source();
        while let Some(cause) = source {
            traceback.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        Self {
            title: title.to_string(),
            description: format!("{err:?}"),
            traceback: traceback.join("\n"),
        }
    }
}

/// The body of every 500 response in production.
pub const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

fn classify_core(err: &CoreError) -> StatusCode {
    match err {
        CoreError::NotFound { .. } | CoreError::UnknownEntity(_) => StatusCode::NOT_FOUND,
        CoreError::QueryParameter(_) => StatusCode::BAD_REQUEST,
        CoreError::Validation(_) | CoreError::InvalidStatus(_) | CoreError::Mismatch { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

impl AppError {
    /// HTTP status plus, for internal failures, the name used as the
    /// diagnostic title.
    fn classify(&self) -> (StatusCode, Option<&'static str>) {
        match self {
            AppError::Core(core) => (classify_core(core), None),
            AppError::Oda(oda) => match oda {
                OdaError::NotFound { .. } => (StatusCode::NOT_FOUND, None),
                OdaError::VersionConflict { .. } => (StatusCode::CONFLICT, None),
                OdaError::Core(core) => (classify_core(core), None),
                OdaError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, Some("DatabaseError")),
                OdaError::Migration(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, Some("MigrationError"))
                }
                OdaError::Serialization(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, Some("SerializationError"))
                }
                OdaError::Io { .. } => (StatusCode::INTERNAL_SERVER_ERROR, Some("IoError")),
                OdaError::Corrupt(_) => (StatusCode::INTERNAL_SERVER_ERROR, Some("CorruptData")),
            },
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            AppError::Unprocessable(_) => (StatusCode::UNPROCESSABLE_ENTITY, None),
            AppError::InternalError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Some("InternalError"))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, title) = self.classify();

        let Some(title) = title else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request failed");
            return (status, axum::Json(json!({ "detail": self.to_string() }))).into_response();
        };

        tracing::error!(error = %self, "Internal error");
        let diagnostics = ErrorDiagnostics::from_error(title, &self);
        let mut response = (
            status,
            axum::Json(json!({ "detail": INTERNAL_SERVER_ERROR })),
        )
            .into_response();
        response.extensions_mut().insert(diagnostics);
        response
    }
}
