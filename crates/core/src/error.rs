#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("The requested identifier {identifier} could not be found.")]
    NotFound { identifier: String },

    #[error("The requested entity {0} could not be found.")]
    UnknownEntity(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidStatus(String),

    #[error("{0}")]
    QueryParameter(String),

    #[error(
        "There is a mismatch between the identifier for the endpoint {path} and the JSON payload {body}"
    )]
    Mismatch { path: String, body: String },
}

impl CoreError {
    pub fn not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
        }
    }

    pub fn missing_field(field: &str) -> Self {
        Self::Validation(format!("Field required: {field}"))
    }
}
