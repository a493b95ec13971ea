use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Schema validation failed with {} violation(s):\n{}", .0.len(), .0.join("\n"))]
    SchemaValidation(Vec<String>),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Freshness error: {0}")]
    Freshness(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Build lock held: {0}")]
    Locked(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
