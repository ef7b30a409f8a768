use thiserror::Error;

#[derive(Error, Debug)]
pub enum OneiricError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// User-correctable input problem. Maps to HTTP 400.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced record or embedding is absent. Maps to HTTP 404.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Store or LLM collaborator failed. Maps to HTTP 500 with a generic
    /// message; the detail is logged server-side only.
    #[error("Upstream failure: {0}")]
    Upstream(String),
}
