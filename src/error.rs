use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid record: {message}")]
    InvalidRecord { message: String },
}

pub type Result<T> = std::result::Result<T, DashboardError>;
