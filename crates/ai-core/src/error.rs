use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("failed to parse config: {0}")]
    ConfigParse(String),

    #[error("invalid config: {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, AiError>;
