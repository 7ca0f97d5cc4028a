use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid memory limit '{0}': expected <integer>M or <integer>G")]
    InvalidMemoryLimit(String),

    #[error("unknown scheduler kind: {0}")]
    UnknownScheduler(String),

    #[error("unknown value type: {0}")]
    UnknownValueType(String),

    #[error("unknown readiness strategy: {0}")]
    UnknownReadiness(String),

    #[error("invalid model: {0}")]
    Invalid(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
