use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    StoreError(String),
    StateTransitionError(String),
    OrchestrationError(String),
    CompositionError(String),
    ValidationError(String),
    ConfigurationError(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::StoreError(msg) => write!(f, "Store error: {msg}"),
            CoreError::StateTransitionError(msg) => write!(f, "State transition error: {msg}"),
            CoreError::OrchestrationError(msg) => write!(f, "Orchestration error: {msg}"),
            CoreError::CompositionError(msg) => write!(f, "Composition error: {msg}"),
            CoreError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            CoreError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

pub type Result<T> = std::result::Result<T, CoreError>;
