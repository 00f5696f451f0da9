use thiserror::Error;

/// A configuration or derived value outside its permitted range.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Invalid value for '{parameter}': {reason}")]
pub struct InvalidParameterError {
    pub parameter: String,
    pub reason: String,
}

impl InvalidParameterError {
    pub fn new(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }
}
