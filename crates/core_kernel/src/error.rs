//! Kernel errors
//!
//! Domain crates carry their own error enums; this one covers the shared
//! value types and the settings read at startup.

use thiserror::Error;
use crate::money::MoneyError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    /// Malformed input such as an unparsable identifier
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or inconsistent settings, catalog seeds included
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        CoreError::Configuration(message.into())
    }
}
