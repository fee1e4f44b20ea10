//! Error types for the tracker crate

use thiserror::Error;

/// Errors raised by the tracker
///
/// Diff rendering errors never leave the diff builder; they are rendered
/// into the diff text instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Attribute has a value of the wrong shape
    #[error("attribute '{name}' must be {expected}")]
    InvalidAttribute {
        name: String,
        expected: &'static str,
    },

    /// Status string outside the report vocabulary
    #[error("unknown status '{0}'")]
    UnknownStatus(String),
}

/// Result type for tracker operations
pub type Result<T> = std::result::Result<T, Error>;
