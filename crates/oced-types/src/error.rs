use thiserror::Error;

/// Errors produced by type parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid ISO-8601 time {input:?}: {reason}")]
    InvalidTime { input: String, reason: String },

    #[error("invalid event id {0:?}: expected a positive integer")]
    InvalidEventId(String),
}
