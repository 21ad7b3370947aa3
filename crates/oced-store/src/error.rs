//! Error types for store operations.

use oced_types::{EntityKind, EventId, EventTime, TypeError};
use thiserror::Error;

/// Errors produced by the OCED store.
///
/// Every mutation error is returned only after the store has been rolled
/// back to its state before the call.
#[derive(Debug, Error)]
pub enum OcedError {
    /// A supplied value does not have the expected shape.
    #[error("type mismatch in {field}: {reason}")]
    TypeMismatch { field: String, reason: String },

    /// Reference to an entity that does not exist.
    #[error("unknown {kind} id: {id}")]
    UnknownId { kind: EntityKind, id: String },

    /// Create with an id that is live or was used before.
    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: EntityKind, id: String },

    /// Event time is not strictly after the latest committed event.
    #[error("event time {proposed} is not after the latest committed time {current_max}")]
    OrderingViolation {
        proposed: EventTime,
        current_max: EventTime,
    },

    /// A referential-integrity rule would be broken.
    #[error("integrity violation: {reason} [{}]", ids.join(", "))]
    IntegrityViolation { reason: String, ids: Vec<String> },

    /// The event cannot be reverted without disturbing later history.
    #[error("cannot revert event {event_id}: {reason}")]
    Conflict { event_id: EventId, reason: String },

    /// Every event id has been handed out.
    #[error("event id space exhausted at {0}")]
    EventIdsExhausted(EventId),

    /// A snapshot failed its version, digest, or integrity checks.
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// Store configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error while reading or writing snapshot files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The store lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl OcedError {
    pub(crate) fn unknown(kind: EntityKind, id: impl ToString) -> Self {
        Self::UnknownId {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn duplicate(kind: EntityKind, id: impl ToString) -> Self {
        Self::DuplicateId {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn integrity(reason: impl Into<String>, ids: Vec<String>) -> Self {
        Self::IntegrityViolation {
            reason: reason.into(),
            ids,
        }
    }

    pub(crate) fn type_mismatch(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<TypeError> for OcedError {
    fn from(error: TypeError) -> Self {
        let field = match &error {
            TypeError::InvalidTime { .. } => "time",
            TypeError::InvalidEventId(_) => "event_id",
        };
        Self::type_mismatch(field, error.to_string())
    }
}

impl From<serde_json::Error> for OcedError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Convenience type alias for store operations.
pub type Result<T> = std::result::Result<T, OcedError>;
