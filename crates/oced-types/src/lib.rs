//! Foundation types for the Object-Centric Event Data (OCED) store.
//!
//! This crate provides the identifier and time types shared by the store and
//! its front ends. Every other OCED crate depends on `oced-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`]: Caller-chosen identifier of an object
//! - [`ObjectRelationId`]: Caller-chosen identifier of a directed relation
//! - [`AttributeValueId`]: Caller-chosen identifier of an attribute value
//! - [`EventId`]: Store-assigned, monotonically increasing event number
//! - [`EventTime`]: Normalized ISO-8601 instant used to order events
//! - [`EntityKind`]: Which table an identifier belongs to

pub mod error;
pub mod id;
pub mod time;

pub use error::TypeError;
pub use id::{AttributeValueId, EntityKind, EventId, ObjectId, ObjectRelationId};
pub use time::EventTime;
