//! Transactional in-memory store for Object-Centric Event Data (OCED).
//!
//! This crate is the heart of OCED. It provides:
//! - Normalized entity tables with reverse indices
//! - Nine primitive sub-events and their exact inverses
//! - An event composer that applies events all-or-nothing
//! - An operation log and a stack-ordered revert engine
//! - `StoreReader` / `EventWriter` trait boundaries
//! - `OcedStore`, the lock-guarded implementation
//! - An integrity checker and verified JSON snapshots

pub mod config;
pub mod error;
pub mod event;
pub mod log;
pub mod memory;
pub mod ops;
pub mod records;
pub mod snapshot;
pub mod state;
pub mod sub_event;
pub mod tables;
pub mod traits;
pub mod validation;

pub use config::{DeletePolicy, StoreConfig};
pub use error::{OcedError, Result};
pub use event::{parse_events_json, NewEvent};
pub use log::{LogRecord, LogStatus, OperationLog};
pub use memory::OcedStore;
pub use ops::AppliedOp;
pub use records::{
    EventRecord, JoinRows, ObjectAttributeValueRecord, ObjectRecord, ObjectRelationRecord,
    Vocabulary,
};
pub use snapshot::{dump_json, dump_to_path, load_from_path, load_json, Snapshot, FORMAT_VERSION};
pub use state::StoreState;
pub use sub_event::{SubEvent, SubEventKind};
pub use tables::{EntityTables, RetiredIds};
pub use traits::{EventWriter, StoreReader};
pub use validation::{IntegrityChecker, IntegrityReport, Violation, ViolationKind};
