use oced_types::{AttributeValueId, EventId, EventTime, ObjectId, ObjectRelationId};

use crate::error::Result;
use crate::event::NewEvent;
use crate::log::LogRecord;
use crate::records::{
    EventRecord, JoinRows, ObjectAttributeValueRecord, ObjectRecord, ObjectRelationRecord,
    Vocabulary,
};

/// Write boundary: the only way to change a store.
pub trait EventWriter: Send + Sync {
    /// Apply an event atomically and return the id it was assigned.
    fn insert_event(&self, event: NewEvent) -> Result<EventId>;

    /// Undo a committed event. Only the latest live event can be reverted.
    fn revert_event(&self, event_id: EventId) -> Result<()>;

    /// Undo the latest live event and return its id.
    fn revert_latest(&self) -> Result<EventId>;
}

/// Read boundary over committed state.
pub trait StoreReader: Send + Sync {
    fn object(&self, id: &ObjectId) -> Result<ObjectRecord>;

    fn objects(&self) -> Result<Vec<ObjectRecord>>;

    fn relation(&self, id: &ObjectRelationId) -> Result<ObjectRelationRecord>;

    fn relations(&self) -> Result<Vec<ObjectRelationRecord>>;

    /// Relations whose source is `id`.
    fn relations_from(&self, id: &ObjectId) -> Result<Vec<ObjectRelationRecord>>;

    /// Relations whose target is `id`.
    fn relations_to(&self, id: &ObjectId) -> Result<Vec<ObjectRelationRecord>>;

    fn attribute_value(&self, id: &AttributeValueId) -> Result<ObjectAttributeValueRecord>;

    fn attribute_values(&self) -> Result<Vec<ObjectAttributeValueRecord>>;

    /// Attribute values owned by object `id`.
    fn attribute_values_of(&self, id: &ObjectId) -> Result<Vec<ObjectAttributeValueRecord>>;

    fn event(&self, id: EventId) -> Result<EventRecord>;

    fn events(&self) -> Result<Vec<EventRecord>>;

    fn vocabulary(&self) -> Result<Vocabulary>;

    /// Every log record, reverted ones included, in event-id order.
    fn log(&self) -> Result<Vec<LogRecord>>;

    /// Time of the latest live event.
    fn max_time(&self) -> Result<Option<EventTime>>;

    fn join_rows(&self) -> Result<JoinRows>;
}
