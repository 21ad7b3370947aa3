//! Caller-side description of an event before the store assigns its id.

use std::collections::{BTreeMap, BTreeSet};

use oced_types::{AttributeValueId, EventTime, ObjectId, ObjectRelationId};
use serde::{Deserialize, Serialize};

use crate::error::{OcedError, Result};
use crate::sub_event::SubEvent;

/// An event to be inserted: when it happened, what kind it is, the ordered
/// sub-events it performs and the entities it declares as involved.
///
/// Involved ids are checked after the sub-events run, so an event may
/// declare an entity it creates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub time: EventTime,
    pub event_type: String,
    #[serde(default)]
    pub events_attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub sub_events: Vec<SubEvent>,
    #[serde(default)]
    pub object_ids_involved: BTreeSet<ObjectId>,
    #[serde(default)]
    pub object_relation_ids_involved: BTreeSet<ObjectRelationId>,
    #[serde(default)]
    pub object_attribute_value_ids_involved: BTreeSet<AttributeValueId>,
}

impl NewEvent {
    pub fn new(time: EventTime, event_type: impl Into<String>) -> Self {
        Self {
            time,
            event_type: event_type.into(),
            events_attributes: BTreeMap::new(),
            sub_events: Vec::new(),
            object_ids_involved: BTreeSet::new(),
            object_relation_ids_involved: BTreeSet::new(),
            object_attribute_value_ids_involved: BTreeSet::new(),
        }
    }

    /// Build an event from an ISO-8601 time string.
    pub fn at(time: &str, event_type: impl Into<String>) -> Result<Self> {
        Ok(Self::new(EventTime::parse(time)?, event_type))
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.events_attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_sub_event(mut self, sub_event: SubEvent) -> Self {
        self.sub_events.push(sub_event);
        self
    }

    pub fn involving_object(mut self, id: &str) -> Self {
        self.object_ids_involved.insert(ObjectId::from(id));
        self
    }

    pub fn involving_relation(mut self, id: &str) -> Self {
        self.object_relation_ids_involved
            .insert(ObjectRelationId::from(id));
        self
    }

    pub fn involving_attribute_value(mut self, id: &str) -> Self {
        self.object_attribute_value_ids_involved
            .insert(AttributeValueId::from(id));
        self
    }
}

/// Parse a JSON event batch: either a single event object or an array of
/// them. Malformed input surfaces as `TypeMismatch` on field `events`.
pub fn parse_events_json(input: &str) -> Result<Vec<NewEvent>> {
    let invalid = |e: serde_json::Error| OcedError::type_mismatch("events", e.to_string());
    let value: serde_json::Value = serde_json::from_str(input).map_err(invalid)?;
    // An untagged enum would swallow the field-level error message.
    if value.is_array() {
        serde_json::from_value(value).map_err(invalid)
    } else {
        serde_json::from_value::<NewEvent>(value)
            .map(|event| vec![event])
            .map_err(invalid)
    }
}
