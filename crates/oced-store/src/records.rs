//! Row types held by the entity tables and returned by the read accessors.

use std::collections::{BTreeMap, BTreeSet};

use oced_types::{AttributeValueId, EventId, EventTime, ObjectId, ObjectRelationId};
use serde::{Deserialize, Serialize};

/// An object together with its derived back-references.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub object_id: ObjectId,
    pub object_type: String,
    /// Attribute values owned by this object.
    pub attribute_value_ids: BTreeSet<AttributeValueId>,
    /// Relations where this object is the source.
    pub relation_ids_from: BTreeSet<ObjectRelationId>,
    /// Relations where this object is the target.
    pub relation_ids_to: BTreeSet<ObjectRelationId>,
    pub involved_in_event_ids: BTreeSet<EventId>,
}

impl ObjectRecord {
    pub fn new(object_id: ObjectId, object_type: impl Into<String>) -> Self {
        Self {
            object_id,
            object_type: object_type.into(),
            attribute_value_ids: BTreeSet::new(),
            relation_ids_from: BTreeSet::new(),
            relation_ids_to: BTreeSet::new(),
            involved_in_event_ids: BTreeSet::new(),
        }
    }

    /// Returns `true` if any relation or attribute value still refers to
    /// this object.
    pub fn has_dependents(&self) -> bool {
        !self.attribute_value_ids.is_empty()
            || !self.relation_ids_from.is_empty()
            || !self.relation_ids_to.is_empty()
    }

    /// Every relation touching this object, in either direction.
    pub fn relation_ids(&self) -> BTreeSet<ObjectRelationId> {
        self.relation_ids_from
            .union(&self.relation_ids_to)
            .cloned()
            .collect()
    }
}

/// A directed, typed edge between two objects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRelationRecord {
    pub object_relation_id: ObjectRelationId,
    pub from_object_id: ObjectId,
    pub to_object_id: ObjectId,
    pub relation_type: String,
    pub involved_in_event_ids: BTreeSet<EventId>,
}

impl ObjectRelationRecord {
    pub fn new(
        object_relation_id: ObjectRelationId,
        from_object_id: ObjectId,
        to_object_id: ObjectId,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            object_relation_id,
            from_object_id,
            to_object_id,
            relation_type: relation_type.into(),
            involved_in_event_ids: BTreeSet::new(),
        }
    }

    pub fn is_self_relation(&self) -> bool {
        self.from_object_id == self.to_object_id
    }
}

/// A named string value owned by one object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectAttributeValueRecord {
    pub object_attribute_value_id: AttributeValueId,
    pub object_id: ObjectId,
    pub name: String,
    pub value: String,
    pub involved_in_event_ids: BTreeSet<EventId>,
}

impl ObjectAttributeValueRecord {
    pub fn new(
        object_attribute_value_id: AttributeValueId,
        object_id: ObjectId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            object_attribute_value_id,
            object_id,
            name: name.into(),
            value: value.into(),
            involved_in_event_ids: BTreeSet::new(),
        }
    }
}

/// A committed event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: EventId,
    pub time: EventTime,
    pub event_type: String,
    pub events_attributes: BTreeMap<String, String>,
    pub object_ids_involved: BTreeSet<ObjectId>,
    pub object_relation_ids_involved: BTreeSet<ObjectRelationId>,
    pub object_attribute_value_ids_involved: BTreeSet<AttributeValueId>,
}

/// The three event cross-reference tables, as `(event, entity)` rows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRows {
    pub event_x_object: BTreeSet<(EventId, ObjectId)>,
    pub events_x_object_relation: BTreeSet<(EventId, ObjectRelationId)>,
    pub events_x_object_attribute_value: BTreeSet<(EventId, AttributeValueId)>,
}

impl JoinRows {
    pub fn is_empty(&self) -> bool {
        self.event_x_object.is_empty()
            && self.events_x_object_relation.is_empty()
            && self.events_x_object_attribute_value.is_empty()
    }
}

/// Open, append-only label sets. A label is registered the first time a
/// committed event uses it and is never removed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub object_types: BTreeSet<String>,
    pub relation_types: BTreeSet<String>,
    pub attribute_names: BTreeSet<String>,
    pub event_types: BTreeSet<String>,
    pub event_attribute_names: BTreeSet<String>,
}
