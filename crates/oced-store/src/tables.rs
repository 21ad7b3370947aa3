//! Normalized entity storage with reverse indices.
//!
//! [`EntityTables`] owns every row of the store. Each mutation updates the
//! primary table and all reverse indices before returning, and refuses any
//! change that would leave a relation endpoint or attribute owner dangling.
//! Id retirement and vocabulary registration are driven by the operation
//! layer; the tables only record them.

use std::collections::{BTreeMap, BTreeSet};

use oced_types::{AttributeValueId, EntityKind, EventId, ObjectId, ObjectRelationId};
use serde::{Deserialize, Serialize};

use crate::error::{OcedError, Result};
use crate::records::{
    EventRecord, JoinRows, ObjectAttributeValueRecord, ObjectRecord, ObjectRelationRecord,
    Vocabulary,
};

/// Ids of entities deleted by live events. They can never be created again.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetiredIds {
    pub objects: BTreeSet<ObjectId>,
    pub relations: BTreeSet<ObjectRelationId>,
    pub attribute_values: BTreeSet<AttributeValueId>,
}

/// Current state of all entities.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTables {
    pub(crate) objects: BTreeMap<ObjectId, ObjectRecord>,
    pub(crate) relations: BTreeMap<ObjectRelationId, ObjectRelationRecord>,
    pub(crate) attribute_values: BTreeMap<AttributeValueId, ObjectAttributeValueRecord>,
    pub(crate) events: BTreeMap<EventId, EventRecord>,
    pub(crate) joins: JoinRows,
    pub(crate) vocabulary: Vocabulary,
    pub(crate) retired: RetiredIds,
}

impl EntityTables {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- objects ----

    pub fn get_object(&self, id: &ObjectId) -> Result<&ObjectRecord> {
        self.objects
            .get(id)
            .ok_or_else(|| OcedError::unknown(EntityKind::Object, id))
    }

    pub fn contains_object(&self, id: &ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    /// Insert an object row. The row must not carry relation or attribute
    /// back-references; those are added when the dependents are inserted.
    pub fn insert_object(&mut self, record: ObjectRecord) -> Result<()> {
        if self.objects.contains_key(&record.object_id) {
            return Err(OcedError::duplicate(EntityKind::Object, &record.object_id));
        }
        if record.has_dependents() {
            return Err(OcedError::integrity(
                "object row carries back-references to rows that are not inserted",
                vec![record.object_id.to_string()],
            ));
        }
        self.objects.insert(record.object_id.clone(), record);
        Ok(())
    }

    /// Remove an object row. Fails if any relation or attribute value still
    /// refers to it.
    pub fn remove_object(&mut self, id: &ObjectId) -> Result<ObjectRecord> {
        let record = self.get_object(id)?;
        if record.has_dependents() {
            let mut ids: Vec<String> = record
                .relation_ids()
                .iter()
                .map(ToString::to_string)
                .collect();
            ids.extend(record.attribute_value_ids.iter().map(ToString::to_string));
            return Err(OcedError::integrity(
                format!("object {id} still has relations or attribute values"),
                ids,
            ));
        }
        self.objects
            .remove(id)
            .ok_or_else(|| OcedError::unknown(EntityKind::Object, id))
    }

    /// Replace an object's type, returning the previous one.
    pub fn set_object_type(&mut self, id: &ObjectId, object_type: &str) -> Result<String> {
        let record = self
            .objects
            .get_mut(id)
            .ok_or_else(|| OcedError::unknown(EntityKind::Object, id))?;
        Ok(std::mem::replace(&mut record.object_type, object_type.to_string()))
    }

    // ---- relations ----

    pub fn get_relation(&self, id: &ObjectRelationId) -> Result<&ObjectRelationRecord> {
        self.relations
            .get(id)
            .ok_or_else(|| OcedError::unknown(EntityKind::ObjectRelation, id))
    }

    pub fn contains_relation(&self, id: &ObjectRelationId) -> bool {
        self.relations.contains_key(id)
    }

    /// Insert a relation row and link it into both endpoints' indices.
    pub fn insert_relation(&mut self, record: ObjectRelationRecord) -> Result<()> {
        let id = record.object_relation_id.clone();
        if self.relations.contains_key(&id) {
            return Err(OcedError::duplicate(EntityKind::ObjectRelation, &id));
        }
        self.get_object(&record.from_object_id)?;
        self.get_object(&record.to_object_id)?;

        if let Some(from) = self.objects.get_mut(&record.from_object_id) {
            from.relation_ids_from.insert(id.clone());
        }
        if let Some(to) = self.objects.get_mut(&record.to_object_id) {
            to.relation_ids_to.insert(id.clone());
        }
        self.relations.insert(id, record);
        Ok(())
    }

    /// Remove a relation row and unlink it from both endpoints.
    pub fn remove_relation(&mut self, id: &ObjectRelationId) -> Result<ObjectRelationRecord> {
        let record = self
            .relations
            .remove(id)
            .ok_or_else(|| OcedError::unknown(EntityKind::ObjectRelation, id))?;
        if let Some(from) = self.objects.get_mut(&record.from_object_id) {
            from.relation_ids_from.remove(id);
        }
        if let Some(to) = self.objects.get_mut(&record.to_object_id) {
            to.relation_ids_to.remove(id);
        }
        Ok(record)
    }

    pub fn set_relation_type(&mut self, id: &ObjectRelationId, relation_type: &str) -> Result<String> {
        let record = self
            .relations
            .get_mut(id)
            .ok_or_else(|| OcedError::unknown(EntityKind::ObjectRelation, id))?;
        Ok(std::mem::replace(
            &mut record.relation_type,
            relation_type.to_string(),
        ))
    }

    // ---- attribute values ----

    pub fn get_attribute_value(&self, id: &AttributeValueId) -> Result<&ObjectAttributeValueRecord> {
        self.attribute_values
            .get(id)
            .ok_or_else(|| OcedError::unknown(EntityKind::ObjectAttributeValue, id))
    }

    pub fn contains_attribute_value(&self, id: &AttributeValueId) -> bool {
        self.attribute_values.contains_key(id)
    }

    /// Insert an attribute value and link it into its owner's index.
    pub fn insert_attribute_value(&mut self, record: ObjectAttributeValueRecord) -> Result<()> {
        let id = record.object_attribute_value_id.clone();
        if self.attribute_values.contains_key(&id) {
            return Err(OcedError::duplicate(EntityKind::ObjectAttributeValue, &id));
        }
        let owner = self
            .objects
            .get_mut(&record.object_id)
            .ok_or_else(|| OcedError::unknown(EntityKind::Object, &record.object_id))?;
        owner.attribute_value_ids.insert(id.clone());
        self.attribute_values.insert(id, record);
        Ok(())
    }

    pub fn remove_attribute_value(
        &mut self,
        id: &AttributeValueId,
    ) -> Result<ObjectAttributeValueRecord> {
        let record = self
            .attribute_values
            .remove(id)
            .ok_or_else(|| OcedError::unknown(EntityKind::ObjectAttributeValue, id))?;
        if let Some(owner) = self.objects.get_mut(&record.object_id) {
            owner.attribute_value_ids.remove(id);
        }
        Ok(record)
    }

    pub fn set_attribute_value(&mut self, id: &AttributeValueId, value: &str) -> Result<String> {
        let record = self
            .attribute_values
            .get_mut(id)
            .ok_or_else(|| OcedError::unknown(EntityKind::ObjectAttributeValue, id))?;
        Ok(std::mem::replace(&mut record.value, value.to_string()))
    }

    // ---- events ----

    pub fn get_event(&self, id: EventId) -> Result<&EventRecord> {
        self.events
            .get(&id)
            .ok_or_else(|| OcedError::unknown(EntityKind::Event, id))
    }

    /// Ids among the event's declared involvement sets that name no live
    /// entity.
    pub fn missing_involvement(
        &self,
        objects: &BTreeSet<ObjectId>,
        relations: &BTreeSet<ObjectRelationId>,
        attribute_values: &BTreeSet<AttributeValueId>,
    ) -> Vec<String> {
        let mut missing: Vec<String> = objects
            .iter()
            .filter(|id| !self.objects.contains_key(*id))
            .map(ToString::to_string)
            .collect();
        missing.extend(
            relations
                .iter()
                .filter(|id| !self.relations.contains_key(*id))
                .map(ToString::to_string),
        );
        missing.extend(
            attribute_values
                .iter()
                .filter(|id| !self.attribute_values.contains_key(*id))
                .map(ToString::to_string),
        );
        missing
    }

    /// Write an event row, its join rows, and the event id into every
    /// involved entity's history. All involved entities must exist.
    pub fn insert_event(&mut self, record: EventRecord) -> Result<()> {
        let event_id = record.event_id;
        if self.events.contains_key(&event_id) {
            return Err(OcedError::duplicate(EntityKind::Event, event_id));
        }
        let missing = self.missing_involvement(
            &record.object_ids_involved,
            &record.object_relation_ids_involved,
            &record.object_attribute_value_ids_involved,
        );
        if !missing.is_empty() {
            return Err(OcedError::integrity(
                format!("event {event_id} declares entities that do not exist"),
                missing,
            ));
        }

        for id in &record.object_ids_involved {
            if let Some(object) = self.objects.get_mut(id) {
                object.involved_in_event_ids.insert(event_id);
            }
            self.joins.event_x_object.insert((event_id, id.clone()));
        }
        for id in &record.object_relation_ids_involved {
            if let Some(relation) = self.relations.get_mut(id) {
                relation.involved_in_event_ids.insert(event_id);
            }
            self.joins
                .events_x_object_relation
                .insert((event_id, id.clone()));
        }
        for id in &record.object_attribute_value_ids_involved {
            if let Some(value) = self.attribute_values.get_mut(id) {
                value.involved_in_event_ids.insert(event_id);
            }
            self.joins
                .events_x_object_attribute_value
                .insert((event_id, id.clone()));
        }
        self.events.insert(event_id, record);
        Ok(())
    }

    /// Remove an event row, its join rows, and its entries in the histories
    /// of involved entities that still exist.
    pub fn remove_event(&mut self, event_id: EventId) -> Result<EventRecord> {
        let record = self
            .events
            .remove(&event_id)
            .ok_or_else(|| OcedError::unknown(EntityKind::Event, event_id))?;

        for id in &record.object_ids_involved {
            if let Some(object) = self.objects.get_mut(id) {
                object.involved_in_event_ids.remove(&event_id);
            }
            self.joins.event_x_object.remove(&(event_id, id.clone()));
        }
        for id in &record.object_relation_ids_involved {
            if let Some(relation) = self.relations.get_mut(id) {
                relation.involved_in_event_ids.remove(&event_id);
            }
            self.joins
                .events_x_object_relation
                .remove(&(event_id, id.clone()));
        }
        for id in &record.object_attribute_value_ids_involved {
            if let Some(value) = self.attribute_values.get_mut(id) {
                value.involved_in_event_ids.remove(&event_id);
            }
            self.joins
                .events_x_object_attribute_value
                .remove(&(event_id, id.clone()));
        }
        Ok(record)
    }

    // ---- retirement ----

    pub fn is_retired_object(&self, id: &ObjectId) -> bool {
        self.retired.objects.contains(id)
    }

    pub fn is_retired_relation(&self, id: &ObjectRelationId) -> bool {
        self.retired.relations.contains(id)
    }

    pub fn is_retired_attribute_value(&self, id: &AttributeValueId) -> bool {
        self.retired.attribute_values.contains(id)
    }

    pub(crate) fn retired_mut(&mut self) -> &mut RetiredIds {
        &mut self.retired
    }

    pub(crate) fn vocabulary_mut(&mut self) -> &mut Vocabulary {
        &mut self.vocabulary
    }

    // ---- read views ----

    pub fn objects(&self) -> impl Iterator<Item = &ObjectRecord> {
        self.objects.values()
    }

    pub fn relations(&self) -> impl Iterator<Item = &ObjectRelationRecord> {
        self.relations.values()
    }

    pub fn attribute_values(&self) -> impl Iterator<Item = &ObjectAttributeValueRecord> {
        self.attribute_values.values()
    }

    pub fn events(&self) -> impl Iterator<Item = &EventRecord> {
        self.events.values()
    }

    pub fn joins(&self) -> &JoinRows {
        &self.joins
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn retired(&self) -> &RetiredIds {
        &self.retired
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use oced_types::EventTime;

    use super::*;

    fn oid(id: &str) -> ObjectId {
        ObjectId::from(id)
    }

    fn rid(id: &str) -> ObjectRelationId {
        ObjectRelationId::from(id)
    }

    fn two_objects() -> EntityTables {
        let mut tables = EntityTables::new();
        tables.insert_object(ObjectRecord::new(oid("O1"), "machine")).unwrap();
        tables.insert_object(ObjectRecord::new(oid("O2"), "order")).unwrap();
        tables
    }

    #[test]
    fn lookups_that_miss_are_unknown_id() {
        let tables = EntityTables::new();
        assert!(matches!(
            tables.get_object(&oid("nope")),
            Err(OcedError::UnknownId { kind: EntityKind::Object, .. })
        ));
        assert!(matches!(
            tables.get_relation(&rid("nope")),
            Err(OcedError::UnknownId { kind: EntityKind::ObjectRelation, .. })
        ));
        assert!(matches!(
            tables.get_event(EventId::FIRST),
            Err(OcedError::UnknownId { kind: EntityKind::Event, .. })
        ));
    }

    #[test]
    fn relation_insert_updates_both_endpoints() {
        let mut tables = two_objects();
        tables
            .insert_relation(ObjectRelationRecord::new(rid("R1"), oid("O1"), oid("O2"), "processes"))
            .unwrap();

        assert!(tables.get_object(&oid("O1")).unwrap().relation_ids_from.contains(&rid("R1")));
        assert!(tables.get_object(&oid("O2")).unwrap().relation_ids_to.contains(&rid("R1")));

        let removed = tables.remove_relation(&rid("R1")).unwrap();
        assert_eq!(removed.relation_type, "processes");
        assert!(!tables.get_object(&oid("O1")).unwrap().has_dependents());
        assert!(!tables.get_object(&oid("O2")).unwrap().has_dependents());
    }

    #[test]
    fn relation_to_missing_endpoint_changes_nothing() {
        let mut tables = two_objects();
        let before = tables.clone();
        let error = tables
            .insert_relation(ObjectRelationRecord::new(rid("R1"), oid("O1"), oid("O9"), "x"))
            .unwrap_err();
        assert!(matches!(error, OcedError::UnknownId { ref id, .. } if id == "O9"));
        assert_eq!(tables, before);
    }

    #[test]
    fn object_with_dependents_cannot_be_removed() {
        let mut tables = two_objects();
        tables
            .insert_attribute_value(ObjectAttributeValueRecord::new(
                AttributeValueId::from("A1"),
                oid("O1"),
                "colour",
                "red",
            ))
            .unwrap();

        let error = tables.remove_object(&oid("O1")).unwrap_err();
        assert!(matches!(error, OcedError::IntegrityViolation { ref ids, .. } if ids == &["A1"]));

        tables.remove_attribute_value(&AttributeValueId::from("A1")).unwrap();
        assert_eq!(tables.remove_object(&oid("O1")).unwrap().object_type, "machine");
    }

    #[test]
    fn setters_return_previous_value() {
        let mut tables = two_objects();
        assert_eq!(tables.set_object_type(&oid("O1"), "robot").unwrap(), "machine");
        assert_eq!(tables.get_object(&oid("O1")).unwrap().object_type, "robot");
    }

    #[test]
    fn event_rows_link_and_unlink_involvement() {
        let mut tables = two_objects();
        let event = EventRecord {
            event_id: EventId::FIRST,
            time: EventTime::parse("2024-01-01T00:00:00Z").unwrap(),
            event_type: "setup".into(),
            events_attributes: BTreeMap::new(),
            object_ids_involved: [oid("O1"), oid("O2")].into_iter().collect(),
            object_relation_ids_involved: BTreeSet::new(),
            object_attribute_value_ids_involved: BTreeSet::new(),
        };
        tables.insert_event(event.clone()).unwrap();

        assert!(tables
            .get_object(&oid("O2"))
            .unwrap()
            .involved_in_event_ids
            .contains(&EventId::FIRST));
        assert_eq!(tables.joins().event_x_object.len(), 2);

        assert_eq!(tables.remove_event(EventId::FIRST).unwrap(), event);
        assert!(tables.joins().is_empty());
        assert!(tables.get_object(&oid("O1")).unwrap().involved_in_event_ids.is_empty());
    }
}
