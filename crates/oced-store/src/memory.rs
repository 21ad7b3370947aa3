//! The in-memory OCED store.
//!
//! [`OcedStore`] keeps its whole [`StoreState`] behind one `RwLock`. Writers
//! hold the write lock for the entire event or revert, so readers only ever
//! see committed state.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use oced_types::{AttributeValueId, EventId, EventTime, ObjectId, ObjectRelationId};

use crate::config::StoreConfig;
use crate::error::{OcedError, Result};
use crate::event::NewEvent;
use crate::log::LogRecord;
use crate::records::{
    EventRecord, JoinRows, ObjectAttributeValueRecord, ObjectRecord, ObjectRelationRecord,
    Vocabulary,
};
use crate::state::StoreState;
use crate::traits::{EventWriter, StoreReader};
use crate::validation::{IntegrityChecker, IntegrityReport};

/// Transactional store of objects, relations, attribute values and events.
#[derive(Debug)]
pub struct OcedStore {
    config: StoreConfig,
    inner: RwLock<StoreState>,
}

impl OcedStore {
    /// Create an empty store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self::from_state(config, StoreState::new())
    }

    /// Wrap an existing state, e.g. one loaded from a snapshot.
    pub fn from_state(config: StoreConfig, state: StoreState) -> Self {
        Self {
            config,
            inner: RwLock::new(state),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// A copy of the full committed state.
    pub fn state(&self) -> Result<StoreState> {
        Ok(self.read()?.clone())
    }

    /// Content digest of the committed state.
    pub fn digest(&self) -> Result<String> {
        self.read()?.digest()
    }

    /// Run the integrity checker over the committed state.
    pub fn verify(&self) -> Result<IntegrityReport> {
        let state = self.read()?;
        Ok(IntegrityChecker::check(&state))
    }

    /// Id the next committed event will receive.
    pub fn next_event_id(&self) -> Result<EventId> {
        Ok(self.read()?.next_event_id())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.inner.read().map_err(|_| OcedError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.inner.write().map_err(|_| OcedError::LockPoisoned)
    }
}

impl Default for OcedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventWriter for OcedStore {
    fn insert_event(&self, event: NewEvent) -> Result<EventId> {
        let mut state = self.write()?;
        state.insert_event(&self.config, event)
    }

    fn revert_event(&self, event_id: EventId) -> Result<()> {
        let mut state = self.write()?;
        state.revert_event(event_id)
    }

    fn revert_latest(&self) -> Result<EventId> {
        let mut state = self.write()?;
        state.revert_latest()
    }
}

impl StoreReader for OcedStore {
    fn object(&self, id: &ObjectId) -> Result<ObjectRecord> {
        Ok(self.read()?.tables.get_object(id)?.clone())
    }

    fn objects(&self) -> Result<Vec<ObjectRecord>> {
        Ok(self.read()?.tables.objects().cloned().collect())
    }

    fn relation(&self, id: &ObjectRelationId) -> Result<ObjectRelationRecord> {
        Ok(self.read()?.tables.get_relation(id)?.clone())
    }

    fn relations(&self) -> Result<Vec<ObjectRelationRecord>> {
        Ok(self.read()?.tables.relations().cloned().collect())
    }

    fn relations_from(&self, id: &ObjectId) -> Result<Vec<ObjectRelationRecord>> {
        let state = self.read()?;
        let object = state.tables.get_object(id)?;
        object
            .relation_ids_from
            .iter()
            .map(|relation_id| state.tables.get_relation(relation_id).cloned())
            .collect()
    }

    fn relations_to(&self, id: &ObjectId) -> Result<Vec<ObjectRelationRecord>> {
        let state = self.read()?;
        let object = state.tables.get_object(id)?;
        object
            .relation_ids_to
            .iter()
            .map(|relation_id| state.tables.get_relation(relation_id).cloned())
            .collect()
    }

    fn attribute_value(&self, id: &AttributeValueId) -> Result<ObjectAttributeValueRecord> {
        Ok(self.read()?.tables.get_attribute_value(id)?.clone())
    }

    fn attribute_values(&self) -> Result<Vec<ObjectAttributeValueRecord>> {
        Ok(self.read()?.tables.attribute_values().cloned().collect())
    }

    fn attribute_values_of(&self, id: &ObjectId) -> Result<Vec<ObjectAttributeValueRecord>> {
        let state = self.read()?;
        let object = state.tables.get_object(id)?;
        object
            .attribute_value_ids
            .iter()
            .map(|value_id| state.tables.get_attribute_value(value_id).cloned())
            .collect()
    }

    fn event(&self, id: EventId) -> Result<EventRecord> {
        Ok(self.read()?.tables.get_event(id)?.clone())
    }

    fn events(&self) -> Result<Vec<EventRecord>> {
        Ok(self.read()?.tables.events().cloned().collect())
    }

    fn vocabulary(&self) -> Result<Vocabulary> {
        Ok(self.read()?.tables.vocabulary().clone())
    }

    fn log(&self) -> Result<Vec<LogRecord>> {
        Ok(self.read()?.log.records().to_vec())
    }

    fn max_time(&self) -> Result<Option<EventTime>> {
        Ok(self.read()?.log.max_time())
    }

    fn join_rows(&self) -> Result<JoinRows> {
        Ok(self.read()?.tables.joins().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sub_event::SubEvent;

    fn store_with_relation() -> OcedStore {
        let store = OcedStore::new();
        store
            .insert_event(
                NewEvent::at("2024-01-01T10:00:00Z", "setup")
                    .unwrap()
                    .with_sub_event(SubEvent::create_object("O1", "machine"))
                    .with_sub_event(SubEvent::create_object("O2", "order"))
                    .with_sub_event(SubEvent::create_object_relation("R1", "O1", "O2", "processes"))
                    .with_sub_event(SubEvent::create_object_attribute_value(
                        "A1", "O2", "priority", "high",
                    ))
                    .involving_object("O1")
                    .involving_relation("R1"),
            )
            .unwrap();
        store
    }

    #[test]
    fn reader_navigates_indices() {
        let store = store_with_relation();
        let o1 = ObjectId::from("O1");
        let o2 = ObjectId::from("O2");

        let from = store.relations_from(&o1).unwrap();
        assert_eq!(from.len(), 1);
        assert_eq!(from[0].to_object_id, o2);
        assert!(store.relations_to(&o1).unwrap().is_empty());
        assert_eq!(store.relations_to(&o2).unwrap()[0].relation_type, "processes");

        let values = store.attribute_values_of(&o2).unwrap();
        assert_eq!(values[0].value, "high");
        assert!(store.attribute_values_of(&o1).unwrap().is_empty());

        assert!(matches!(
            store.relations_from(&ObjectId::from("O9")),
            Err(OcedError::UnknownId { .. })
        ));
    }

    #[test]
    fn reader_exposes_events_and_log() {
        let store = store_with_relation();
        let event = store.event(EventId::FIRST).unwrap();
        assert_eq!(event.event_type, "setup");
        assert_eq!(store.events().unwrap().len(), 1);
        assert_eq!(store.log().unwrap().len(), 1);
        assert_eq!(store.join_rows().unwrap().event_x_object.len(), 1);
        assert_eq!(store.max_time().unwrap(), Some(event.time));
        assert!(store.vocabulary().unwrap().attribute_names.contains("priority"));
        assert!(store.verify().unwrap().is_valid());
    }

    #[test]
    fn store_is_shareable_across_threads() {
        let store = std::sync::Arc::new(store_with_relation());
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || store.objects().unwrap().len())
            })
            .collect();
        for reader in readers {
            assert_eq!(reader.join().unwrap(), 2);
        }
    }
}
