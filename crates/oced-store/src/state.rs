//! Complete store state and the event composer / revert engine over it.
//!
//! [`StoreState`] is what the store lock guards and what snapshots persist.
//! Its two mutating entry points are all-or-nothing: on any error the state
//! is unwound to exactly what it was before the call.

use oced_types::{EntityKind, EventId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::{OcedError, Result};
use crate::event::NewEvent;
use crate::log::OperationLog;
use crate::ops::{self, AppliedOp};
use crate::records::EventRecord;
use crate::tables::EntityTables;

const DIGEST_DOMAIN: &[u8] = b"oced-state-v1:";

/// Hex blake3 digest of `value`'s JSON encoding under a domain prefix.
pub(crate) fn hash_json<T: Serialize + ?Sized>(domain: &[u8], value: &T) -> Result<String> {
    let encoded = serde_json::to_vec(value)?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain);
    hasher.update(&encoded);
    Ok(hex::encode(hasher.finalize().as_bytes()))
}

/// Entity tables, operation log and event-id counter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreState {
    pub(crate) tables: EntityTables,
    pub(crate) log: OperationLog,
    pub(crate) next_event_id: EventId,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            tables: EntityTables::new(),
            log: OperationLog::new(),
            next_event_id: EventId::FIRST,
        }
    }
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tables(&self) -> &EntityTables {
        &self.tables
    }

    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    /// Id the next committed event will receive.
    pub fn next_event_id(&self) -> EventId {
        self.next_event_id
    }

    /// Hex blake3 digest of the canonical JSON encoding.
    pub fn digest(&self) -> Result<String> {
        hash_json(DIGEST_DOMAIN, self)
    }

    /// Validate and apply one event, returning its assigned id.
    pub fn insert_event(&mut self, config: &StoreConfig, event: NewEvent) -> Result<EventId> {
        if let Some(current_max) = self.log.max_time() {
            if !event.time.is_after(&current_max) {
                return Err(OcedError::OrderingViolation {
                    proposed: event.time,
                    current_max,
                });
            }
        }

        let event_id = self.next_event_id;
        let following = event_id
            .next()
            .ok_or(OcedError::EventIdsExhausted(event_id))?;
        let mut applied = Vec::with_capacity(event.sub_events.len());
        for (index, sub_event) in event.sub_events.iter().enumerate() {
            if let Err(error) = ops::apply(&mut self.tables, sub_event, config, &mut applied) {
                warn!(
                    %event_id,
                    index,
                    function = %sub_event.kind(),
                    %error,
                    "sub-event failed, rolling back event"
                );
                ops::rollback(&mut self.tables, &applied)?;
                return Err(error);
            }
        }

        let missing = self.tables.missing_involvement(
            &event.object_ids_involved,
            &event.object_relation_ids_involved,
            &event.object_attribute_value_ids_involved,
        );
        if !missing.is_empty() {
            warn!(%event_id, missing = ?missing, "declared involvement missing, rolling back event");
            ops::rollback(&mut self.tables, &applied)?;
            return Err(OcedError::integrity(
                "event declares entities that do not exist after its sub-events",
                missing,
            ));
        }

        let record = EventRecord {
            event_id,
            time: event.time,
            event_type: event.event_type,
            events_attributes: event.events_attributes,
            object_ids_involved: event.object_ids_involved,
            object_relation_ids_involved: event.object_relation_ids_involved,
            object_attribute_value_ids_involved: event.object_attribute_value_ids_involved,
        };
        if let Err(error) = self.tables.insert_event(record.clone()) {
            ops::rollback(&mut self.tables, &applied)?;
            return Err(error);
        }
        self.register_vocabulary(&record, &applied);

        debug!(
            %event_id,
            time = %record.time,
            event_type = %record.event_type,
            sub_events = applied.len(),
            "event committed"
        );
        self.log.append(record, applied);
        self.next_event_id = following;
        Ok(event_id)
    }

    /// Undo the latest live event. Any other id is a conflict.
    pub fn revert_event(&mut self, event_id: EventId) -> Result<()> {
        let record = self
            .log
            .get(event_id)
            .ok_or_else(|| OcedError::unknown(EntityKind::Event, event_id))?;
        if !record.is_live() {
            return Err(OcedError::Conflict {
                event_id,
                reason: "event was already reverted".into(),
            });
        }
        if let Some(latest) = self.log.latest_live() {
            if latest.event_id() != event_id {
                return Err(OcedError::Conflict {
                    event_id,
                    reason: format!("later event {} is still live", latest.event_id()),
                });
            }
        }
        let applied = record.applied.clone();

        let mut compensations: Vec<AppliedOp> = Vec::with_capacity(applied.len());
        for op in applied.iter().rev() {
            match ops::invert(&mut self.tables, op) {
                Ok(compensation) => compensations.push(compensation),
                Err(error) => {
                    warn!(
                        %event_id,
                        function = %op.kind(),
                        subject = %op.subject(),
                        %error,
                        "inverse operation failed, restoring event"
                    );
                    ops::rollback(&mut self.tables, &compensations)?;
                    return Err(error);
                }
            }
        }

        if let Err(error) = self.tables.remove_event(event_id) {
            ops::rollback(&mut self.tables, &compensations)?;
            return Err(error);
        }
        self.log.mark_reverted(event_id);

        debug!(%event_id, inverted = compensations.len(), "event reverted");
        Ok(())
    }

    /// Revert the most recent live event and return its id.
    pub fn revert_latest(&mut self) -> Result<EventId> {
        let event_id = self
            .log
            .latest_live()
            .map(|record| record.event_id())
            .ok_or_else(|| OcedError::Conflict {
                event_id: self.next_event_id,
                reason: "no live event to revert".into(),
            })?;
        self.revert_event(event_id)?;
        Ok(event_id)
    }

    fn register_vocabulary(&mut self, record: &EventRecord, applied: &[AppliedOp]) {
        let vocabulary = self.tables.vocabulary_mut();
        vocabulary.event_types.insert(record.event_type.clone());
        vocabulary
            .event_attribute_names
            .extend(record.events_attributes.keys().cloned());

        for op in applied {
            match op {
                AppliedOp::ObjectCreated { object_type, .. }
                | AppliedOp::ObjectModified {
                    new_object_type: object_type,
                    ..
                } => {
                    vocabulary.object_types.insert(object_type.clone());
                }
                AppliedOp::ObjectRelationCreated { relation_type, .. }
                | AppliedOp::ObjectRelationModified {
                    new_relation_type: relation_type,
                    ..
                } => {
                    vocabulary.relation_types.insert(relation_type.clone());
                }
                AppliedOp::ObjectAttributeValueCreated { name, .. } => {
                    vocabulary.attribute_names.insert(name.clone());
                }
                AppliedOp::ObjectDeleted { .. }
                | AppliedOp::ObjectRelationDeleted { .. }
                | AppliedOp::ObjectAttributeValueDeleted { .. }
                | AppliedOp::ObjectAttributeValueModified { .. } => {}
            }
        }
    }
}
