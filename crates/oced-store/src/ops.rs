//! Execution and inversion of sub-events against the entity tables.
//!
//! Executing a [`SubEvent`] yields one or more [`AppliedOp`]s: resolved
//! records that carry everything needed to undo them (the removed row for a
//! deletion, old and new values for a modification). Inverting an applied
//! operation runs the compensating table mutation, re-checking its
//! preconditions, and yields the applied operation of the compensation so
//! that a partially completed undo can itself be undone.

use oced_types::{AttributeValueId, EntityKind, ObjectId, ObjectRelationId};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::{DeletePolicy, StoreConfig};
use crate::error::{OcedError, Result};
use crate::records::{ObjectAttributeValueRecord, ObjectRecord, ObjectRelationRecord};
use crate::sub_event::{SubEvent, SubEventKind};
use crate::tables::EntityTables;

/// A sub-event as it was actually applied.
///
/// `restores_id` on a creation and `retires_id` on a deletion record whether
/// the id moved out of or into the retired set, so inversion is exact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "function", content = "parameters", rename_all = "snake_case")]
pub enum AppliedOp {
    ObjectCreated {
        object_id: ObjectId,
        object_type: String,
        restores_id: bool,
    },
    ObjectRelationCreated {
        object_relation_id: ObjectRelationId,
        from_object_id: ObjectId,
        to_object_id: ObjectId,
        relation_type: String,
        restores_id: bool,
    },
    ObjectAttributeValueCreated {
        object_attribute_value_id: AttributeValueId,
        object_id: ObjectId,
        name: String,
        value: String,
        restores_id: bool,
    },
    ObjectDeleted {
        record: ObjectRecord,
        retires_id: bool,
    },
    ObjectRelationDeleted {
        record: ObjectRelationRecord,
        retires_id: bool,
    },
    ObjectAttributeValueDeleted {
        record: ObjectAttributeValueRecord,
        retires_id: bool,
    },
    ObjectModified {
        object_id: ObjectId,
        old_object_type: String,
        new_object_type: String,
    },
    ObjectRelationModified {
        object_relation_id: ObjectRelationId,
        old_relation_type: String,
        new_relation_type: String,
    },
    ObjectAttributeValueModified {
        object_attribute_value_id: AttributeValueId,
        old_value: String,
        new_value: String,
    },
}

impl AppliedOp {
    /// The primitive operation this record describes.
    pub fn kind(&self) -> SubEventKind {
        match self {
            AppliedOp::ObjectCreated { .. } => SubEventKind::CreateObject,
            AppliedOp::ObjectRelationCreated { .. } => SubEventKind::CreateObjectRelation,
            AppliedOp::ObjectAttributeValueCreated { .. } => {
                SubEventKind::CreateObjectAttributeValue
            }
            AppliedOp::ObjectDeleted { .. } => SubEventKind::DeleteObject,
            AppliedOp::ObjectRelationDeleted { .. } => SubEventKind::DeleteObjectRelation,
            AppliedOp::ObjectAttributeValueDeleted { .. } => {
                SubEventKind::DeleteObjectAttributeValue
            }
            AppliedOp::ObjectModified { .. } => SubEventKind::ModifyObject,
            AppliedOp::ObjectRelationModified { .. } => SubEventKind::ModifyObjectRelation,
            AppliedOp::ObjectAttributeValueModified { .. } => {
                SubEventKind::ModifyObjectAttributeValue
            }
        }
    }

    /// Id of the entity this operation touched.
    pub fn subject(&self) -> String {
        match self {
            AppliedOp::ObjectCreated { object_id, .. }
            | AppliedOp::ObjectModified { object_id, .. } => object_id.to_string(),
            AppliedOp::ObjectDeleted { record, .. } => record.object_id.to_string(),
            AppliedOp::ObjectRelationCreated {
                object_relation_id, ..
            }
            | AppliedOp::ObjectRelationModified {
                object_relation_id, ..
            } => object_relation_id.to_string(),
            AppliedOp::ObjectRelationDeleted { record, .. } => {
                record.object_relation_id.to_string()
            }
            AppliedOp::ObjectAttributeValueCreated {
                object_attribute_value_id,
                ..
            }
            | AppliedOp::ObjectAttributeValueModified {
                object_attribute_value_id,
                ..
            } => object_attribute_value_id.to_string(),
            AppliedOp::ObjectAttributeValueDeleted { record, .. } => {
                record.object_attribute_value_id.to_string()
            }
        }
    }
}

/// Execute one sub-event, appending what was applied to `applied`.
///
/// A cascading object deletion appends one record per removed dependent
/// before the object itself. On error, records already appended by this call
/// stay in `applied` so the caller's rollback covers them.
pub(crate) fn apply(
    tables: &mut EntityTables,
    sub_event: &SubEvent,
    config: &StoreConfig,
    applied: &mut Vec<AppliedOp>,
) -> Result<()> {
    trace!(function = %sub_event.kind(), "applying sub-event");
    match sub_event {
        SubEvent::CreateObject {
            object_id,
            object_type,
        } => {
            ensure_object_id_unused(tables, object_id)?;
            tables.insert_object(ObjectRecord::new(object_id.clone(), object_type.clone()))?;
            applied.push(AppliedOp::ObjectCreated {
                object_id: object_id.clone(),
                object_type: object_type.clone(),
                restores_id: false,
            });
        }

        SubEvent::CreateObjectRelation {
            object_relation_id,
            from_object_id,
            to_object_id,
            relation_type,
        } => {
            ensure_relation_id_unused(tables, object_relation_id)?;
            tables.get_object(from_object_id)?;
            tables.get_object(to_object_id)?;
            let record = ObjectRelationRecord::new(
                object_relation_id.clone(),
                from_object_id.clone(),
                to_object_id.clone(),
                relation_type.clone(),
            );
            if record.is_self_relation() && !config.allow_self_relations {
                return Err(OcedError::integrity(
                    "self-relations are not allowed",
                    vec![object_relation_id.to_string(), from_object_id.to_string()],
                ));
            }
            tables.insert_relation(record)?;
            applied.push(AppliedOp::ObjectRelationCreated {
                object_relation_id: object_relation_id.clone(),
                from_object_id: from_object_id.clone(),
                to_object_id: to_object_id.clone(),
                relation_type: relation_type.clone(),
                restores_id: false,
            });
        }

        SubEvent::CreateObjectAttributeValue {
            object_attribute_value_id,
            object_id,
            name,
            value,
        } => {
            ensure_attribute_value_id_unused(tables, object_attribute_value_id)?;
            tables.insert_attribute_value(ObjectAttributeValueRecord::new(
                object_attribute_value_id.clone(),
                object_id.clone(),
                name.clone(),
                value.clone(),
            ))?;
            applied.push(AppliedOp::ObjectAttributeValueCreated {
                object_attribute_value_id: object_attribute_value_id.clone(),
                object_id: object_id.clone(),
                name: name.clone(),
                value: value.clone(),
                restores_id: false,
            });
        }

        SubEvent::DeleteObject { object_id } => {
            let object = tables.get_object(object_id)?;
            if config.delete_policy == DeletePolicy::Cascade {
                let relation_ids = object.relation_ids();
                let value_ids = object.attribute_value_ids.clone();
                for relation_id in &relation_ids {
                    delete_relation(tables, relation_id, applied)?;
                }
                for value_id in &value_ids {
                    delete_attribute_value(tables, value_id, applied)?;
                }
            }
            let record = tables.remove_object(object_id)?;
            tables.retired_mut().objects.insert(object_id.clone());
            applied.push(AppliedOp::ObjectDeleted {
                record,
                retires_id: true,
            });
        }

        SubEvent::DeleteObjectRelation { object_relation_id } => {
            delete_relation(tables, object_relation_id, applied)?;
        }

        SubEvent::DeleteObjectAttributeValue {
            object_attribute_value_id,
        } => {
            delete_attribute_value(tables, object_attribute_value_id, applied)?;
        }

        SubEvent::ModifyObject {
            object_id,
            new_object_type,
        } => {
            let old_object_type = tables.set_object_type(object_id, new_object_type)?;
            applied.push(AppliedOp::ObjectModified {
                object_id: object_id.clone(),
                old_object_type,
                new_object_type: new_object_type.clone(),
            });
        }

        SubEvent::ModifyObjectRelation {
            object_relation_id,
            new_relation_type,
        } => {
            let old_relation_type = tables.set_relation_type(object_relation_id, new_relation_type)?;
            applied.push(AppliedOp::ObjectRelationModified {
                object_relation_id: object_relation_id.clone(),
                old_relation_type,
                new_relation_type: new_relation_type.clone(),
            });
        }

        SubEvent::ModifyObjectAttributeValue {
            object_attribute_value_id,
            new_value,
        } => {
            let old_value = tables.set_attribute_value(object_attribute_value_id, new_value)?;
            applied.push(AppliedOp::ObjectAttributeValueModified {
                object_attribute_value_id: object_attribute_value_id.clone(),
                old_value,
                new_value: new_value.clone(),
            });
        }
    }
    Ok(())
}

/// Run the compensating mutation for `op` and return its applied record.
pub(crate) fn invert(tables: &mut EntityTables, op: &AppliedOp) -> Result<AppliedOp> {
    trace!(function = %op.kind(), subject = %op.subject(), "inverting applied operation");
    let compensation = match op {
        AppliedOp::ObjectCreated {
            object_id,
            restores_id,
            ..
        } => {
            let record = tables.remove_object(object_id)?;
            if *restores_id {
                tables.retired_mut().objects.insert(object_id.clone());
            }
            AppliedOp::ObjectDeleted {
                record,
                retires_id: *restores_id,
            }
        }

        AppliedOp::ObjectRelationCreated {
            object_relation_id,
            restores_id,
            ..
        } => {
            let record = tables.remove_relation(object_relation_id)?;
            if *restores_id {
                tables
                    .retired_mut()
                    .relations
                    .insert(object_relation_id.clone());
            }
            AppliedOp::ObjectRelationDeleted {
                record,
                retires_id: *restores_id,
            }
        }

        AppliedOp::ObjectAttributeValueCreated {
            object_attribute_value_id,
            restores_id,
            ..
        } => {
            let record = tables.remove_attribute_value(object_attribute_value_id)?;
            if *restores_id {
                tables
                    .retired_mut()
                    .attribute_values
                    .insert(object_attribute_value_id.clone());
            }
            AppliedOp::ObjectAttributeValueDeleted {
                record,
                retires_id: *restores_id,
            }
        }

        AppliedOp::ObjectDeleted { record, retires_id } => {
            tables.insert_object(record.clone())?;
            if *retires_id {
                tables.retired_mut().objects.remove(&record.object_id);
            }
            AppliedOp::ObjectCreated {
                object_id: record.object_id.clone(),
                object_type: record.object_type.clone(),
                restores_id: *retires_id,
            }
        }

        AppliedOp::ObjectRelationDeleted { record, retires_id } => {
            tables.insert_relation(record.clone())?;
            if *retires_id {
                tables
                    .retired_mut()
                    .relations
                    .remove(&record.object_relation_id);
            }
            AppliedOp::ObjectRelationCreated {
                object_relation_id: record.object_relation_id.clone(),
                from_object_id: record.from_object_id.clone(),
                to_object_id: record.to_object_id.clone(),
                relation_type: record.relation_type.clone(),
                restores_id: *retires_id,
            }
        }

        AppliedOp::ObjectAttributeValueDeleted { record, retires_id } => {
            tables.insert_attribute_value(record.clone())?;
            if *retires_id {
                tables
                    .retired_mut()
                    .attribute_values
                    .remove(&record.object_attribute_value_id);
            }
            AppliedOp::ObjectAttributeValueCreated {
                object_attribute_value_id: record.object_attribute_value_id.clone(),
                object_id: record.object_id.clone(),
                name: record.name.clone(),
                value: record.value.clone(),
                restores_id: *retires_id,
            }
        }

        AppliedOp::ObjectModified {
            object_id,
            old_object_type,
            new_object_type,
        } => {
            tables.set_object_type(object_id, old_object_type)?;
            AppliedOp::ObjectModified {
                object_id: object_id.clone(),
                old_object_type: new_object_type.clone(),
                new_object_type: old_object_type.clone(),
            }
        }

        AppliedOp::ObjectRelationModified {
            object_relation_id,
            old_relation_type,
            new_relation_type,
        } => {
            tables.set_relation_type(object_relation_id, old_relation_type)?;
            AppliedOp::ObjectRelationModified {
                object_relation_id: object_relation_id.clone(),
                old_relation_type: new_relation_type.clone(),
                new_relation_type: old_relation_type.clone(),
            }
        }

        AppliedOp::ObjectAttributeValueModified {
            object_attribute_value_id,
            old_value,
            new_value,
        } => {
            tables.set_attribute_value(object_attribute_value_id, old_value)?;
            AppliedOp::ObjectAttributeValueModified {
                object_attribute_value_id: object_attribute_value_id.clone(),
                old_value: new_value.clone(),
                new_value: old_value.clone(),
            }
        }
    };
    Ok(compensation)
}

/// Invert `applied` newest-first. Used to unwind a failed event.
pub(crate) fn rollback(tables: &mut EntityTables, applied: &[AppliedOp]) -> Result<()> {
    for op in applied.iter().rev() {
        invert(tables, op)?;
    }
    Ok(())
}

fn delete_relation(
    tables: &mut EntityTables,
    id: &ObjectRelationId,
    applied: &mut Vec<AppliedOp>,
) -> Result<()> {
    let record = tables.remove_relation(id)?;
    tables.retired_mut().relations.insert(id.clone());
    applied.push(AppliedOp::ObjectRelationDeleted {
        record,
        retires_id: true,
    });
    Ok(())
}

fn delete_attribute_value(
    tables: &mut EntityTables,
    id: &AttributeValueId,
    applied: &mut Vec<AppliedOp>,
) -> Result<()> {
    let record = tables.remove_attribute_value(id)?;
    tables.retired_mut().attribute_values.insert(id.clone());
    applied.push(AppliedOp::ObjectAttributeValueDeleted {
        record,
        retires_id: true,
    });
    Ok(())
}

fn ensure_object_id_unused(tables: &EntityTables, id: &ObjectId) -> Result<()> {
    if tables.contains_object(id) || tables.is_retired_object(id) {
        return Err(OcedError::duplicate(EntityKind::Object, id));
    }
    Ok(())
}

fn ensure_relation_id_unused(tables: &EntityTables, id: &ObjectRelationId) -> Result<()> {
    if tables.contains_relation(id) || tables.is_retired_relation(id) {
        return Err(OcedError::duplicate(EntityKind::ObjectRelation, id));
    }
    Ok(())
}

fn ensure_attribute_value_id_unused(tables: &EntityTables, id: &AttributeValueId) -> Result<()> {
    if tables.contains_attribute_value(id) || tables.is_retired_attribute_value(id) {
        return Err(OcedError::duplicate(EntityKind::ObjectAttributeValue, id));
    }
    Ok(())
}
