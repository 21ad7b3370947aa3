//! The nine primitive mutations an event is composed of.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use oced_types::{AttributeValueId, ObjectId, ObjectRelationId};
use serde::{Deserialize, Serialize};

use crate::error::{OcedError, Result};

/// Discriminant of a [`SubEvent`], named as in the serialized `function`
/// field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubEventKind {
    CreateObject,
    CreateObjectRelation,
    CreateObjectAttributeValue,
    DeleteObject,
    DeleteObjectRelation,
    DeleteObjectAttributeValue,
    ModifyObject,
    ModifyObjectRelation,
    ModifyObjectAttributeValue,
}

impl SubEventKind {
    pub const ALL: [SubEventKind; 9] = [
        SubEventKind::CreateObject,
        SubEventKind::CreateObjectRelation,
        SubEventKind::CreateObjectAttributeValue,
        SubEventKind::DeleteObject,
        SubEventKind::DeleteObjectRelation,
        SubEventKind::DeleteObjectAttributeValue,
        SubEventKind::ModifyObject,
        SubEventKind::ModifyObjectRelation,
        SubEventKind::ModifyObjectAttributeValue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubEventKind::CreateObject => "create_object",
            SubEventKind::CreateObjectRelation => "create_object_relation",
            SubEventKind::CreateObjectAttributeValue => "create_object_attribute_value",
            SubEventKind::DeleteObject => "delete_object",
            SubEventKind::DeleteObjectRelation => "delete_object_relation",
            SubEventKind::DeleteObjectAttributeValue => "delete_object_attribute_value",
            SubEventKind::ModifyObject => "modify_object",
            SubEventKind::ModifyObjectRelation => "modify_object_relation",
            SubEventKind::ModifyObjectAttributeValue => "modify_object_attribute_value",
        }
    }

    /// Keys the string-map form of this kind must carry.
    pub fn required_parameters(&self) -> &'static [&'static str] {
        match self {
            SubEventKind::CreateObject => &["object_id", "object_type"],
            SubEventKind::CreateObjectRelation => &[
                "object_relation_id",
                "from_object_id",
                "to_object_id",
                "relation_type",
            ],
            SubEventKind::CreateObjectAttributeValue => {
                &["object_attribute_value_id", "object_id", "name", "value"]
            }
            SubEventKind::DeleteObject => &["object_id"],
            SubEventKind::DeleteObjectRelation => &["object_relation_id"],
            SubEventKind::DeleteObjectAttributeValue => &["object_attribute_value_id"],
            SubEventKind::ModifyObject => &["object_id", "new_object_type"],
            SubEventKind::ModifyObjectRelation => &["object_relation_id", "new_relation_type"],
            SubEventKind::ModifyObjectAttributeValue => {
                &["object_attribute_value_id", "new_value"]
            }
        }
    }
}

impl fmt::Display for SubEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubEventKind {
    type Err = OcedError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                OcedError::type_mismatch("function", format!("unknown sub-event function {s:?}"))
            })
    }
}

/// One primitive create / delete / modify operation.
///
/// Serialized as `{"function": "<kind>", "parameters": {...}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "function", content = "parameters", rename_all = "snake_case")]
pub enum SubEvent {
    CreateObject {
        object_id: ObjectId,
        object_type: String,
    },
    CreateObjectRelation {
        object_relation_id: ObjectRelationId,
        from_object_id: ObjectId,
        to_object_id: ObjectId,
        relation_type: String,
    },
    CreateObjectAttributeValue {
        object_attribute_value_id: AttributeValueId,
        object_id: ObjectId,
        name: String,
        value: String,
    },
    DeleteObject {
        object_id: ObjectId,
    },
    DeleteObjectRelation {
        object_relation_id: ObjectRelationId,
    },
    DeleteObjectAttributeValue {
        object_attribute_value_id: AttributeValueId,
    },
    ModifyObject {
        object_id: ObjectId,
        new_object_type: String,
    },
    ModifyObjectRelation {
        object_relation_id: ObjectRelationId,
        new_relation_type: String,
    },
    ModifyObjectAttributeValue {
        object_attribute_value_id: AttributeValueId,
        new_value: String,
    },
}

impl SubEvent {
    pub fn create_object(object_id: &str, object_type: &str) -> Self {
        SubEvent::CreateObject {
            object_id: object_id.into(),
            object_type: object_type.into(),
        }
    }

    pub fn create_object_relation(
        object_relation_id: &str,
        from_object_id: &str,
        to_object_id: &str,
        relation_type: &str,
    ) -> Self {
        SubEvent::CreateObjectRelation {
            object_relation_id: object_relation_id.into(),
            from_object_id: from_object_id.into(),
            to_object_id: to_object_id.into(),
            relation_type: relation_type.into(),
        }
    }

    pub fn create_object_attribute_value(
        object_attribute_value_id: &str,
        object_id: &str,
        name: &str,
        value: &str,
    ) -> Self {
        SubEvent::CreateObjectAttributeValue {
            object_attribute_value_id: object_attribute_value_id.into(),
            object_id: object_id.into(),
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn delete_object(object_id: &str) -> Self {
        SubEvent::DeleteObject {
            object_id: object_id.into(),
        }
    }

    pub fn delete_object_relation(object_relation_id: &str) -> Self {
        SubEvent::DeleteObjectRelation {
            object_relation_id: object_relation_id.into(),
        }
    }

    pub fn delete_object_attribute_value(object_attribute_value_id: &str) -> Self {
        SubEvent::DeleteObjectAttributeValue {
            object_attribute_value_id: object_attribute_value_id.into(),
        }
    }

    pub fn modify_object(object_id: &str, new_object_type: &str) -> Self {
        SubEvent::ModifyObject {
            object_id: object_id.into(),
            new_object_type: new_object_type.into(),
        }
    }

    pub fn modify_object_relation(object_relation_id: &str, new_relation_type: &str) -> Self {
        SubEvent::ModifyObjectRelation {
            object_relation_id: object_relation_id.into(),
            new_relation_type: new_relation_type.into(),
        }
    }

    pub fn modify_object_attribute_value(object_attribute_value_id: &str, new_value: &str) -> Self {
        SubEvent::ModifyObjectAttributeValue {
            object_attribute_value_id: object_attribute_value_id.into(),
            new_value: new_value.into(),
        }
    }

    /// Build a sub-event from a function name and a string parameter map,
    /// checking that every required key is present. Extra keys are ignored.
    pub fn from_parameters(function: &str, parameters: &BTreeMap<String, String>) -> Result<Self> {
        let kind: SubEventKind = function.parse()?;
        let get = |key: &str| -> Result<String> {
            parameters.get(key).cloned().ok_or_else(|| {
                OcedError::type_mismatch(
                    format!("{kind}.parameters"),
                    format!("missing required parameter {key:?}"),
                )
            })
        };

        Ok(match kind {
            SubEventKind::CreateObject => SubEvent::CreateObject {
                object_id: get("object_id")?.into(),
                object_type: get("object_type")?,
            },
            SubEventKind::CreateObjectRelation => SubEvent::CreateObjectRelation {
                object_relation_id: get("object_relation_id")?.into(),
                from_object_id: get("from_object_id")?.into(),
                to_object_id: get("to_object_id")?.into(),
                relation_type: get("relation_type")?,
            },
            SubEventKind::CreateObjectAttributeValue => SubEvent::CreateObjectAttributeValue {
                object_attribute_value_id: get("object_attribute_value_id")?.into(),
                object_id: get("object_id")?.into(),
                name: get("name")?,
                value: get("value")?,
            },
            SubEventKind::DeleteObject => SubEvent::DeleteObject {
                object_id: get("object_id")?.into(),
            },
            SubEventKind::DeleteObjectRelation => SubEvent::DeleteObjectRelation {
                object_relation_id: get("object_relation_id")?.into(),
            },
            SubEventKind::DeleteObjectAttributeValue => SubEvent::DeleteObjectAttributeValue {
                object_attribute_value_id: get("object_attribute_value_id")?.into(),
            },
            SubEventKind::ModifyObject => SubEvent::ModifyObject {
                object_id: get("object_id")?.into(),
                new_object_type: get("new_object_type")?,
            },
            SubEventKind::ModifyObjectRelation => SubEvent::ModifyObjectRelation {
                object_relation_id: get("object_relation_id")?.into(),
                new_relation_type: get("new_relation_type")?,
            },
            SubEventKind::ModifyObjectAttributeValue => SubEvent::ModifyObjectAttributeValue {
                object_attribute_value_id: get("object_attribute_value_id")?.into(),
                new_value: get("new_value")?,
            },
        })
    }

    pub fn kind(&self) -> SubEventKind {
        match self {
            SubEvent::CreateObject { .. } => SubEventKind::CreateObject,
            SubEvent::CreateObjectRelation { .. } => SubEventKind::CreateObjectRelation,
            SubEvent::CreateObjectAttributeValue { .. } => SubEventKind::CreateObjectAttributeValue,
            SubEvent::DeleteObject { .. } => SubEventKind::DeleteObject,
            SubEvent::DeleteObjectRelation { .. } => SubEventKind::DeleteObjectRelation,
            SubEvent::DeleteObjectAttributeValue { .. } => SubEventKind::DeleteObjectAttributeValue,
            SubEvent::ModifyObject { .. } => SubEventKind::ModifyObject,
            SubEvent::ModifyObjectRelation { .. } => SubEventKind::ModifyObjectRelation,
            SubEvent::ModifyObjectAttributeValue { .. } => SubEventKind::ModifyObjectAttributeValue,
        }
    }

    /// The string-map form of this sub-event's parameters.
    pub fn parameters(&self) -> BTreeMap<String, String> {
        let pairs: Vec<(&str, String)> = match self {
            SubEvent::CreateObject {
                object_id,
                object_type,
            } => vec![
                ("object_id", object_id.to_string()),
                ("object_type", object_type.clone()),
            ],
            SubEvent::CreateObjectRelation {
                object_relation_id,
                from_object_id,
                to_object_id,
                relation_type,
            } => vec![
                ("object_relation_id", object_relation_id.to_string()),
                ("from_object_id", from_object_id.to_string()),
                ("to_object_id", to_object_id.to_string()),
                ("relation_type", relation_type.clone()),
            ],
            SubEvent::CreateObjectAttributeValue {
                object_attribute_value_id,
                object_id,
                name,
                value,
            } => vec![
                ("object_attribute_value_id", object_attribute_value_id.to_string()),
                ("object_id", object_id.to_string()),
                ("name", name.clone()),
                ("value", value.clone()),
            ],
            SubEvent::DeleteObject { object_id } => vec![("object_id", object_id.to_string())],
            SubEvent::DeleteObjectRelation { object_relation_id } => {
                vec![("object_relation_id", object_relation_id.to_string())]
            }
            SubEvent::DeleteObjectAttributeValue {
                object_attribute_value_id,
            } => vec![(
                "object_attribute_value_id",
                object_attribute_value_id.to_string(),
            )],
            SubEvent::ModifyObject {
                object_id,
                new_object_type,
            } => vec![
                ("object_id", object_id.to_string()),
                ("new_object_type", new_object_type.clone()),
            ],
            SubEvent::ModifyObjectRelation {
                object_relation_id,
                new_relation_type,
            } => vec![
                ("object_relation_id", object_relation_id.to_string()),
                ("new_relation_type", new_relation_type.clone()),
            ],
            SubEvent::ModifyObjectAttributeValue {
                object_attribute_value_id,
                new_value,
            } => vec![
                ("object_attribute_value_id", object_attribute_value_id.to_string()),
                ("new_value", new_value.clone()),
            ],
        };
        pairs
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect()
    }
}
