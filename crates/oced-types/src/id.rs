use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// The table an identifier lives in. Used to qualify lookup and uniqueness
/// errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Object,
    ObjectRelation,
    ObjectAttributeValue,
    Event,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Object => "object",
            EntityKind::ObjectRelation => "object relation",
            EntityKind::ObjectAttributeValue => "object attribute value",
            EntityKind::Event => "event",
        };
        f.write_str(name)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the identifier, returning the owned string.
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of an object. Chosen by the caller, unique for the
    /// lifetime of the store.
    ObjectId
);

string_id!(
    /// Identifier of a directed relation between two objects.
    ObjectRelationId
);

string_id!(
    /// Identifier of a single named value attached to an object.
    AttributeValueId
);

/// Store-assigned event number.
///
/// Event ids start at 1 and increase by one per committed event. They are
/// rendered (and serialized) as decimal strings.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

impl EventId {
    /// The first id handed out by an empty store.
    pub const FIRST: EventId = EventId(1);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    /// The id following this one, or `None` once the counter is exhausted.
    pub fn next(&self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<u64>() {
            Ok(value) if value > 0 => Ok(Self(value)),
            _ => Err(TypeError::InvalidEventId(s.to_string())),
        }
    }
}

impl Serialize for EventId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_ids_display_raw_value() {
        let id = ObjectId::from("order-17");
        assert_eq!(id.to_string(), "order-17");
        assert_eq!(id.as_str(), "order-17");
        assert_eq!(format!("{id:?}"), "ObjectId(\"order-17\")");
    }

    #[test]
    fn string_ids_serialize_transparently() {
        let id = ObjectRelationId::new("R1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"R1\"");
        let parsed: ObjectRelationId = serde_json::from_str("\"R1\"").unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn event_id_renders_as_decimal_string() {
        let id = EventId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"42\"");
        let parsed: EventId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn event_id_rejects_zero_and_garbage() {
        assert!("0".parse::<EventId>().is_err());
        assert!("abc".parse::<EventId>().is_err());
        assert!(serde_json::from_str::<EventId>("\"-1\"").is_err());
        assert_eq!("7".parse::<EventId>().unwrap(), EventId::new(7));
    }

    #[test]
    fn event_ids_order_numerically() {
        assert!(EventId::new(9) < EventId::new(10));
        assert_eq!(EventId::FIRST.next(), Some(EventId::new(2)));
        assert_eq!(EventId::new(u64::MAX).next(), None);
    }

    #[test]
    fn entity_kind_display() {
        assert_eq!(EntityKind::ObjectAttributeValue.to_string(), "object attribute value");
        assert_eq!(
            serde_json::to_string(&EntityKind::ObjectRelation).unwrap(),
            "\"object_relation\""
        );
    }
}
