use std::collections::{BTreeMap, BTreeSet};

use oced_types::EventId;
use serde::{Deserialize, Serialize};

use crate::records::JoinRows;
use crate::state::StoreState;

/// Result of a full integrity check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub object_count: usize,
    pub relation_count: usize,
    pub attribute_value_count: usize,
    pub event_count: usize,
    pub violations: Vec<Violation>,
}

impl IntegrityReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific invariant breach found by the checker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Id of the offending row.
    pub subject: String,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    DanglingRelationEndpoint,
    DanglingAttributeOwner,
    ReverseIndexMismatch,
    InvolvementMismatch,
    JoinRowMismatch,
    TimeNotIncreasing,
    LogMismatch,
    RetiredIdLive,
    MissingVocabulary,
}

/// Whole-state invariant checker, run by `verify` and on snapshot load.
pub struct IntegrityChecker;

impl IntegrityChecker {
    pub fn check(state: &StoreState) -> IntegrityReport {
        let mut violations = Vec::new();
        check_relations(state, &mut violations);
        check_attribute_values(state, &mut violations);
        check_object_indices(state, &mut violations);
        check_joins_and_involvement(state, &mut violations);
        check_event_times(state, &mut violations);
        check_log(state, &mut violations);
        check_retired(state, &mut violations);
        check_vocabulary(state, &mut violations);

        let tables = state.tables();
        IntegrityReport {
            object_count: tables.objects.len(),
            relation_count: tables.relations.len(),
            attribute_value_count: tables.attribute_values.len(),
            event_count: tables.events.len(),
            violations,
        }
    }
}

fn violation(
    violations: &mut Vec<Violation>,
    kind: ViolationKind,
    subject: impl ToString,
    description: impl Into<String>,
) {
    violations.push(Violation {
        kind,
        subject: subject.to_string(),
        description: description.into(),
    });
}

fn check_relations(state: &StoreState, violations: &mut Vec<Violation>) {
    let tables = state.tables();
    for relation in tables.relations.values() {
        let id = &relation.object_relation_id;
        for (end, object_id) in [("source", &relation.from_object_id), ("target", &relation.to_object_id)] {
            match tables.objects.get(object_id) {
                None => violation(
                    violations,
                    ViolationKind::DanglingRelationEndpoint,
                    id,
                    format!("{end} object {object_id} does not exist"),
                ),
                Some(object) => {
                    let indexed = if end == "source" {
                        object.relation_ids_from.contains(id)
                    } else {
                        object.relation_ids_to.contains(id)
                    };
                    if !indexed {
                        violation(
                            violations,
                            ViolationKind::ReverseIndexMismatch,
                            id,
                            format!("{end} object {object_id} does not index the relation"),
                        );
                    }
                }
            }
        }
    }
}

fn check_attribute_values(state: &StoreState, violations: &mut Vec<Violation>) {
    let tables = state.tables();
    for value in tables.attribute_values.values() {
        let id = &value.object_attribute_value_id;
        match tables.objects.get(&value.object_id) {
            None => violation(
                violations,
                ViolationKind::DanglingAttributeOwner,
                id,
                format!("owner object {} does not exist", value.object_id),
            ),
            Some(owner) if !owner.attribute_value_ids.contains(id) => violation(
                violations,
                ViolationKind::ReverseIndexMismatch,
                id,
                format!("owner object {} does not index the value", value.object_id),
            ),
            Some(_) => {}
        }
    }
}

fn check_object_indices(state: &StoreState, violations: &mut Vec<Violation>) {
    let tables = state.tables();
    for object in tables.objects.values() {
        let id = &object.object_id;
        for relation_id in &object.relation_ids_from {
            if tables
                .relations
                .get(relation_id)
                .map_or(true, |r| &r.from_object_id != id)
            {
                violation(
                    violations,
                    ViolationKind::ReverseIndexMismatch,
                    id,
                    format!("outgoing index lists {relation_id}, which does not start here"),
                );
            }
        }
        for relation_id in &object.relation_ids_to {
            if tables
                .relations
                .get(relation_id)
                .map_or(true, |r| &r.to_object_id != id)
            {
                violation(
                    violations,
                    ViolationKind::ReverseIndexMismatch,
                    id,
                    format!("incoming index lists {relation_id}, which does not end here"),
                );
            }
        }
        for value_id in &object.attribute_value_ids {
            if tables
                .attribute_values
                .get(value_id)
                .map_or(true, |v| &v.object_id != id)
            {
                violation(
                    violations,
                    ViolationKind::ReverseIndexMismatch,
                    id,
                    format!("attribute index lists {value_id}, which it does not own"),
                );
            }
        }
    }
}

fn check_joins_and_involvement(state: &StoreState, violations: &mut Vec<Violation>) {
    let tables = state.tables();

    let mut expected = JoinRows::default();
    for event in tables.events.values() {
        let event_id = event.event_id;
        expected
            .event_x_object
            .extend(event.object_ids_involved.iter().map(|id| (event_id, id.clone())));
        expected.events_x_object_relation.extend(
            event
                .object_relation_ids_involved
                .iter()
                .map(|id| (event_id, id.clone())),
        );
        expected.events_x_object_attribute_value.extend(
            event
                .object_attribute_value_ids_involved
                .iter()
                .map(|id| (event_id, id.clone())),
        );
    }
    if expected != tables.joins {
        violation(
            violations,
            ViolationKind::JoinRowMismatch,
            "joins",
            "join rows differ from the involvement sets of the event rows",
        );
    }

    let retired = tables.retired();
    for (event_id, id) in &tables.joins.event_x_object {
        if !tables.objects.contains_key(id) && !retired.objects.contains(id) {
            violation(
                violations,
                ViolationKind::JoinRowMismatch,
                id,
                format!("event {event_id} involves an object that never existed"),
            );
        }
    }
    for (event_id, id) in &tables.joins.events_x_object_relation {
        if !tables.relations.contains_key(id) && !retired.relations.contains(id) {
            violation(
                violations,
                ViolationKind::JoinRowMismatch,
                id,
                format!("event {event_id} involves a relation that never existed"),
            );
        }
    }
    for (event_id, id) in &tables.joins.events_x_object_attribute_value {
        if !tables.attribute_values.contains_key(id) && !retired.attribute_values.contains(id) {
            violation(
                violations,
                ViolationKind::JoinRowMismatch,
                id,
                format!("event {event_id} involves an attribute value that never existed"),
            );
        }
    }

    let by_entity = |rows: Vec<(EventId, String)>| {
        let mut map: BTreeMap<String, BTreeSet<EventId>> = BTreeMap::new();
        for (event_id, id) in rows {
            map.entry(id).or_default().insert(event_id);
        }
        map
    };
    let object_events = by_entity(
        tables
            .joins
            .event_x_object
            .iter()
            .map(|(e, id)| (*e, id.to_string()))
            .collect(),
    );
    let relation_events = by_entity(
        tables
            .joins
            .events_x_object_relation
            .iter()
            .map(|(e, id)| (*e, id.to_string()))
            .collect(),
    );
    let value_events = by_entity(
        tables
            .joins
            .events_x_object_attribute_value
            .iter()
            .map(|(e, id)| (*e, id.to_string()))
            .collect(),
    );

    let empty = BTreeSet::new();
    let mut compare = |id: String, actual: &BTreeSet<EventId>, rows: &BTreeMap<String, BTreeSet<EventId>>| {
        let expected = rows.get(&id).unwrap_or(&empty);
        if actual != expected {
            violation(
                violations,
                ViolationKind::InvolvementMismatch,
                &id,
                format!("involvement history {actual:?} differs from join rows {expected:?}"),
            );
        }
    };
    for object in tables.objects.values() {
        compare(object.object_id.to_string(), &object.involved_in_event_ids, &object_events);
    }
    for relation in tables.relations.values() {
        compare(
            relation.object_relation_id.to_string(),
            &relation.involved_in_event_ids,
            &relation_events,
        );
    }
    for value in tables.attribute_values.values() {
        compare(
            value.object_attribute_value_id.to_string(),
            &value.involved_in_event_ids,
            &value_events,
        );
    }
}

fn check_event_times(state: &StoreState, violations: &mut Vec<Violation>) {
    let mut previous = None;
    for event in state.tables().events.values() {
        if let Some(previous) = previous {
            if !event.time.is_after(&previous) {
                violation(
                    violations,
                    ViolationKind::TimeNotIncreasing,
                    event.event_id,
                    format!("time {} is not after {previous}", event.time),
                );
            }
        }
        previous = Some(event.time);
    }
}

fn check_log(state: &StoreState, violations: &mut Vec<Violation>) {
    let log = state.log();
    let tables = state.tables();

    let ids: Vec<EventId> = log.records().iter().map(|r| r.event_id()).collect();
    if ids.windows(2).any(|pair| pair[0] >= pair[1]) {
        violation(
            violations,
            ViolationKind::LogMismatch,
            "log",
            "log records are not in strictly increasing event-id order",
        );
    }
    if let Some(last) = ids.last() {
        if *last >= state.next_event_id() {
            violation(
                violations,
                ViolationKind::LogMismatch,
                last,
                format!("next event id {} is not past the log", state.next_event_id()),
            );
        }
    }

    let live: Vec<EventId> = log
        .records()
        .iter()
        .filter(|r| r.is_live())
        .map(|r| r.event_id())
        .collect();
    if live.as_slice() != log.live_events() {
        violation(
            violations,
            ViolationKind::LogMismatch,
            "log",
            "live-event stack differs from committed log records",
        );
    }

    for record in log.records().iter().filter(|r| r.is_live()) {
        if tables.events.get(&record.event_id()) != Some(&record.event) {
            violation(
                violations,
                ViolationKind::LogMismatch,
                record.event_id(),
                "live log record has no matching event row",
            );
        }
    }
    for event_id in tables.events.keys() {
        if !log.get(*event_id).is_some_and(|r| r.is_live()) {
            violation(
                violations,
                ViolationKind::LogMismatch,
                event_id,
                "event row has no live log record",
            );
        }
    }
}

fn check_retired(state: &StoreState, violations: &mut Vec<Violation>) {
    let tables = state.tables();
    let retired = tables.retired();
    for id in retired.objects.iter().filter(|id| tables.objects.contains_key(*id)) {
        violation(violations, ViolationKind::RetiredIdLive, id, "retired object id is live");
    }
    for id in retired
        .relations
        .iter()
        .filter(|id| tables.relations.contains_key(*id))
    {
        violation(violations, ViolationKind::RetiredIdLive, id, "retired relation id is live");
    }
    for id in retired
        .attribute_values
        .iter()
        .filter(|id| tables.attribute_values.contains_key(*id))
    {
        violation(
            violations,
            ViolationKind::RetiredIdLive,
            id,
            "retired attribute value id is live",
        );
    }
}

fn check_vocabulary(state: &StoreState, violations: &mut Vec<Violation>) {
    let tables = state.tables();
    let vocabulary = tables.vocabulary();
    let mut missing = |label: &str, set: &BTreeSet<String>, what: &str| {
        if !set.contains(label) {
            violation(
                violations,
                ViolationKind::MissingVocabulary,
                label,
                format!("{what} is not registered"),
            );
        }
    };
    for object in tables.objects.values() {
        missing(&object.object_type, &vocabulary.object_types, "object type");
    }
    for relation in tables.relations.values() {
        missing(&relation.relation_type, &vocabulary.relation_types, "relation type");
    }
    for value in tables.attribute_values.values() {
        missing(&value.name, &vocabulary.attribute_names, "attribute name");
    }
    for event in tables.events.values() {
        missing(&event.event_type, &vocabulary.event_types, "event type");
        for name in event.events_attributes.keys() {
            missing(name, &vocabulary.event_attribute_names, "event attribute name");
        }
    }
}
