use oced_store::{
    DeletePolicy, EventWriter, NewEvent, OcedError, OcedStore, StoreConfig, StoreReader,
    StoreState, SubEvent,
};
use oced_types::EventTime;
use proptest::prelude::*;
use serde_json::Value;

const LABELS: [&str; 3] = ["alpha", "beta", "gamma"];

fn arb_sub_event() -> impl Strategy<Value = SubEvent> {
    (0u8..9, 0usize..4, 0usize..4, 0usize..3).prop_map(|(kind, a, b, label)| {
        let (o, p) = (format!("O{a}"), format!("O{b}"));
        let (r, v) = (format!("R{a}"), format!("A{a}"));
        let label = LABELS[label];
        match kind {
            0 => SubEvent::create_object(&o, label),
            1 => SubEvent::create_object_relation(&r, &o, &p, label),
            2 => SubEvent::create_object_attribute_value(&v, &p, label, &o),
            3 => SubEvent::delete_object(&o),
            4 => SubEvent::delete_object_relation(&r),
            5 => SubEvent::delete_object_attribute_value(&v),
            6 => SubEvent::modify_object(&o, label),
            7 => SubEvent::modify_object_relation(&r, label),
            _ => SubEvent::modify_object_attribute_value(&v, label),
        }
    })
}

fn arb_event() -> impl Strategy<Value = (Vec<SubEvent>, Vec<usize>, bool)> {
    (
        prop::collection::vec(arb_sub_event(), 1..5),
        prop::collection::vec(0usize..4, 0..3),
        any::<bool>(),
    )
}

fn build_event(minute: i64, sub_events: Vec<SubEvent>, involved: &[usize]) -> NewEvent {
    let base = EventTime::parse("2024-01-01T00:00:00Z").unwrap();
    let time = EventTime::from_timestamp_micros(base.timestamp_micros() + minute * 60_000_000)
        .unwrap();
    let mut event = NewEvent::new(time, LABELS[minute as usize % LABELS.len()]);
    for sub_event in sub_events {
        event = event.with_sub_event(sub_event);
    }
    for index in involved {
        event = event.involving_object(&format!("O{index}"));
    }
    event
}

fn entities(state: &StoreState) -> Value {
    let tables = state.tables();
    serde_json::to_value((
        tables.objects().collect::<Vec<_>>(),
        tables.relations().collect::<Vec<_>>(),
        tables.attribute_values().collect::<Vec<_>>(),
        tables.events().collect::<Vec<_>>(),
        tables.joins(),
        tables.retired(),
    ))
    .unwrap()
}

/// Rename one event id throughout an encoded table set. Generated entity
/// ids and labels are never bare numbers, so only event ids match.
fn remap_event_id(value: Value, from: &str, to: &str) -> Value {
    match value {
        Value::String(s) if s == from => Value::String(to.to_string()),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| remap_event_id(item, from, to))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| {
                    let key = if key == from { to.to_string() } else { key };
                    (key, remap_event_id(item, from, to))
                })
                .collect(),
        ),
        other => other,
    }
}

fn config(cascade: bool) -> StoreConfig {
    StoreConfig {
        delete_policy: if cascade {
            DeletePolicy::Cascade
        } else {
            DeletePolicy::Reject
        },
        allow_self_relations: true,
    }
}

proptest! {
    #[test]
    fn random_histories_keep_integrity(
        events in prop::collection::vec(arb_event(), 1..16),
        cascade in any::<bool>(),
    ) {
        let store = OcedStore::with_config(config(cascade));
        for (minute, (sub_events, involved, _)) in events.into_iter().enumerate() {
            let digest = store.digest().unwrap();
            let result = store.insert_event(build_event(minute as i64, sub_events, &involved));
            if result.is_err() {
                prop_assert_eq!(store.digest().unwrap(), digest);
            }
            let report = store.verify().unwrap();
            prop_assert!(report.is_valid(), "{:?}", report.violations);
        }
    }

    #[test]
    fn committed_times_strictly_increase(
        offsets in prop::collection::vec(0i64..50, 1..20),
    ) {
        let store = OcedStore::new();
        for offset in offsets {
            let max_before = store.max_time().unwrap();
            let event = build_event(offset, vec![], &[]);
            let time = event.time;
            match store.insert_event(event) {
                Ok(_) => prop_assert!(max_before.map_or(true, |max| time.is_after(&max))),
                Err(OcedError::OrderingViolation { current_max, .. }) => {
                    prop_assert_eq!(Some(current_max), max_before);
                    prop_assert!(!time.is_after(&current_max));
                }
                Err(other) => prop_assert!(false, "unexpected error {}", other),
            }
        }
        let events = store.events().unwrap();
        for pair in events.windows(2) {
            prop_assert!(pair[1].time.is_after(&pair[0].time));
        }
    }

    #[test]
    fn revert_inverts_each_committed_event(
        events in prop::collection::vec(arb_event(), 1..12),
        cascade in any::<bool>(),
    ) {
        let store = OcedStore::with_config(config(cascade));
        for (minute, (sub_events, involved, revert)) in events.into_iter().enumerate() {
            let minute = minute as i64;
            let before = store.state().unwrap();
            let first_id = match store.insert_event(build_event(minute, sub_events.clone(), &involved)) {
                Ok(id) => id,
                Err(_) => continue,
            };
            if revert {
                let committed = store.state().unwrap();
                store.revert_latest().unwrap();
                let after = store.state().unwrap();
                prop_assert_eq!(entities(&after), entities(&before));
                prop_assert_eq!(after.log().live_events(), before.log().live_events());

                // Re-inserting the same content lands on the committed
                // state, with only the event id moved on.
                let second_id = store
                    .insert_event(build_event(minute, sub_events, &involved))
                    .unwrap();
                prop_assert!(second_id > first_id);
                let expected = remap_event_id(
                    entities(&committed),
                    &first_id.to_string(),
                    &second_id.to_string(),
                );
                prop_assert_eq!(entities(&store.state().unwrap()), expected);
                prop_assert!(store.verify().unwrap().is_valid());
            }
        }

        // Unwinding the whole history leaves nothing behind.
        while store.revert_latest().is_ok() {}
        prop_assert!(store.objects().unwrap().is_empty());
        prop_assert!(store.events().unwrap().is_empty());
        prop_assert!(store.join_rows().unwrap().is_empty());
        let state = store.state().unwrap();
        prop_assert!(state.tables().retired().objects.is_empty());
        prop_assert!(store.verify().unwrap().is_valid());
    }
}
