use oced_store::{
    dump_json, dump_to_path, load_from_path, load_json, EventWriter, NewEvent, OcedError,
    OcedStore, Snapshot, StoreConfig, StoreReader, SubEvent,
};
use oced_types::EventId;

fn history() -> OcedStore {
    let store = OcedStore::with_config(StoreConfig::cascading());
    store
        .insert_event(
            NewEvent::at("2024-05-01T06:00:00Z", "receive")
                .unwrap()
                .with_attribute("dock", "3")
                .with_sub_event(SubEvent::create_object("P1", "pallet"))
                .with_sub_event(SubEvent::create_object("S1", "shelf"))
                .with_sub_event(SubEvent::create_object_relation("L1", "P1", "S1", "stored_on"))
                .with_sub_event(SubEvent::create_object_attribute_value("W1", "P1", "weight", "412"))
                .involving_object("P1")
                .involving_relation("L1"),
        )
        .unwrap();
    store
        .insert_event(
            NewEvent::at("2024-05-01T07:15:00Z", "reweigh")
                .unwrap()
                .with_sub_event(SubEvent::modify_object_attribute_value("W1", "398"))
                .involving_attribute_value("W1"),
        )
        .unwrap();
    store
        .insert_event(
            NewEvent::at("2024-05-01T09:00:00Z", "dispose")
                .unwrap()
                .with_sub_event(SubEvent::delete_object("S1")),
        )
        .unwrap();
    store.revert_latest().unwrap();
    store
}

#[test]
fn file_round_trip_is_lossless() {
    let store = history();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");

    dump_to_path(&store, &path).unwrap();
    let restored = load_from_path(&path).unwrap();

    assert_eq!(restored.digest().unwrap(), store.digest().unwrap());
    assert_eq!(restored.state().unwrap(), store.state().unwrap());
    assert_eq!(restored.config(), store.config());
    assert_eq!(restored.log().unwrap().len(), 3);

    // The restored store keeps working: ids continue, revert stays stack-ordered.
    let next = restored
        .insert_event(NewEvent::at("2024-05-01T10:00:00Z", "audit").unwrap())
        .unwrap();
    assert_eq!(next, EventId::new(4));
    assert_eq!(restored.revert_latest().unwrap(), next);
    assert_eq!(restored.revert_latest().unwrap(), EventId::new(2));
}

#[test]
fn tampered_state_is_rejected() {
    let encoded = dump_json(&history()).unwrap();
    let tampered = encoded.replacen("\"398\"", "\"1\"", 1);
    assert_ne!(tampered, encoded);

    let error = load_json(&tampered).unwrap_err();
    assert!(matches!(error, OcedError::CorruptSnapshot(ref reason) if reason.contains("digest")));
}

#[test]
fn tampered_config_is_rejected() {
    let encoded = dump_json(&history()).unwrap();
    let tampered = encoded.replacen("\"cascade\"", "\"reject\"", 1);
    assert_ne!(tampered, encoded);

    let error = load_json(&tampered).unwrap_err();
    assert!(matches!(error, OcedError::CorruptSnapshot(ref reason) if reason.contains("digest")));
}

#[test]
fn consistent_digest_over_broken_state_is_rejected() {
    let store = history();
    let mut document: serde_json::Value = serde_json::from_str(&dump_json(&store).unwrap()).unwrap();
    document["state"]["tables"]["relations"]["L1"]["to_object_id"] = "S9".into();

    let state: oced_store::StoreState =
        serde_json::from_value(document["state"].clone()).unwrap();
    let digest = Snapshot::content_digest(store.config(), &state).unwrap();
    document["digest"] = digest.into();

    let error = load_json(&document.to_string()).unwrap_err();
    assert!(matches!(error, OcedError::CorruptSnapshot(ref reason) if reason.contains("integrity")));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let error = load_from_path(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(error, OcedError::Io(_)));
}
