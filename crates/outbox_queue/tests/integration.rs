//! Integration tests for the durable queue.

use outbox_queue::{DurableStore, QueueError, RecordKey, StoreConfig};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

fn pizza(name: &str) -> Value {
    json!({ "pizzaName": name, "createdBy": "tester", "size": "Large", "toppings": [] })
}

#[test]
fn records_survive_reload() {
    let dir = tempdir().unwrap();

    {
        let store = DurableStore::open(dir.path()).unwrap();
        store.append(pizza("A")).unwrap();
        store.append(pizza("B")).unwrap();
    }

    let store = DurableStore::open(dir.path()).unwrap();
    let snapshot = store.read_all().unwrap();
    assert_eq!(snapshot.payloads(), vec![pizza("A"), pizza("B")]);
}

#[test]
fn partial_clear_survives_reload() {
    let dir = tempdir().unwrap();

    let late = {
        let store = DurableStore::open(dir.path()).unwrap();
        store.append(pizza("A")).unwrap();
        let snapshot = store.read_all().unwrap();
        let late = store.append(pizza("late")).unwrap();
        store.clear_snapshot(&snapshot).unwrap();
        late
    };

    let store = DurableStore::open(dir.path()).unwrap();
    assert_eq!(store.read_all().unwrap().keys(), vec![late]);
}

#[test]
fn torn_append_is_discarded_on_open() {
    let dir = tempdir().unwrap();

    {
        let store = DurableStore::open(dir.path()).unwrap();
        store.append(pizza("A")).unwrap();
    }

    // Simulate a crash halfway through the next frame.
    let mut file = OpenOptions::new()
        .append(true)
        .open(dir.path().join("queue.log"))
        .unwrap();
    file.write_all(b"OBXQ\x01\x00\x01\xff").unwrap();
    drop(file);

    let store = DurableStore::open(dir.path()).unwrap();
    assert_eq!(store.len(), 1);
    let key = store.append(pizza("B")).unwrap();
    assert_eq!(key, RecordKey::new(2));

    drop(store);
    let store = DurableStore::open(dir.path()).unwrap();
    assert_eq!(store.len(), 2);
}

#[test]
fn quota_is_enforced_per_store() {
    let dir = tempdir().unwrap();
    let store =
        DurableStore::open_with_config(dir.path(), StoreConfig::new().max_log_size(80)).unwrap();

    store.append(json!({"pizzaName": "A"})).unwrap();
    let err = store
        .append(json!({"pizzaName": "a pizza name far too long to fit in the remaining quota"}))
        .unwrap_err();
    assert!(matches!(err, QueueError::StorageFull(_)));
    assert_eq!(store.len(), 1);
}

#[test]
fn second_handle_is_refused() {
    let dir = tempdir().unwrap();
    let _store = DurableStore::open(dir.path()).unwrap();
    assert!(matches!(
        DurableStore::open(dir.path()),
        Err(QueueError::Locked)
    ));
}

#[test]
fn missing_directory_without_create() {
    let dir = tempdir().unwrap();
    let result = DurableStore::open_with_config(
        &dir.path().join("nope"),
        StoreConfig::new().create_if_missing(false),
    );
    assert!(matches!(result, Err(QueueError::StoreUnavailable(_))));
}

#[test]
fn concurrent_appends_survive_snapshot_clear() {
    let store = Arc::new(DurableStore::in_memory());
    for i in 0..10 {
        store.append(json!({ "n": i })).unwrap();
    }

    let snapshot = store.read_all().unwrap();

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..25 {
                    store.append(json!({ "thread": t, "n": i })).unwrap();
                }
            })
        })
        .collect();

    store.clear_snapshot(&snapshot).unwrap();
    for writer in writers {
        writer.join().unwrap();
    }

    let remaining = store.read_all().unwrap();
    assert_eq!(remaining.len(), 100);
    assert!(remaining.records().iter().all(|r| r.payload.get("thread").is_some()));
}

proptest! {
    #[test]
    fn read_all_returns_appends_in_order(names in prop::collection::vec("[a-z]{1,12}", 0..40)) {
        let store = DurableStore::in_memory();
        let keys: Vec<RecordKey> = names.iter().map(|n| store.append(pizza(n)).unwrap()).collect();

        let snapshot = store.read_all().unwrap();
        prop_assert_eq!(snapshot.keys(), keys.clone());
        prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));

        let expected: Vec<Value> = names.iter().map(|n| pizza(n)).collect();
        prop_assert_eq!(snapshot.payloads(), expected);
    }

    #[test]
    fn appends_after_snapshot_survive_clear(before in 0usize..20, after in 0usize..20) {
        let store = DurableStore::in_memory();
        for i in 0..before {
            store.append(json!({ "before": i })).unwrap();
        }
        let snapshot = store.read_all().unwrap();
        let late: Vec<RecordKey> = (0..after)
            .map(|i| store.append(json!({ "after": i })).unwrap())
            .collect();

        prop_assert_eq!(store.clear_snapshot(&snapshot).unwrap(), before);
        prop_assert_eq!(store.read_all().unwrap().keys(), late);
    }
}
