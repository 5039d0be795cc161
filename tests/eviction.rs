mod common;

use common::{options, test_message};
use quantum_retained::time::ManualClock;
use quantum_retained::{InMemory, LookupQuery};
use serde_json::json;
use std::time::Duration;

fn newest_times(store: &InMemory<impl quantum_retained::time::Clock>) -> Vec<u64> {
    store
        .lookup(&LookupQuery::new([0, 1], 100))
        .into_iter()
        .map(|m| m.time)
        .collect()
}

#[tokio::test]
async fn background_controller_enforces_max_size() {
    let mut store = InMemory::new(None);
    store
        .configure(Some(&options(json!({ "maxsize": 3, "prune": "20ms", "batch": 2 }))))
        .unwrap();
    for t in 1..=10 {
        store.store(test_message(1, 1, (t % 4) as u32, t)).unwrap();
    }
    for _ in 0..200 {
        if store.len() <= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(newest_times(&store), vec![10, 9, 8]);
    assert_eq!(store.metrics().evicted, 7);
    store.close().unwrap();
}

#[test]
fn zero_maxsize_is_unbounded() {
    let mut store = InMemory::new(None);
    store
        .configure(Some(&options(json!({ "maxsize": 0, "prune": 0 }))))
        .unwrap();
    for t in 0..500 {
        store.store(test_message(1, 2, (t % 7) as u32, t)).unwrap();
    }
    assert_eq!(store.prune().removed(), 0);
    assert_eq!(store.len(), 500);
}

#[test]
fn ttl_expiry_follows_the_clock() {
    let clock = ManualClock::new();
    let mut store = InMemory::with_clock(None, clock.clone());
    store.configure(Some(&options(json!({ "prune": 0 })))).unwrap();
    store.store(test_message(1, 1, 1, 1).with_ttl(30)).unwrap();
    store.store(test_message(1, 1, 2, 2).with_ttl(60)).unwrap();
    store.store(test_message(1, 1, 3, 3)).unwrap();

    clock.advance(Duration::from_secs(30));
    assert_eq!(newest_times(&store), vec![3, 2]);
    clock.advance(Duration::from_secs(30));
    assert_eq!(newest_times(&store), vec![3]);

    let report = store.prune();
    assert_eq!(report.expired, 2);
    assert_eq!(report.evicted, 0);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn reconfigure_replaces_the_controller() {
    let mut store = InMemory::new(None);
    store.configure(None).unwrap();
    for t in 1..=5 {
        store.store(test_message(1, 1, 1, t)).unwrap();
    }
    store
        .configure(Some(&options(json!({ "maxsize": 1, "prune": "10ms" }))))
        .unwrap();
    for _ in 0..200 {
        if store.len() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(newest_times(&store), vec![5]);
}
