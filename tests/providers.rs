mod common;

use common::test_message;
use quantum_retained::config::{ConfigError, StorageConfig};
use quantum_retained::storage::{load, load_from_json, provider};
use quantum_retained::{Ssid, Storage};

#[test]
fn registry_names() {
    for (name, expected) in [
        ("inmemory", "inmemory"),
        ("memory", "inmemory"),
        ("noop", "noop"),
        ("", "noop"),
    ] {
        assert_eq!(provider(name, None).unwrap().name(), expected);
    }
    assert!(matches!(
        provider("redis", None),
        Err(ConfigError::UnknownProvider(_))
    ));
}

#[tokio::test]
async fn load_from_json_configures_the_provider() {
    let raw = r#"{ "provider": "inmemory", "config": { "maxsize": 2.0, "prune": 0 } }"#;
    let storage = load_from_json(raw, None).unwrap();
    assert_eq!(storage.name(), "inmemory");
    for t in 1..=3 {
        storage.store(test_message(1, 1, t as u32, t)).unwrap();
    }
    let matches = storage.query_last(Ssid::from([0, 1]), 10).await.unwrap();
    assert_eq!(matches.len(), 3);
    storage.close().unwrap();
}

#[test]
fn bad_sections_are_reported() {
    let err = load_from_json("{ not json", None).unwrap_err();
    assert!(format!("{err:#}").contains("invalid storage section"));

    let err = load_from_json(r#"{ "provider": "inmemory", "config": { "maxsize": -1 } }"#, None)
        .unwrap_err();
    assert!(format!("{err:#}").contains("maxsize"));

    let mut config = StorageConfig::new("inmemory");
    config
        .config
        .insert("duplicates".into(), serde_json::json!("sometimes"));
    assert!(matches!(
        load(&config, None),
        Err(ConfigError::InvalidOption { .. })
    ));
}

#[tokio::test]
async fn noop_provider_discards_everything() {
    let storage: Box<dyn Storage> = provider("noop", None).unwrap();
    storage.store(test_message(1, 1, 1, 1)).unwrap();
    assert_eq!(storage.query_last(Ssid::from([0, 1]), 10).await.unwrap().len(), 0);
}
