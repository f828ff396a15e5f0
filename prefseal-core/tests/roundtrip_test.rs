//! Round-trip and tamper-detection behavior across both store backends

use prefseal_core::{
    ConsistencyVerifier, DeviceIdentity, FilePreferenceStore, PreferenceStore,
    RegistryPreferenceStore, Verdict,
};
use serde_json::{json, Value};
use tempfile::TempDir;

const CAPTURE_DEVICE_ID: &str = "S-1-5-21-2625391329-1236784108-3013698973";

/// One value per variant of the supported union.
fn union_fixtures() -> Vec<(&'static str, Value)> {
    vec![
        ("fixture.null_pref", Value::Null),
        ("fixture.bool_pref", json!(true)),
        ("fixture.int_pref", json!(42)),
        ("fixture.float_pref", json!(2.5)),
        ("fixture.string_pref", json!("https://www.example.com/")),
        ("fixture.empty_list_pref", json!([])),
        ("fixture.list_pref", json!(["a", 1, null])),
        ("fixture.object_pref", json!({"z": 1, "a": {"nested": true}, "drop": []})),
    ]
}

fn roundtrip_over(store: impl PreferenceStore) {
    let mut verifier = ConsistencyVerifier::new(store, DeviceIdentity::new(CAPTURE_DEVICE_ID));

    for (path, value) in union_fixtures() {
        verifier.set_protected_value(path, value.clone()).unwrap();
        assert_eq!(
            verifier.validate(path).unwrap(),
            Verdict::Valid,
            "round-trip failed for {path}"
        );
        assert_eq!(verifier.get_value(path).unwrap(), value);
    }

    let protected = verifier.store().list_protected_paths().unwrap();
    assert_eq!(protected.len(), union_fixtures().len());
}

#[test]
fn test_roundtrip_file_backend() {
    let dir = TempDir::new().unwrap();
    roundtrip_over(FilePreferenceStore::new(dir.path().join("Secure Preferences")));
}

#[test]
fn test_roundtrip_registry_backend() {
    let dir = TempDir::new().unwrap();
    roundtrip_over(RegistryPreferenceStore::new(dir.path().join("hive.json")));
}

#[test]
fn test_corrupted_digest_is_invalid() {
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("Secure Preferences");
    let mut verifier = ConsistencyVerifier::new(
        FilePreferenceStore::new(&store_path),
        DeviceIdentity::new(CAPTURE_DEVICE_ID),
    );

    verifier.set_protected_value("homepage", json!("https://a/")).unwrap();

    // Flip one hex character of the stored digest.
    let mut doc: Value =
        serde_json::from_str(&std::fs::read_to_string(&store_path).unwrap()).unwrap();
    let stored = doc["protection"]["macs"]["homepage"].as_str().unwrap();
    let mut corrupted: Vec<u8> = stored.bytes().collect();
    corrupted[10] = if corrupted[10] == b'A' { b'B' } else { b'A' };
    doc["protection"]["macs"]["homepage"] = json!(String::from_utf8(corrupted).unwrap());
    std::fs::write(&store_path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();

    assert!(matches!(
        verifier.validate("homepage").unwrap(),
        Verdict::Invalid { .. }
    ));
}

#[test]
fn test_verify_all_reports_each_path() {
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("hive.json");
    let mut verifier = ConsistencyVerifier::new(
        RegistryPreferenceStore::new(&store_path),
        DeviceIdentity::new(CAPTURE_DEVICE_ID),
    );

    verifier.set_protected_value("homepage", json!("https://a/")).unwrap();
    verifier.set_protected_value("browser.show_home_button", json!(true)).unwrap();

    // Tamper with one of the two values out-of-band.
    let mut hive: Value =
        serde_json::from_str(&std::fs::read_to_string(&store_path).unwrap()).unwrap();
    hive["Preferences"]["homepage"] = json!("https://evil/");
    std::fs::write(&store_path, serde_json::to_string_pretty(&hive).unwrap()).unwrap();

    let results = verifier.verify_all().unwrap();
    assert_eq!(results.len(), 2);

    let by_path: std::collections::BTreeMap<_, _> = results.into_iter().collect();
    assert_eq!(by_path["browser.show_home_button"], Verdict::Valid);
    assert!(matches!(by_path["homepage"], Verdict::Invalid { .. }));
}

#[test]
fn test_failed_write_leaves_prior_state_intact() {
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("Secure Preferences");
    let mut verifier = ConsistencyVerifier::new(
        FilePreferenceStore::new(&store_path),
        DeviceIdentity::new(CAPTURE_DEVICE_ID),
    );

    verifier.set_protected_value("homepage", json!("https://a/")).unwrap();
    let before = std::fs::read_to_string(&store_path).unwrap();

    // Holding the store lock makes the next write fail before it mutates
    // anything; the document must be untouched afterwards.
    let lock_path = dir.path().join("Secure Preferences.lock");
    std::fs::write(&lock_path, "").unwrap();

    let err = verifier.set_protected_value("homepage", json!("https://b/"));
    assert!(err.is_err());

    let after = std::fs::read_to_string(&store_path).unwrap();
    assert_eq!(before, after);

    std::fs::remove_file(&lock_path).unwrap();
    assert_eq!(verifier.validate("homepage").unwrap(), Verdict::Valid);
}

#[test]
fn test_account_values_roundtrip() {
    let dir = TempDir::new().unwrap();
    let mut verifier = ConsistencyVerifier::new(
        FilePreferenceStore::new(dir.path().join("Secure Preferences")),
        DeviceIdentity::new(CAPTURE_DEVICE_ID),
    );

    verifier
        .set_protected_value("account_values.browser.show_home_button", json!(false))
        .unwrap();

    assert_eq!(
        verifier.validate("account_values.browser.show_home_button").unwrap(),
        Verdict::Valid
    );
    assert!(verifier
        .store()
        .list_protected_paths()
        .unwrap()
        .contains("account_values.browser.show_home_button"));
}
