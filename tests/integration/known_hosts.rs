//! Integration test: known-hosts lifecycle.
//!
//! Walks a store through the full sequence a connection layer drives:
//! 1. Lookups on an empty store
//! 2. First-use saves
//! 3. Lookups of present and absent endpoints
//! 4. Certificate change on an existing endpoint (overwrite)
//! 5. Removal, including removal of an already-absent endpoint

use rdp_known_hosts::{compare, compare_ex, CertificateData, CertificateStore, TrustStatus};

const PEM1: &str = include_str!("../fixtures/gts-root-r1.pem");
const PEM2: &str = include_str!("../fixtures/gts-root-r2.pem");
const PEM3: &str = include_str!("../fixtures/gts-root-r3.pem");
const PEM4: &str = include_str!("../fixtures/gts-root-r4.pem");

fn data(host: &str, port: u16, pem: &str) -> CertificateData {
    CertificateData::from_pem(host, port, pem.as_bytes()).expect("fixture should parse")
}

/// `compare` against whatever is stored for `data`'s endpoint.
fn stored_matches(store: &CertificateStore, data: &CertificateData) -> bool {
    match store.load(data.host(), data.port()).expect("load should not error") {
        Some(stored) => compare(data, &stored),
        None => false,
    }
}

/// `compare_ex` against whatever is stored for `data`'s endpoint.
fn stored_matches_ex(store: &CertificateStore, data: &CertificateData) -> bool {
    match store.load(data.host(), data.port()).expect("load should not error") {
        Some(stored) => compare_ex(data, &stored),
        None => false,
    }
}

#[test]
fn known_hosts_full_lifecycle() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CertificateStore::new(tmp.path().join("config"));

    let data1 = data("somehost", 1234, PEM1);
    let data2 = data("otherhost", 4321, PEM2);
    let data3 = data("otherhost4", 444, PEM3);
    let data4 = data("otherhost", 4321, PEM4);

    // ── Step 1: Empty store ─────────────────────────────────────────────
    for d in [&data1, &data2, &data3] {
        assert!(!stored_matches(&store, d));
        assert!(!stored_matches_ex(&store, d));
    }

    // ── Step 2: First saves ─────────────────────────────────────────────
    store.save(&data1).expect("save data1");
    store.save(&data2).expect("save data2");

    // Absent key in a non-empty store.
    assert!(!stored_matches(&store, &data3));
    assert!(!stored_matches_ex(&store, &data3));

    store.save(&data3).expect("save data3");

    // ── Step 3: Everything present ──────────────────────────────────────
    for d in [&data1, &data2, &data3] {
        assert!(stored_matches(&store, d), "{}:{} should match", d.host(), d.port());
        assert!(stored_matches_ex(&store, d), "{}:{} should match exactly", d.host(), d.port());
    }

    // ── Step 4: Modify an existing entry ────────────────────────────────
    store.save(&data4).expect("save data4");

    assert!(stored_matches(&store, &data4));
    assert!(stored_matches_ex(&store, &data4));

    let loaded = store.load("otherhost", 4321).unwrap().unwrap();
    assert_eq!(loaded.subject(), data4.subject());
    assert_eq!(loaded.issuer(), data4.issuer());
    assert_eq!(loaded.fingerprint(), data4.fingerprint());

    // The original certificate for that endpoint is no longer valid.
    assert!(!stored_matches(&store, &data2));
    assert!(!stored_matches_ex(&store, &data2));

    // ── Step 5: Removal ─────────────────────────────────────────────────
    store.remove(&data3).expect("remove data3");
    store.remove(&data3).expect("removing an absent entry should succeed");

    assert!(stored_matches(&store, &data1));
    assert!(stored_matches_ex(&store, &data1));
    assert!(stored_matches(&store, &data4));
    assert!(stored_matches_ex(&store, &data4));

    assert!(store.load("otherhost4", 444).unwrap().is_none());
    assert!(!stored_matches(&store, &data3));
    assert!(!stored_matches_ex(&store, &data3));
}

#[test]
fn known_hosts_never_saved_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CertificateStore::new(tmp.path());
    store.save(&data("somehost", 1234, PEM1)).unwrap();

    for (host, port) in [("somehost", 1), ("nohost", 1234), ("", 0), ("somehost ", 1234)] {
        assert!(store.load(host, port).unwrap().is_none(), "{host:?}:{port}");
    }
}

#[test]
fn known_hosts_tofu_decision_flow() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CertificateStore::new(tmp.path());

    let first = data("rdp.example", 3389, PEM3);
    assert_eq!(store.contains(&first).unwrap(), TrustStatus::Unknown);
    store.save(&first).unwrap();

    // Same certificate on reconnect.
    let again = data("rdp.example", 3389, PEM3);
    assert_eq!(store.contains(&again).unwrap(), TrustStatus::Trusted);

    // Certificate changed: the stored one is reported for the prompt.
    let changed = data("rdp.example", 3389, PEM4);
    match store.contains(&changed).unwrap() {
        TrustStatus::Mismatch(stored) => {
            assert_eq!(stored.fingerprint(), first.fingerprint());
            assert_eq!(stored.pem(), first.pem());
        }
        other => panic!("expected mismatch, got {other:?}"),
    }

    // Same certificate on another port is a different endpoint.
    let other_port = data("rdp.example", 3390, PEM3);
    assert_eq!(store.contains(&other_port).unwrap(), TrustStatus::Unknown);
}

#[test]
fn known_hosts_table_is_human_readable() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CertificateStore::new(tmp.path());
    let d = data("somehost", 1234, PEM1);
    store.save(&d).unwrap();

    let text = std::fs::read_to_string(store.table_path()).unwrap();
    let fields: Vec<&str> = text.trim_end().split('\t').collect();
    assert_eq!(fields.len(), 5);
    assert_eq!(fields[0], "somehost");
    assert_eq!(fields[1], "1234");
    assert_eq!(fields[2], d.fingerprint());
    assert!(text.ends_with('\n'));
    assert!(!text.contains("BEGIN CERTIFICATE"));

    let side_file = std::fs::read_to_string(store.cert_path(&d)).unwrap();
    assert_eq!(side_file, PEM1);
}

#[test]
fn known_hosts_two_handles_share_state() {
    let tmp = tempfile::tempdir().unwrap();
    let writer = CertificateStore::new(tmp.path());
    let reader = CertificateStore::new(tmp.path());

    writer.save(&data("a", 1, PEM3)).unwrap();
    assert!(reader.load("a", 1).unwrap().is_some());

    writer.save(&data("a", 1, PEM4)).unwrap();
    let seen = reader.load("a", 1).unwrap().unwrap();
    assert!(compare_ex(&data("a", 1, PEM4), &seen));

    writer.remove_key("a", 1).unwrap();
    assert!(reader.load("a", 1).unwrap().is_none());
}
