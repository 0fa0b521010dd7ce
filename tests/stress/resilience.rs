//! Resilience tests: corrupted tables, abandoned locks, failed commits.

use std::time::Duration;

use rdp_known_hosts::{CertificateData, CertificateStore, StoreError, StoreOptions};

const PEM3: &str = include_str!("../fixtures/gts-root-r3.pem");
const PEM4: &str = include_str!("../fixtures/gts-root-r4.pem");

#[test]
fn resilience_garbage_table_loads_as_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CertificateStore::new(tmp.path());

    let random_data: Vec<u8> = (0..1024).map(|i| (i * 17 + 31) as u8).collect();
    std::fs::write(store.table_path(), &random_data).unwrap();

    // Never an error, and never a panic.
    assert!(store.entries().unwrap().is_empty());
    assert!(store.load("somehost", 1234).unwrap().is_none());
}

#[test]
fn resilience_save_into_garbage_table_keeps_other_lines() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CertificateStore::new(tmp.path());
    std::fs::write(store.table_path(), "this is not a record\n").unwrap();

    let data = CertificateData::from_pem("h", 1, PEM3.as_bytes()).unwrap();
    store.save(&data).unwrap();

    let text = std::fs::read_to_string(store.table_path()).unwrap();
    assert!(text.starts_with("this is not a record\n"));
    assert!(store.load("h", 1).unwrap().is_some());
}

#[test]
fn resilience_truncated_last_line_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CertificateStore::new(tmp.path());

    let a = CertificateData::from_pem("a", 1, PEM3.as_bytes()).unwrap();
    let b = CertificateData::from_pem("b", 2, PEM4.as_bytes()).unwrap();
    store.save(&a).unwrap();
    store.save(&b).unwrap();

    // Simulate a foreign writer that was cut off mid-line.
    let text = std::fs::read_to_string(store.table_path()).unwrap();
    let last_start = text.trim_end().rfind('\n').unwrap() + 1;
    let fields: Vec<&str> = text[last_start..].split('\t').take(3).collect();
    let truncated = format!("{}{}", &text[..last_start], fields.join("\t"));
    std::fs::write(store.table_path(), truncated).unwrap();

    assert!(store.load("a", 1).unwrap().is_some());
    assert!(store.load("b", 2).unwrap().is_none());
    assert_eq!(store.read_table().unwrap().warnings().len(), 1);
}

#[test]
fn resilience_abandoned_lock_is_recovered() {
    let tmp = tempfile::tempdir().unwrap();
    let options = StoreOptions::default()
        .with_lock_timeout(Duration::from_secs(2))
        .with_lock_retry(Duration::from_millis(5))
        .with_stale_lock_after(Duration::from_millis(20));
    let store = CertificateStore::with_options(tmp.path(), options);

    // A writer crashed while holding the lock.
    std::fs::write(store.lock_path(), b"99999\n").unwrap();
    std::thread::sleep(Duration::from_millis(50));

    let data = CertificateData::from_pem("h", 1, PEM3.as_bytes()).unwrap();
    store.save(&data).expect("stale lock should be broken");
    assert!(!store.lock_path().exists());
}

#[test]
fn resilience_live_lock_surfaces_timeout() {
    let tmp = tempfile::tempdir().unwrap();
    let options = StoreOptions::default()
        .with_lock_timeout(Duration::from_millis(50))
        .with_lock_retry(Duration::from_millis(5))
        .with_stale_lock_after(Duration::from_secs(3600));
    let store = CertificateStore::with_options(tmp.path(), options);

    let committed = CertificateData::from_pem("h", 1, PEM3.as_bytes()).unwrap();
    store.save(&committed).unwrap();

    std::fs::write(store.lock_path(), b"12345\n").unwrap();

    let replacement = CertificateData::from_pem("h", 1, PEM4.as_bytes()).unwrap();
    match store.save(&replacement) {
        Err(StoreError::LockTimeout { path, .. }) => assert_eq!(path, store.lock_path()),
        other => panic!("expected LockTimeout, got {other:?}"),
    }

    // The foreign lock is left alone and the committed record is intact.
    assert!(store.lock_path().exists());
    let loaded = store.load("h", 1).unwrap().unwrap();
    assert_eq!(loaded.fingerprint(), committed.fingerprint());
}

#[test]
fn resilience_orphan_side_file_is_ignored() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CertificateStore::new(tmp.path());
    let committed = CertificateData::from_pem("h", 1, PEM3.as_bytes()).unwrap();
    store.save(&committed).unwrap();

    // A save that crashed after writing its side-file but before the table
    // commit leaves an orphan under a different name.
    let lost = CertificateData::from_pem("h", 1, PEM4.as_bytes()).unwrap();
    std::fs::write(store.cert_path(&lost), PEM4).unwrap();

    let loaded = store.load("h", 1).unwrap().unwrap();
    assert_eq!(loaded.pem(), Some(PEM3));
}

#[test]
fn resilience_roundtrip_100_times() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CertificateStore::new(tmp.path());

    for i in 0..100 {
        let pem = if i % 2 == 0 { PEM3 } else { PEM4 };
        let data = CertificateData::from_pem("roundtrip", 3389, pem.as_bytes()).unwrap();
        store.save(&data).unwrap();
        let loaded = store.load("roundtrip", 3389).unwrap().unwrap();
        assert_eq!(loaded, data, "Roundtrip {i} failed");
    }
    assert_eq!(store.entries().unwrap().len(), 1);
}
