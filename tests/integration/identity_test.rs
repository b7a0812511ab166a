// Integration tests for IdentityResolver directory scans

use std::fs;
use tempfile::TempDir;
use vpnpulse::core::telemetry::{ClientIdentity, IdentityResolver};

fn write_conf(dir: &TempDir, name: &str, body: &str) {
    fs::write(dir.path().join(format!("{}.conf", name)), body).unwrap();
}

#[test]
fn test_distinct_artifacts_both_mapped() {
    let dir = TempDir::new().unwrap();
    write_conf(&dir, "phone", "[Interface]\nAddress = 10.6.0.2/24\n");
    write_conf(&dir, "laptop", "[Interface]\nAddress = 10.6.0.3/24\n");

    let map = IdentityResolver::new(dir.path()).resolve();

    assert_eq!(map.len(), 2);
    assert_eq!(map.name_for("10.6.0.2"), Some("phone"));
    assert_eq!(map.name_for("10.6.0.3"), Some("laptop"));
    assert_eq!(map.total_clients(), 2);
}

#[test]
fn test_invalid_artifacts_skipped_but_counted() {
    let dir = TempDir::new().unwrap();
    write_conf(&dir, "good", "Address = 10.6.0.2/24\n");
    write_conf(&dir, "v6only", "Address = fd11::5/64\n");
    write_conf(&dir, "noaddress", "[Interface]\nPrivateKey = abc\n");
    fs::write(dir.path().join("notes.txt"), "Address = 10.6.0.99/24\n").unwrap();

    let map = IdentityResolver::new(dir.path()).resolve();

    assert_eq!(map.len(), 1);
    assert_eq!(map.name_for("10.6.0.2"), Some("good"));
    assert_eq!(map.name_for("10.6.0.99"), None);
    assert_eq!(map.total_clients(), 3);
}

#[test]
fn test_duplicate_address_last_scanned_wins() {
    let dir = TempDir::new().unwrap();
    write_conf(&dir, "alpha", "Address = 10.6.0.7/24\n");
    write_conf(&dir, "bravo", "Address = 10.6.0.7/24\n");

    let map = IdentityResolver::new(dir.path()).resolve();

    assert_eq!(map.len(), 1);
    assert_eq!(map.name_for("10.6.0.7"), Some("bravo"));
}

#[test]
fn test_rescan_sees_new_artifacts() {
    let dir = TempDir::new().unwrap();
    let resolver = IdentityResolver::new(dir.path());
    assert!(resolver.resolve().is_empty());

    write_conf(&dir, "tablet", "Address: 10.6.0.4/32\n");
    assert_eq!(resolver.resolve().name_for("10.6.0.4"), Some("tablet"));
}

#[test]
fn test_absent_directory() {
    let dir = TempDir::new().unwrap();
    let map = IdentityResolver::new(dir.path().join("missing")).resolve();
    assert!(map.is_empty());
}

#[test]
fn test_identities_listed_from_scan() {
    let dir = TempDir::new().unwrap();
    write_conf(&dir, "phone", "Address = 10.6.0.2/24\n");
    write_conf(&dir, "laptop", "Address = 10.6.0.3/24, fd11::3/64\n");

    let mut identities: Vec<ClientIdentity> =
        IdentityResolver::new(dir.path()).resolve().identities().collect();
    identities.sort_by(|a, b| a.virtual_ip.cmp(&b.virtual_ip));

    assert_eq!(
        identities,
        vec![
            ClientIdentity {
                virtual_ip: "10.6.0.2".into(),
                name: "phone".into(),
            },
            ClientIdentity {
                virtual_ip: "10.6.0.3".into(),
                name: "laptop".into(),
            },
        ]
    );
}
