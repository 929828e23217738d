//! Typed settings: defaults match the reference deployment and bad values are
//! rejected at load time rather than at the first tick.

use usync_config::{load_layered_yaml_from_strings, Cipher, SyncConfig};

#[test]
fn empty_config_yields_defaults() {
    let loaded = load_layered_yaml_from_strings(&["{}"]).unwrap();
    let cfg = loaded.settings().unwrap();
    assert_eq!(cfg, SyncConfig::default());
    assert_eq!(cfg.accounts.inbound_tag, "ssapi");
    assert_eq!(cfg.accounts.level, 0);
    assert_eq!(cfg.control_plane.port, 9085);
    assert_eq!(cfg.control_plane.cipher, Cipher::Aes128Gcm);
    assert_eq!(cfg.reconcile.interval_secs, 60);
    assert_eq!(cfg.reconcile.noise_floor_bytes, 100);
    assert!(cfg.reconcile.cold_start);
    assert_eq!(cfg.snapshot.path, "current_users.json");
    assert_eq!(cfg.daemon.status_socket_addr().unwrap(), None);
}

#[test]
fn cipher_names_parse() {
    let loaded =
        load_layered_yaml_from_strings(&["control_plane:\n  cipher: \"aes-256-gcm\"\n"]).unwrap();
    assert_eq!(loaded.settings().unwrap().control_plane.cipher, Cipher::Aes256Gcm);
}

#[test]
fn unknown_cipher_is_rejected() {
    let loaded =
        load_layered_yaml_from_strings(&["control_plane:\n  cipher: \"rc4-md5\"\n"]).unwrap();
    assert!(loaded.settings().is_err());
}

#[test]
fn zero_interval_is_rejected() {
    let loaded =
        load_layered_yaml_from_strings(&["reconcile:\n  interval_secs: 0\n"]).unwrap();
    let err = loaded.settings().unwrap_err();
    assert!(err.to_string().contains("interval_secs"));
}

#[test]
fn empty_inbound_tag_is_rejected() {
    let loaded = load_layered_yaml_from_strings(&["accounts:\n  inbound_tag: \"\"\n"]).unwrap();
    assert!(loaded.settings().is_err());
}

#[test]
fn malformed_status_addr_is_rejected() {
    let loaded =
        load_layered_yaml_from_strings(&["daemon:\n  status_addr: \"not-an-addr\"\n"]).unwrap();
    assert!(loaded.settings().is_err());
}
