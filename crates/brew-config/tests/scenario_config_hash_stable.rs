//! Config hash stability.
//!
//! GREEN when:
//! - the same inputs hash identically across calls,
//! - key order inside a YAML document does not change the hash,
//! - a changed value changes the hash.

use brew_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
server:
  addr: "0.0.0.0:5000"
  static_dir: "static"
store:
  backend: "postgres"
  timeout_ms: 5000
pricing:
  products:
    latte: "3.50"
    espresso: "3.00"
"#;

const BASE_YAML_REORDERED: &str = r#"
pricing:
  products:
    espresso: "3.00"
    latte: "3.50"
store:
  timeout_ms: 5000
  backend: "postgres"
server:
  static_dir: "static"
  addr: "0.0.0.0:5000"
"#;

const OVERLAY_YAML: &str = r#"
store:
  backend: "memory"
"#;

#[test]
fn same_input_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.config_hash.len(), 64, "sha256 hex digest");
}

#[test]
fn key_order_does_not_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn overlay_changes_hash_and_value() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let layered = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, layered.config_hash);

    let cfg = layered.typed().unwrap();
    assert_eq!(cfg.store.backend, brew_config::StoreBackend::Memory);
    // Untouched keys from the base layer survive the merge.
    assert_eq!(cfg.store.timeout_ms, 5000);
    assert_eq!(cfg.server.addr, "0.0.0.0:5000");
}

#[test]
fn empty_document_is_a_no_op_layer() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let with_empty = load_layered_yaml_from_strings(&[BASE_YAML, ""]).unwrap();
    assert_eq!(base.config_hash, with_empty.config_hash);
}
