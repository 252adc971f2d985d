//! Config hash stability.
//!
//! GREEN when:
//! - the same inputs hash identically,
//! - key order inside a document does not change the hash,
//! - a changed value changes the hash,
//! - overlays override base values before hashing.

use lns_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
import:
  batch_size: 100
  parallelism: 4
source:
  base_url: "http://legacy.internal:8080"
  token_env: "LNS_SOURCE_TOKEN"
"#;

const BASE_YAML_REORDERED: &str = r#"
source:
  token_env: "LNS_SOURCE_TOKEN"
  base_url: "http://legacy.internal:8080"
import:
  parallelism: 4
  batch_size: 100
"#;

const OVERLAY_YAML: &str = r#"
import:
  parallelism: 8
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn key_order_does_not_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash, "canonicalization must sort keys");
}

#[test]
fn overlay_changes_value_and_hash() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let layered = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_ne!(base.config_hash, layered.config_hash);
    assert_eq!(layered.config_json["import"]["parallelism"], 8);
    // Sibling keys from the base survive the overlay.
    assert_eq!(layered.config_json["import"]["batch_size"], 100);
}

#[test]
fn hash_is_lowercase_hex_sha256() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash.len(), 64);
    assert!(a
        .config_hash
        .chars()
        .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}
