//! Typed import settings: defaults, overrides, and fail-fast validation.

use std::time::Duration;

use lns_config::load_layered_yaml_from_strings;

#[test]
fn defaults_apply_when_section_absent() {
    let loaded = load_layered_yaml_from_strings(&["source: {}\n"]).unwrap();
    let cfg = loaded.import_config().unwrap();

    assert_eq!(cfg.batch_size, 100);
    assert_eq!(cfg.days_to_import, 30);
    assert_eq!(cfg.max_retry_attempts, 3);
    assert_eq!(cfg.retry_delay, Duration::from_secs(5));
    assert!(cfg.parallelism_enabled);
    assert_eq!(cfg.parallelism, 4);
    assert_eq!(cfg.overall_timeout, Duration::from_secs(3600));
}

#[test]
fn overrides_are_read() {
    let yaml = r#"
import:
  batch_size: 25
  days_to_import: 7
  max_retry_attempts: 5
  retry_delay_secs: 0
  parallelism_enabled: false
  parallelism: 2
  overall_timeout_secs: 120
"#;
    let cfg = load_layered_yaml_from_strings(&[yaml])
        .unwrap()
        .import_config()
        .unwrap();
    assert_eq!(cfg.batch_size, 25);
    assert_eq!(cfg.retry_delay, Duration::ZERO);
    assert!(!cfg.parallelism_enabled);
    assert_eq!(cfg.overall_timeout, Duration::from_secs(120));
}

#[test]
fn zero_or_negative_batch_size_is_invalid() {
    for bad in ["0", "-5"] {
        let yaml = format!("import:\n  batch_size: {bad}\n  parallelism: 1\n");
        let err = load_layered_yaml_from_strings(&[yaml.as_str()])
            .unwrap()
            .import_config()
            .unwrap_err();
        assert!(err.to_string().contains("batch_size"), "got: {err}");
    }
}

#[test]
fn parallelism_above_batch_size_is_invalid_only_when_enabled() {
    let enabled = "import:\n  batch_size: 2\n  parallelism: 4\n";
    let err = load_layered_yaml_from_strings(&[enabled])
        .unwrap()
        .import_config()
        .unwrap_err();
    assert!(err.to_string().contains("must not exceed batch_size"));

    let disabled = "import:\n  batch_size: 2\n  parallelism: 4\n  parallelism_enabled: false\n";
    load_layered_yaml_from_strings(&[disabled])
        .unwrap()
        .import_config()
        .expect("parallelism bound only applies when enabled");
}

#[test]
fn negative_retry_delay_is_invalid() {
    let yaml = "import:\n  retry_delay_secs: -1\n";
    let err = load_layered_yaml_from_strings(&[yaml])
        .unwrap()
        .import_config()
        .unwrap_err();
    assert!(err.to_string().contains("CONFIG_INVALID"));
}
