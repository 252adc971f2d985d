use lns_config::{load_layered_yaml_from_strings, report_unused_keys, ConfigMode, UnusedKeyPolicy};

/// Validates:
/// 1) Unused keys are reported in WARN mode without error.
/// 2) Unused keys fail in FAIL mode.
/// 3) The `/daemon` section is consumed only in daemon mode.
/// 4) Unused pointers are sorted.

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let yaml = r#"
import:
  batch_size: 50
  legacy_backup_path: "/var/backups"
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(
        ConfigMode::Oneshot,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )
    .expect("warn mode must not error");

    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/import/legacy_backup_path".to_string()]
    );
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let yaml = r#"
import:
  batch_size: 50
mystery:
  knob: 1
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let err = report_unused_keys(ConfigMode::Daemon, &loaded.config_json, UnusedKeyPolicy::Fail)
        .unwrap_err();
    assert!(format!("{err:?}").contains("CONFIG_UNUSED_KEYS"));
}

#[test]
fn daemon_section_is_consumed_only_by_daemon_mode() {
    let yaml = r#"
daemon:
  schedule_interval_secs: 600
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();

    let daemon = report_unused_keys(
        ConfigMode::Daemon,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )
    .unwrap();
    assert!(daemon.is_clean());

    let oneshot = report_unused_keys(
        ConfigMode::Oneshot,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )
    .unwrap();
    assert_eq!(
        oneshot.unused_leaf_pointers,
        vec!["/daemon/schedule_interval_secs".to_string()]
    );
}

#[test]
fn deterministic_unused_pointer_ordering() {
    let yaml = r#"
unused:
  b: 2
  a: 1
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(
        ConfigMode::Oneshot,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )
    .unwrap();
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/unused/a".to_string(), "/unused/b".to_string()]
    );
}
