//! Command handler modules for lns-cli.
//!
//! Shared utilities used by multiple command paths live here.

pub mod import;

use anyhow::Result;
use lns_config::{report_unused_keys, ConfigMode, LoadedConfig, UnusedKeyPolicy};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load layered config and warn (stderr) about keys nothing reads.
pub fn load_config(config_paths: &[String]) -> Result<LoadedConfig> {
    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = lns_config::load_layered_yaml(&path_refs)?;

    let report = report_unused_keys(ConfigMode::Oneshot, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        eprintln!(
            "WARN: CONFIG_UNUSED_KEYS mode={} unused_leaf_keys={}",
            report.mode,
            report.unused_leaf_pointers.len()
        );
        for p in report.unused_leaf_pointers.iter().take(50) {
            eprintln!("  unused={}", p);
        }
    }
    Ok(loaded)
}
