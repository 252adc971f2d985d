/// Which binary is reading the config. The daemon reads everything the
/// one-shot CLI reads plus the `/daemon` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    Oneshot,
    Daemon,
}

impl ConfigMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigMode::Oneshot => "ONESHOT",
            ConfigMode::Daemon => "DAEMON",
        }
    }
}

/// Registry of consumed JSON-pointer prefixes per mode.
///
/// Must reflect what the code ACTUALLY reads:
/// - `ImportConfig::from_config_json`   /import/*
/// - `SourceConfig::from_config_json`   /source/*
/// - `resolve_source_token`             /source/token_env
/// - `DaemonConfig::from_config_json`   /daemon/* (daemon only)
pub fn consumed_pointers_for_mode(mode: ConfigMode) -> &'static [&'static str] {
    match mode {
        ConfigMode::Oneshot => ONESHOT,
        ConfigMode::Daemon => DAEMON,
    }
}

static ONESHOT: &[&str] = &[
    "/import/batch_size",
    "/import/days_to_import",
    "/import/max_retry_attempts",
    "/import/retry_delay_secs",
    "/import/parallelism_enabled",
    "/import/parallelism",
    "/import/overall_timeout_secs",
    "/source",
];

static DAEMON: &[&str] = &[
    "/import/batch_size",
    "/import/days_to_import",
    "/import/max_retry_attempts",
    "/import/retry_delay_secs",
    "/import/parallelism_enabled",
    "/import/parallelism",
    "/import/overall_timeout_secs",
    "/source",
    "/daemon",
];
