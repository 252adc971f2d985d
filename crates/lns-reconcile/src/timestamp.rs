//! Legacy timestamp parsing.
//!
//! The source renders local times as `yyyy-MM-dd HH:mm:ss`, sometimes followed
//! by a three-letter zone abbreviation (`CDT`, `EST`, ...). The abbreviation is
//! dropped, not interpreted.

use chrono::NaiveDateTime;

/// chrono pattern for `yyyy-MM-dd HH:mm:ss`.
pub const SOURCE_TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a source timestamp. `None` for absent, blank, or malformed input.
pub fn parse_source_timestamp(raw: Option<&str>) -> Option<NaiveDateTime> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(strip_zone_suffix(trimmed), SOURCE_TS_FORMAT).ok()
}

/// A timestamp after the fallback policy has been applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedTimestamp {
    pub value: NaiveDateTime,
    /// `true` when `raw` could not be parsed and `now` was substituted.
    pub fell_back: bool,
}

/// Parse `raw`, substituting `now` when it cannot be parsed.
///
/// The substitution can make a stale record look newest. It is kept on
/// purpose and surfaced through `fell_back` so callers can log and count it.
pub fn resolve_timestamp(raw: Option<&str>, now: NaiveDateTime) -> ResolvedTimestamp {
    match parse_source_timestamp(raw) {
        Some(value) => ResolvedTimestamp {
            value,
            fell_back: false,
        },
        None => ResolvedTimestamp {
            value: now,
            fell_back: true,
        },
    }
}

/// Remove a trailing ` XYZ` (space + exactly three ASCII uppercase letters).
fn strip_zone_suffix(s: &str) -> &str {
    let bytes = s.as_bytes();
    let n = bytes.len();
    if n >= 4 && bytes[n - 4] == b' ' && bytes[n - 3..].iter().all(u8::is_ascii_uppercase) {
        &s[..n - 4]
    } else {
        s
    }
}
