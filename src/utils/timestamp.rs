//! Rotation timestamp formatting/parsing (§4.4, §6): rotated files are
//! named `<base>.<YYYYMMDD-HHMMSS.mmm>`, lexicographically sortable by
//! construction, which `retention.rs` relies on to find the oldest file
//! without re-parsing every name as a date.

use chrono::{DateTime, Local, TimeZone, Utc};

const PATTERN: &str = "%Y%m%d-%H%M%S%.3f";

pub fn format_rotation_timestamp(at: DateTime<Utc>) -> String {
    at.format(PATTERN).to_string()
}

/// Parses a rotation suffix back into a timestamp. Returns `None` if the
/// string isn't one of ours (retention must skip unrelated files quietly).
pub fn parse_rotation_timestamp(suffix: &str) -> Option<DateTime<Utc>> {
    let naive = chrono::NaiveDateTime::parse_from_str(suffix, PATTERN).ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

pub fn rotated_file_name(base: &str, at: DateTime<Utc>) -> String {
    format!("{base}.{}", format_rotation_timestamp(at))
}

/// Local-time variant, used only for the human-facing debug sidecar
/// (`debug.rs`), never for the sortable rotation suffix itself.
pub fn format_local(at: DateTime<Utc>) -> String {
    let local: DateTime<Local> = at.into();
    local.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}
