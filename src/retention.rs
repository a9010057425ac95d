//! Retention (§4.4, §9 "two retention implementations"): a single
//! `base`-parameterized sweep applies both the count and age limits,
//! resolving the Design Notes' open question — the teacher carried two
//! near-duplicate pruning functions (one in `backend/file.rs`'s
//! `SimpleRollingWriter`, one reachable only from a legacy path); this
//! crate never built a second path, so one function suffices.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::utils::timestamp::parse_rotation_timestamp;

#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionPolicy {
    pub max_files: Option<usize>,
    pub max_age: Option<Duration>,
}

/// Lists rotated siblings of `base` in `base`'s directory, deletes any that
/// violate `policy`, and returns the paths removed. Both compressed (`.gz`)
/// and uncompressed rotated files are eligible; files that don't parse as
/// one of ours are left alone.
pub fn enforce(base: &Path, policy: RetentionPolicy) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    if policy.max_files.is_none() && policy.max_age.is_none() {
        return removed;
    }

    let mut candidates = list_rotated_files(base);
    // Sort oldest-first by the parsed timestamp embedded in the file name,
    // which is also lexicographically sortable — parsing just gives us a
    // real `SystemTime` to compare against `max_age`.
    candidates.sort_by_key(|(_, ts)| *ts);

    if let Some(max_age) = policy.max_age {
        let now = SystemTime::now();
        candidates.retain(|(path, ts)| {
            let age = now.duration_since(*ts).unwrap_or(Duration::ZERO);
            if age > max_age {
                if fs::remove_file(path).is_ok() {
                    removed.push(path.clone());
                }
                false
            } else {
                true
            }
        });
    }

    if let Some(max_files) = policy.max_files {
        while candidates.len() > max_files {
            let (path, _) = candidates.remove(0);
            if fs::remove_file(&path).is_ok() {
                removed.push(path);
            }
        }
    }

    removed
}

fn list_rotated_files(base: &Path) -> Vec<(PathBuf, SystemTime)> {
    let dir = match base.parent() {
        Some(d) => d,
        None => return Vec::new(),
    };
    let base_name = match base.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return Vec::new(),
    };
    let prefix = format!("{base_name}.");

    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return Vec::new(),
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_str()?;
            let suffix = name.strip_prefix(&prefix)?;
            let suffix = suffix.strip_suffix(".gz").unwrap_or(suffix);
            let ts = parse_rotation_timestamp(suffix)?;
            Some((entry.path(), SystemTime::from(ts)))
        })
        .collect()
}
