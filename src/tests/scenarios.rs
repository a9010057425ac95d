//! End-to-end scenarios (§8 Testable Properties): a handful of submit →
//! rotate → compress → retain → redact → recover round trips through the
//! real `Logger`, not mocked stand-ins.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use crate::config::Config;
use crate::destination::{Destination, RotationConfig};
use crate::error::ErrorCode;
use crate::filter::{FilterChain, PatternRule, SamplingStrategy};
use crate::logger::Logger;
use crate::record::{Level, Record};
use crate::redact::RedactionConfig;
use crate::retention::RetentionPolicy;
use crate::rotation::RotationTrigger;
use crate::value::FieldMap;

/// S1-equivalent: a steady stream of records below the size threshold never
/// rotates and lands, in order, in one file.
#[test]
fn steady_stream_below_threshold_never_rotates() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let rotation = RotationConfig {
        trigger: RotationTrigger::Size { max_bytes: 1_000_000 },
        ..RotationConfig::default()
    };
    let destination = Arc::new(Destination::file("primary", &path, rotation, None).unwrap());
    let filter_chain = FilterChain::new(Level::Trace, SamplingStrategy::None, Vec::new());
    let logger = Logger::new(Config::default(), filter_chain, vec![destination]);

    for i in 0..50 {
        logger.log(Level::Info, format!("line {i}"));
    }
    logger.close().unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<_> = contents.lines().collect();
    assert_eq!(lines.len(), 50);
    assert!(lines[0].contains("line 0"));
    assert!(lines[49].contains("line 49"));
}

/// S2-equivalent: crossing the size threshold rotates exactly once per
/// crossing and retention caps the number of rotated files kept around.
#[test]
fn rotation_fires_and_retention_caps_file_count() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let rotation = RotationConfig {
        trigger: RotationTrigger::Size { max_bytes: 20 },
        retention: RetentionPolicy { max_files: Some(2), max_age: None },
        ..RotationConfig::default()
    };
    let destination = Arc::new(Destination::file("primary", &path, rotation, None).unwrap());
    let filter_chain = FilterChain::new(Level::Trace, SamplingStrategy::None, Vec::new());
    let logger = Logger::new(Config::default(), filter_chain, vec![destination]);

    for i in 0..30 {
        logger.log(Level::Info, format!("record-{i:03}"));
    }
    logger.close().unwrap();

    let rotated_count = std::fs::read_dir(dir.path())
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_str()
                .unwrap()
                .starts_with("app.log.")
        })
        .count();
    assert!(rotated_count <= 2, "retention should cap rotated files at 2, got {rotated_count}");
}

/// S3-equivalent: a redacted field never appears in the written output even
/// when nested inside structured fields.
#[test]
fn redacted_fields_never_reach_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let destination = Arc::new(
        Destination::file("primary", &path, RotationConfig::default(), None).unwrap(),
    );
    let filter_chain = FilterChain::new(Level::Trace, SamplingStrategy::None, Vec::new());
    let mut config = Config::default();
    config.redaction = RedactionConfig::default();
    let logger = Logger::new(config, filter_chain, vec![destination]);

    let mut fields = FieldMap::new();
    fields.insert("password", "hunter2");
    fields.insert("user", "ada");
    logger.submit(Record::structured(Level::Info, "login", fields));
    logger.close().unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(!contents.contains("hunter2"));
    assert!(contents.contains("[REDACTED]"));
    assert!(contents.contains("ada"));
}

/// S4-equivalent: a drop pattern rule suppresses matching messages even
/// though the level gate and sampling would otherwise keep them.
#[test]
fn pattern_rule_suppresses_matching_messages() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let destination = Arc::new(
        Destination::file("primary", &path, RotationConfig::default(), None).unwrap(),
    );
    let filter_chain = FilterChain::new(
        Level::Trace,
        SamplingStrategy::None,
        vec![PatternRule::new("heartbeat", false, 1)],
    );
    let logger = Logger::new(Config::default(), filter_chain, vec![destination]);

    logger.log(Level::Info, "heartbeat ok");
    logger.log(Level::Info, "real event");
    logger.close().unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(!contents.contains("heartbeat"));
    assert!(contents.contains("real event"));
}

/// An override (`bypass_gates`) pattern rule rescues a record that the
/// level gate would otherwise have dropped, and its own rate limit caps
/// how many such rescues happen per second.
#[test]
fn bypassing_pattern_rule_rescues_below_gate_records_up_to_its_rate() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let destination = Arc::new(
        Destination::file("primary", &path, RotationConfig::default(), None).unwrap(),
    );
    let filter_chain = FilterChain::new(
        Level::Error,
        SamplingStrategy::None,
        vec![PatternRule::new("panic-recovered", true, 1)
            .bypassing_gates()
            .with_rate(1)],
    );
    let logger = Logger::new(Config::default(), filter_chain, vec![destination]);

    logger.log(Level::Debug, "panic-recovered: first");
    logger.log(Level::Debug, "panic-recovered: second");
    logger.log(Level::Debug, "ordinary debug line");
    logger.close().unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("panic-recovered: first"));
    assert!(!contents.contains("panic-recovered: second"));
    assert!(!contents.contains("ordinary debug line"));
}

/// S5-equivalent: a destination that's disabled mid-run stops receiving
/// writes without the logger failing the submission path.
#[test]
fn disabling_destination_stops_writes_without_breaking_submit() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let destination = Arc::new(
        Destination::file("primary", &path, RotationConfig::default(), None).unwrap(),
    );
    let filter_chain = FilterChain::new(Level::Trace, SamplingStrategy::None, Vec::new());
    let logger = Logger::new(Config::default(), filter_chain, vec![destination.clone()]);

    logger.log(Level::Info, "before disable");
    destination.set_enabled(false);
    logger.log(Level::Info, "after disable");
    logger.close().unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("before disable"));
    assert!(!contents.contains("after disable"));
}

/// S6-equivalent: shutdown drains whatever is still queued rather than
/// silently truncating the tail of the stream.
#[test]
fn shutdown_drains_the_queue_before_closing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let destination = Arc::new(
        Destination::file("primary", &path, RotationConfig::default(), None).unwrap(),
    );
    let filter_chain = FilterChain::new(Level::Trace, SamplingStrategy::None, Vec::new());
    let logger = Logger::new(Config::default(), filter_chain, vec![destination]);

    for i in 0..200 {
        logger.log(Level::Info, format!("burst-{i}"));
    }
    logger.shutdown(Duration::from_secs(5)).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("burst-0"));
    assert!(contents.contains("burst-199"));
}

/// Retryable classification feeds directly into whether a dispatcher would
/// keep retrying a failing destination versus giving up.
#[test]
fn channel_full_is_retryable_end_to_end_with_error_code() {
    assert!(ErrorCode::ChannelFull.is_retryable(None));
}
