//! Tests for configuration validation

use std::collections::HashMap;
use std::time::Duration;

use prometheus_event_scheduler::config::{CoreConfig, LimiterSettings, SessionSettings};

#[test]
fn test_defaults_are_valid() {
    let cfg = CoreConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.scheduler.tick_interval(), Duration::from_millis(10));
    assert_eq!(cfg.scheduler.dispatch_delay(), Duration::from_millis(250));
    assert_eq!(cfg.scheduler.pool_reserve, 4);
    assert_eq!(cfg.limiter.max_concurrent, 20);
    assert_eq!(cfg.sessions.default_ttl(), Duration::from_secs(3600));
    assert_eq!(cfg.sessions.sweep_interval(), Duration::from_secs(600));
    assert_eq!(cfg.tasks.error_backoff(), Duration::from_secs(1));
}

#[test]
fn test_zero_limiter_rejected() {
    let cfg = CoreConfig {
        limiter: LimiterSettings { max_concurrent: 0 },
        ..CoreConfig::default()
    };
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("max_concurrent"));
}

#[test]
fn test_zero_sweep_interval_rejected() {
    let cfg = CoreConfig {
        sessions: SessionSettings {
            default_ttl_secs: 60,
            sweep_interval_secs: 0,
        },
        ..CoreConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_from_json_partial() {
    let json = r#"{
        "limiter": { "max_concurrent": 4 },
        "sessions": { "default_ttl_secs": 120 }
    }"#;

    let cfg = CoreConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.limiter.max_concurrent, 4);
    assert_eq!(cfg.sessions.default_ttl_secs, 120);
    assert_eq!(cfg.sessions.sweep_interval_secs, 600);
    assert_eq!(cfg.scheduler.tick_interval_ms, 10);
}

#[test]
fn test_from_json_invalid() {
    assert!(CoreConfig::from_json_str("{ not json").is_err());
    assert!(CoreConfig::from_json_str(r#"{"scheduler": {"tick_interval_ms": 0}}"#).is_err());
}

#[test]
fn test_apply_overrides() {
    let vars: HashMap<&str, &str> = [
        ("MAX_CONCURRENT", "8"),
        ("DISPATCH_DELAY_MS", " 50 "),
        ("SESSION_TTL_SECS", ""),
    ]
    .into_iter()
    .collect();

    let mut cfg = CoreConfig::default();
    cfg.apply_overrides(|key| vars.get(key).map(|v| (*v).to_string()))
        .unwrap();
    assert_eq!(cfg.limiter.max_concurrent, 8);
    assert_eq!(cfg.scheduler.dispatch_delay_ms, 50);
    assert_eq!(cfg.sessions.default_ttl_secs, 3600, "empty value ignored");
}

#[test]
fn test_apply_overrides_rejects_garbage() {
    let mut cfg = CoreConfig::default();
    let err = cfg
        .apply_overrides(|key| (key == "POOL_RESERVE").then(|| "many".to_string()))
        .unwrap_err();
    assert!(err.contains("EVENT_SCHEDULER_POOL_RESERVE"));
}
