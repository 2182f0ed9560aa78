//! Tests for builder modules

use std::sync::Arc;
use std::time::Duration;

use prometheus_event_scheduler::builders::{build_core, build_core_with_clock};
use prometheus_event_scheduler::config::{CoreConfig, LimiterSettings};
use prometheus_event_scheduler::core::{SchedulerError, TaskState};
use prometheus_event_scheduler::runtime::TokioSpawner;
use prometheus_event_scheduler::util::{ManualClock, Role};

#[tokio::test]
async fn test_build_core_applies_config() {
    let cfg = CoreConfig::from_json_str(
        r#"{"limiter": {"max_concurrent": 3}, "scheduler": {"dispatch_delay_ms": 40}}"#,
    )
    .unwrap();
    let core = build_core(&cfg, TokioSpawner::current().unwrap()).unwrap();

    assert_eq!(core.context().limiter().capacity(), 3);
    assert_eq!(core.context().dispatch_delay(), Duration::from_millis(40));
    assert_eq!(core.pump().name(), "scheduler-pump");
    assert_eq!(core.sweeper().name(), "session-sweeper");
    assert_eq!(core.pump().state(), TaskState::Stopped);
}

#[tokio::test]
async fn test_build_core_rejects_invalid_config() {
    let cfg = CoreConfig {
        limiter: LimiterSettings { max_concurrent: 0 },
        ..CoreConfig::default()
    };
    let result = build_core(&cfg, TokioSpawner::current().unwrap());
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_start_stop_and_health() {
    let core = build_core_with_clock(
        &CoreConfig::default(),
        TokioSpawner::current().unwrap(),
        Arc::new(ManualClock::new()),
    )
    .unwrap();
    assert!(!core.health().ok);

    core.start().unwrap();
    assert!(core.health().ok);
    assert_eq!(core.status().tasks.len(), 2);

    core.stop().await;
    let health = core.health();
    assert!(!health.ok);
    assert_eq!(health.stopped_tasks.len(), 2);
}

#[tokio::test]
async fn test_huge_session_ttl_from_env_does_not_panic() {
    let mut cfg = CoreConfig::default();
    cfg.apply_overrides(|key| (key == "SESSION_TTL_SECS").then(|| u64::MAX.to_string()))
        .unwrap();
    let clock = Arc::new(ManualClock::new());
    clock.advance(Duration::from_secs(1));
    let core = build_core_with_clock(&cfg, TokioSpawner::current().unwrap(), clock.clone())
        .unwrap();

    let session = core.context().sessions().issue("u1", Role::User, None);
    clock.advance(Duration::from_secs(3_600 * 24 * 365));
    assert!(core.context().sessions().is_valid(&session));
}
