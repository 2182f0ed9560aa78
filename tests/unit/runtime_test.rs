//! Tests for the tokio spawner and status models

use std::sync::Arc;

use prometheus_event_scheduler::core::{ServiceContext, TaskState};
use prometheus_event_scheduler::runtime::{
    Spawn, TaskStatusSnapshot, TokioSpawner, health, status,
};
use prometheus_event_scheduler::util::{ManualClock, Role};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[tokio::test]
async fn test_tokio_spawner_current() {
    assert!(TokioSpawner::current().is_ok());
}

#[test]
fn test_tokio_spawner_current_outside_runtime() {
    assert!(TokioSpawner::current().is_err());
}

#[test]
fn test_status_and_health() {
    let ctx = ServiceContext::with_clock(Arc::new(ManualClock::new()));
    ctx.sessions().issue("u1", Role::User, None);

    let running = [TaskStatusSnapshot {
        name: "scheduler-pump".into(),
        state: TaskState::Started,
    }];
    let snapshot = status(&ctx, &running);
    assert_eq!(snapshot.sessions, 1);
    assert_eq!(snapshot.pending_events, 0);
    assert_eq!(snapshot.limiter_capacity, 20);
    assert!(health(&snapshot).ok);

    let stopped = [TaskStatusSnapshot {
        name: "session-sweeper".into(),
        state: TaskState::Stopped,
    }];
    let report = health(&status(&ctx, &stopped));
    assert!(!report.ok);
    assert_eq!(report.stopped_tasks, vec!["session-sweeper".to_string()]);
}

#[test]
fn test_status_serializes() {
    let ctx = ServiceContext::with_clock(Arc::new(ManualClock::new()));
    let json = serde_json::to_value(status(&ctx, &[])).unwrap();
    assert_eq!(json["pending_events"], 0);
    assert_eq!(json["last_tick"]["executed"], 0);
}
