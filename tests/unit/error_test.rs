//! Tests for error types

use prometheus_event_scheduler::core::{SchedulerError, is_cancellation};
use prometheus_event_scheduler::util::Role;

#[test]
fn test_empty_queue_error() {
    let err = SchedulerError::EmptyQueue;
    assert_eq!(format!("{}", err), "queue is empty");
}

#[test]
fn test_unknown_event_type_error() {
    let err = SchedulerError::UnknownEventType("app::Ping".to_string());
    assert_eq!(format!("{}", err), "no pool registered for event type app::Ping");
}

#[test]
fn test_access_denied_error() {
    let err = SchedulerError::AccessDenied {
        route: "/admin".to_string(),
        role: Role::User,
    };
    assert_eq!(format!("{}", err), "access denied to /admin for role User");
}

#[test]
fn test_backend_error() {
    let err = SchedulerError::Backend("connection failed".to_string());
    assert_eq!(format!("{}", err), "backend error: connection failed");
}

#[test]
fn test_cancellation_detected_through_anyhow() {
    let canceled: anyhow::Error = SchedulerError::OperationCanceled.into();
    assert!(is_cancellation(&canceled));

    let other: anyhow::Error = SchedulerError::LimiterClosed.into();
    assert!(!is_cancellation(&other));
    assert!(!is_cancellation(&anyhow::anyhow!("plain failure")));
}
