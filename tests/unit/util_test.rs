//! Tests for utility functions

use std::time::Duration;

use prometheus_event_scheduler::util::{Clock, ManualClock, Role, init_tracing};

#[test]
fn test_role_ordering() {
    assert!(Role::Admin > Role::Moderator);
    assert!(Role::Moderator > Role::User);
    assert!(Role::User > Role::Guest);
    assert_eq!(Role::default(), Role::Guest);
}

#[test]
fn test_role_satisfies() {
    assert!(Role::Admin.satisfies(Role::User));
    assert!(Role::User.satisfies(Role::User));
    assert!(!Role::Guest.satisfies(Role::User));
}

#[test]
fn test_role_serde_snake_case() {
    let json = serde_json::to_string(&Role::Moderator).unwrap();
    assert_eq!(json, "\"moderator\"");
    let role: Role = serde_json::from_str("\"admin\"").unwrap();
    assert_eq!(role, Role::Admin);
}

#[test]
fn test_manual_clock_through_trait_object() {
    let clock = ManualClock::new();
    let dyn_clock: &dyn Clock = &clock;
    clock.advance(Duration::from_secs(2));
    assert_eq!(dyn_clock.now(), Duration::from_secs(2));
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
}
