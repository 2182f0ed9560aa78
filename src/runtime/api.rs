//! API-facing status and health models.

use serde::{Deserialize, Serialize};

use crate::core::{ManagedTask, ServiceContext, TaskLoop, TaskState, TickReport};
use crate::util::clock::now_ms;

/// State of one managed background task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusSnapshot {
    /// Task name.
    pub name: String,
    /// Lifecycle state.
    pub state: TaskState,
}

impl TaskStatusSnapshot {
    /// Capture the current state of `task`.
    pub fn of<L: TaskLoop>(task: &ManagedTask<L>) -> Self {
        Self {
            name: task.name().to_string(),
            state: task.state(),
        }
    }
}

/// Point-in-time view of a scheduling core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreStatus {
    /// Wall-clock capture time (ms since epoch).
    pub captured_at_ms: u128,
    /// Events waiting in the scheduler queue.
    pub pending_events: usize,
    /// Counters from the most recent tick.
    pub last_tick: TickReport,
    /// Stored sessions, including expired ones not yet swept.
    pub sessions: usize,
    /// Configured limiter capacity.
    pub limiter_capacity: usize,
    /// Limiter permits currently free.
    pub limiter_available: usize,
    /// Whether the limiter has been closed.
    pub limiter_closed: bool,
    /// Background task states.
    pub tasks: Vec<TaskStatusSnapshot>,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Tasks that are not running.
    pub stopped_tasks: Vec<String>,
}

/// Collect a status snapshot from `ctx` and the given task states.
#[must_use]
pub fn status(ctx: &ServiceContext, tasks: &[TaskStatusSnapshot]) -> CoreStatus {
    let limiter = ctx.limiter();
    CoreStatus {
        captured_at_ms: now_ms(),
        pending_events: ctx.scheduler().pending(),
        last_tick: ctx.scheduler().last_report(),
        sessions: ctx.sessions().len(),
        limiter_capacity: limiter.capacity(),
        limiter_available: limiter.available(),
        limiter_closed: limiter.is_closed(),
        tasks: tasks.to_vec(),
    }
}

/// Healthy when every task is running and the limiter still accepts work.
#[must_use]
pub fn health(status: &CoreStatus) -> Health {
    let stopped_tasks: Vec<String> = status
        .tasks
        .iter()
        .filter(|task| !matches!(task.state, TaskState::Starting | TaskState::Started))
        .map(|task| task.name.clone())
        .collect();
    Health {
        ok: stopped_tasks.is_empty() && !status.limiter_closed,
        stopped_tasks,
    }
}
