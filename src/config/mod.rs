//! Configuration models for the scheduler, limiter, sessions and tasks.

pub mod settings;

pub use settings::{
    CoreConfig, ENV_PREFIX, LimiterSettings, SchedulerSettings, SessionSettings, TaskSettings,
};
