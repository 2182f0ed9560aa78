//! Scheduler core configuration structures.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Prefix of environment variables read by [`CoreConfig::from_env`].
pub const ENV_PREFIX: &str = "EVENT_SCHEDULER_";

/// Scheduler and dispatch timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Pause between pump ticks in milliseconds.
    pub tick_interval_ms: u64,
    /// Free-list slots reserved per event type.
    pub pool_reserve: usize,
    /// Delay between accepting a request and running its handler, in milliseconds.
    pub dispatch_delay_ms: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 10,
            pool_reserve: 4,
            dispatch_delay_ms: 250,
        }
    }
}

impl SchedulerSettings {
    /// Validate scheduler settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Tick interval as a [`Duration`].
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Dispatch delay as a [`Duration`].
    #[must_use]
    pub const fn dispatch_delay(&self) -> Duration {
        Duration::from_millis(self.dispatch_delay_ms)
    }
}

/// Handler concurrency bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterSettings {
    /// Handler bodies allowed to run at once.
    pub max_concurrent: usize,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self { max_concurrent: 20 }
    }
}

impl LimiterSettings {
    /// Validate limiter settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent == 0 {
            return Err("max_concurrent must be greater than 0".into());
        }
        Ok(())
    }
}

/// Session lifetime and sweeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// TTL applied when a session is stored without one, in seconds.
    pub default_ttl_secs: u64,
    /// Pause between expiry sweeps, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_ttl_secs: 3600,
            sweep_interval_secs: 600,
        }
    }
}

impl SessionSettings {
    /// Validate session settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_ttl_secs == 0 {
            return Err("default_ttl_secs must be greater than 0".into());
        }
        if self.sweep_interval_secs == 0 {
            return Err("sweep_interval_secs must be greater than 0".into());
        }
        Ok(())
    }

    /// Default TTL as a [`Duration`].
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Sweep interval as a [`Duration`].
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Background task behaviour shared by all managed loops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    /// Pause after a failed loop iteration, in milliseconds.
    pub error_backoff_ms: u64,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            error_backoff_ms: 1000,
        }
    }
}

impl TaskSettings {
    /// Validate task settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.error_backoff_ms == 0 {
            return Err("error_backoff_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Error backoff as a [`Duration`].
    #[must_use]
    pub const fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

/// Root configuration of one scheduling core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Scheduler and dispatch timing.
    pub scheduler: SchedulerSettings,
    /// Handler concurrency bound.
    pub limiter: LimiterSettings,
    /// Session lifetime and sweeping.
    pub sessions: SessionSettings,
    /// Background task behaviour.
    pub tasks: TaskSettings,
}

impl CoreConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.scheduler
            .validate()
            .map_err(|e| format!("scheduler invalid: {e}"))?;
        self.limiter
            .validate()
            .map_err(|e| format!("limiter invalid: {e}"))?;
        self.sessions
            .validate()
            .map_err(|e| format!("sessions invalid: {e}"))?;
        self.tasks
            .validate()
            .map_err(|e| format!("tasks invalid: {e}"))?;
        Ok(())
    }

    /// Parse configuration from a JSON string and validate. Missing fields
    /// take their defaults.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by `EVENT_SCHEDULER_*` environment variables, after
    /// loading a `.env` file if one exists.
    ///
    /// Recognised keys: `TICK_INTERVAL_MS`, `POOL_RESERVE`, `DISPATCH_DELAY_MS`,
    /// `MAX_CONCURRENT`, `SESSION_TTL_SECS`, `SWEEP_INTERVAL_SECS`,
    /// `ERROR_BACKOFF_MS`.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();
        let mut cfg = Self::default();
        cfg.apply_overrides(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Override fields from `lookup`, which receives unprefixed keys such as
    /// `MAX_CONCURRENT`. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        override_field(&read, "TICK_INTERVAL_MS", &mut self.scheduler.tick_interval_ms)?;
        override_field(&read, "POOL_RESERVE", &mut self.scheduler.pool_reserve)?;
        override_field(&read, "DISPATCH_DELAY_MS", &mut self.scheduler.dispatch_delay_ms)?;
        override_field(&read, "MAX_CONCURRENT", &mut self.limiter.max_concurrent)?;
        override_field(&read, "SESSION_TTL_SECS", &mut self.sessions.default_ttl_secs)?;
        override_field(&read, "SWEEP_INTERVAL_SECS", &mut self.sessions.sweep_interval_secs)?;
        override_field(&read, "ERROR_BACKOFF_MS", &mut self.tasks.error_backoff_ms)?;
        Ok(())
    }
}

fn override_field<T, F>(read: &F, key: &str, slot: &mut T) -> Result<(), String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = read(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| format!("{ENV_PREFIX}{key}={raw}: {e}"))?;
    }
    Ok(())
}
