//! Expiring session store consulted on every authenticated request.
//!
//! Lookups vastly outnumber writes (login, logout, sweep), so the map sits
//! behind a reader/writer lock. Expiry is re-checked on every read; the
//! periodic [`SessionSweeper`] only reclaims memory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::core::AppResult;
use crate::core::managed_task::TaskLoop;
use crate::util::clock::Clock;
use crate::util::serde::{Role, SessionId, SubjectId};

/// Default session lifetime.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Default pause between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone)]
struct SessionEntry {
    subject: SubjectId,
    role: Role,
    expire_at: Duration,
}

impl SessionEntry {
    fn is_live(&self, now: Duration) -> bool {
        now <= self.expire_at
    }
}

/// What a live session resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Subject owning the session.
    pub subject: SubjectId,
    /// Role granted to the session.
    pub role: Role,
}

/// Concurrent TTL map from session id to subject and role.
pub struct SessionRegistry {
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
}

impl SessionRegistry {
    /// Create a registry using [`DEFAULT_SESSION_TTL`].
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_default_ttl(clock, DEFAULT_SESSION_TTL)
    }

    /// Create a registry with a custom default TTL.
    #[must_use]
    pub fn with_default_ttl(clock: Arc<dyn Clock>, default_ttl: Duration) -> Self {
        Self {
            clock,
            default_ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace a session. `ttl` falls back to the registry default.
    pub fn store(
        &self,
        session_id: impl Into<SessionId>,
        subject: impl Into<SubjectId>,
        role: Role,
        ttl: Option<Duration>,
    ) {
        let entry = SessionEntry {
            subject: subject.into(),
            role,
            expire_at: self
                .clock
                .now()
                .saturating_add(ttl.unwrap_or(self.default_ttl)),
        };
        self.sessions.write().insert(session_id.into(), entry);
    }

    /// Create a session under a fresh random id and return the id.
    pub fn issue(
        &self,
        subject: impl Into<SubjectId>,
        role: Role,
        ttl: Option<Duration>,
    ) -> SessionId {
        let session_id = Uuid::new_v4().to_string();
        self.store(session_id.clone(), subject, role, ttl);
        session_id
    }

    /// Resolve a live session.
    ///
    /// An expired entry is removed on the spot and reported as absent.
    pub fn lookup(&self, session_id: &str) -> Option<SessionInfo> {
        let now = self.clock.now();
        {
            let sessions = self.sessions.read();
            match sessions.get(session_id) {
                None => return None,
                Some(entry) if entry.is_live(now) => {
                    return Some(SessionInfo {
                        subject: entry.subject.clone(),
                        role: entry.role,
                    });
                }
                Some(_) => {}
            }
        }

        // Re-check under the write lock: the entry may have been refreshed
        // between dropping the read lock and acquiring this one.
        let mut sessions = self.sessions.write();
        if sessions
            .get(session_id)
            .is_some_and(|entry| !entry.is_live(self.clock.now()))
        {
            sessions.remove(session_id);
        }
        None
    }

    /// Whether `session_id` resolves to a live session.
    pub fn is_valid(&self, session_id: &str) -> bool {
        self.lookup(session_id).is_some()
    }

    /// Resolve a live session whose role is at least `min_role`.
    pub fn authorize(&self, session_id: &str, min_role: Role) -> Option<SessionInfo> {
        self.lookup(session_id)
            .filter(|info| info.role.satisfies(min_role))
    }

    /// Remove one session. Returns whether it existed.
    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().remove(session_id).is_some()
    }

    /// Remove every session of `subject`. Returns how many were removed.
    pub fn remove_all(&self, subject: &str) -> usize {
        self.remove_matching(|_, entry| entry.subject == subject)
    }

    /// Remove every session of `subject` except `keep`.
    pub fn remove_all_except(&self, subject: &str, keep: &str) -> usize {
        self.remove_matching(|id, entry| entry.subject == subject && id != keep)
    }

    /// Remove every entry whose expiry has passed. Returns how many went.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        self.remove_matching(|_, entry| entry.expire_at <= now)
    }

    /// Remove every session.
    pub fn clear(&self) {
        self.sessions.write().clear();
    }

    /// Physically stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    fn remove_matching<F>(&self, predicate: F) -> usize
    where
        F: Fn(&str, &SessionEntry) -> bool,
    {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|id, entry| !predicate(id, entry));
        before - sessions.len()
    }
}

/// Background loop calling [`SessionRegistry::sweep`] periodically.
pub struct SessionSweeper {
    registry: Arc<SessionRegistry>,
    interval: Duration,
    error_backoff: Duration,
}

impl SessionSweeper {
    /// Sweep `registry` every `interval`.
    #[must_use]
    pub const fn new(registry: Arc<SessionRegistry>, interval: Duration) -> Self {
        Self {
            registry,
            interval,
            error_backoff: crate::core::managed_task::DEFAULT_ERROR_BACKOFF,
        }
    }

    /// Override the pause after a failed sweep.
    #[must_use]
    pub const fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }
}

#[async_trait]
impl TaskLoop for SessionSweeper {
    fn name(&self) -> &str {
        "session-sweeper"
    }

    async fn iterate(&self, _token: &CancellationToken) -> AppResult<()> {
        let removed = self.registry.sweep();
        if removed > 0 {
            debug!("swept {} expired sessions", removed);
        }
        Ok(())
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn error_backoff(&self) -> Duration {
        self.error_backoff
    }
}
