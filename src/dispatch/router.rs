//! Route table mapping request paths to handlers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::core::{
    ConcurrencyLimiter, SchedulerError, SchedulerHandle, ServiceContext, SessionRegistry,
};
use crate::dispatch::event::{DispatchEvent, DispatchJob};
use crate::dispatch::handler::RequestHandler;
use crate::runtime::Spawn;
use crate::util::serde::Role;

struct Route<R: Send + Sync + 'static> {
    path: String,
    handler: Arc<dyn RequestHandler<R>>,
    min_role: Role,
}

impl<R: Send + Sync + 'static> Clone for Route<R> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            handler: Arc::clone(&self.handler),
            min_role: self.min_role,
        }
    }
}

/// Accepts requests, checks access, and defers each one to a scheduled
/// [`DispatchEvent`].
///
/// Paths are matched case-insensitively. A path with no exact entry falls back
/// to the longest registered route it starts with. The fallback compares raw
/// characters, not path segments: a route at `/api` also serves `/apix`.
pub struct Dispatcher<R, S>
where
    R: Send + Sync + 'static,
{
    routes: RwLock<HashMap<String, Route<R>>>,
    scheduler: SchedulerHandle,
    sessions: Arc<SessionRegistry>,
    limiter: ConcurrencyLimiter,
    spawner: S,
    delay: Duration,
}

impl<R, S> Dispatcher<R, S>
where
    R: Send + Sync + 'static,
    S: Spawn + Clone + Send + 'static,
{
    /// Dispatcher wired to the context's scheduler, sessions and limiter.
    #[must_use]
    pub fn new(ctx: &ServiceContext, spawner: S) -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            scheduler: ctx.scheduler().clone(),
            sessions: Arc::clone(ctx.sessions()),
            limiter: ctx.limiter().clone(),
            spawner,
            delay: ctx.dispatch_delay(),
        }
    }

    /// Register `handler` at its own route with its own minimum role.
    ///
    /// Replaces any handler already at that route.
    pub fn register(&self, handler: Arc<dyn RequestHandler<R>>) {
        let path = handler.route().to_string();
        let min_role = handler.min_role();
        self.register_at(&path, min_role, handler);
    }

    /// Register `handler` at an explicit path and minimum role.
    pub fn register_at(&self, path: &str, min_role: Role, handler: Arc<dyn RequestHandler<R>>) {
        let key = path.to_lowercase();
        debug!(route = %key, ?min_role, "route registered");
        self.routes.write().insert(
            key.clone(),
            Route {
                path: key,
                handler,
                min_role,
            },
        );
    }

    /// Remove a route. Returns whether it existed.
    pub fn unregister(&self, path: &str) -> bool {
        self.routes.write().remove(&path.to_lowercase()).is_some()
    }

    /// Whether `role` may call the route registered exactly at `path`.
    ///
    /// Unknown paths are denied.
    #[must_use]
    pub fn can_access(&self, path: &str, role: Role) -> bool {
        self.routes
            .read()
            .get(&path.to_lowercase())
            .is_some_and(|route| role.satisfies(route.min_role))
    }

    /// Registered route that serves `path`, if any.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<String> {
        self.lookup(path).map(|route| route.path)
    }

    /// Number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    /// Whether no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }

    /// Accept `request` for `path` from a caller holding `role`.
    ///
    /// On success the request is queued and its handler runs after the
    /// configured delay.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::UnknownRoute`] when nothing serves `path`;
    /// [`SchedulerError::AccessDenied`] when `role` is below the route minimum.
    pub fn dispatch(&self, path: &str, role: Role, request: R) -> Result<(), SchedulerError> {
        let Some(route) = self.lookup(path) else {
            warn!(path, "no handler for route");
            return Err(SchedulerError::UnknownRoute(path.to_string()));
        };
        if !role.satisfies(route.min_role) {
            return Err(SchedulerError::AccessDenied {
                route: route.path,
                role,
            });
        }

        let job = DispatchJob {
            route: route.path,
            handler: route.handler,
            request,
            limiter: self.limiter.clone(),
            spawner: self.spawner.clone(),
        };
        self.scheduler
            .schedule::<DispatchEvent<R, S>>(self.delay)
            .load(job);
        Ok(())
    }

    /// Like [`Dispatcher::dispatch`], taking the role from a session.
    ///
    /// A missing, unknown or expired session is treated as [`Role::Guest`].
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub fn dispatch_for_session(
        &self,
        path: &str,
        session_id: Option<&str>,
        request: R,
    ) -> Result<(), SchedulerError> {
        let role = session_id
            .and_then(|id| self.sessions.lookup(id))
            .map_or(Role::Guest, |info| info.role);
        self.dispatch(path, role, request)
    }

    fn lookup(&self, path: &str) -> Option<Route<R>> {
        let key = path.to_lowercase();
        let routes = self.routes.read();
        if let Some(route) = routes.get(&key) {
            return Some(route.clone());
        }
        routes
            .iter()
            .filter(|(prefix, _)| key.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, route)| route.clone())
    }
}
