//! Request handler contract.

use async_trait::async_trait;
use tracing::error;

use crate::core::AppResult;
use crate::util::serde::Role;

/// Work performed for one route.
///
/// `R` is the caller's request type; it usually carries the connection or
/// session the handler replies through.
#[async_trait]
pub trait RequestHandler<R>: Send + Sync + 'static
where
    R: Send + Sync + 'static,
{
    /// Path this handler answers by default, matched case-insensitively.
    fn route(&self) -> &str;

    /// Lowest role allowed to call the route when registered by default.
    fn min_role(&self) -> Role {
        Role::User
    }

    /// Serve `request`.
    ///
    /// # Errors
    ///
    /// Any error is passed to [`RequestHandler::fail`]; it never reaches the
    /// scheduler.
    async fn handle(&self, request: &R) -> AppResult<()>;

    /// Report a failed [`RequestHandler::handle`] back to the caller, typically
    /// as an internal-error response.
    async fn fail(&self, request: &R, err: &anyhow::Error) {
        let _ = request;
        error!(route = self.route(), "request failed: {:#}", err);
    }
}
