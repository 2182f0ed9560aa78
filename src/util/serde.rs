//! Serializable identifiers and enums shared across modules.

use serde::{Deserialize, Serialize};

/// Opaque session identifier handed to clients.
pub type SessionId = String;

/// Identifier of the authenticated subject (user/account) owning a session.
pub type SubjectId = String;

/// Access role attached to a session.
///
/// Roles are totally ordered; an access check passes when `role >= required`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Unauthenticated caller.
    #[default]
    Guest,
    /// Regular signed-in user.
    User,
    /// Elevated user with moderation rights.
    Moderator,
    /// Full administrative access.
    Admin,
}

impl Role {
    /// Whether this role satisfies the `required` minimum.
    #[must_use]
    pub fn satisfies(self, required: Self) -> bool {
        self >= required
    }
}
