use async_trait::async_trait;

use crate::entities::TransitionEvent;
use crate::value_objects::ActorId;

/// Downstream record of every committed transition. Publishing must not
/// block or fail the transition that produced the event.
pub trait AuditSink: Send + Sync {
    fn publish(&self, event: TransitionEvent);
}

/// Resolves a user session token to the user it belongs to.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` for an unknown, expired or malformed token. `Err` only when
    /// the provider itself could not be reached.
    async fn verify_session(&self, token: &str) -> anyhow::Result<Option<ActorId>>;
}

#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn is_admin(&self, user: &ActorId) -> anyhow::Result<bool>;
}
