// Principal entity
// Who is asking, after credentials have been checked

use serde::{Deserialize, Serialize};

use crate::entities::TriggerKind;
use crate::value_objects::ActorId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "user_id", rename_all = "snake_case")]
pub enum Principal {
    /// The scheduler or any other holder of the pre-shared system secret.
    System,
    User(ActorId),
}

impl Principal {
    pub fn actor_id(&self) -> ActorId {
        match self {
            Principal::System => ActorId::system(),
            Principal::User(id) => id.clone(),
        }
    }

    pub fn trigger_kind(&self) -> TriggerKind {
        match self {
            Principal::System => TriggerKind::System,
            Principal::User(_) => TriggerKind::Human,
        }
    }
}

/// Outcome of checking a caller against a privileged entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Admit(Principal),
    Forbidden,
    Unauthorized,
}
