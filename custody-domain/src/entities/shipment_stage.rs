// Shipment stage entity
// Append-only record of one transition

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{ActorId, GeoPoint, ShipmentId, ShipmentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Human,
    System,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Human => "human",
            TriggerKind::System => "system",
        }
    }
}

impl From<&str> for TriggerKind {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "system" => TriggerKind::System,
            _ => TriggerKind::Human,
        }
    }
}

/// A stage record before the ledger has assigned it an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewShipmentStage {
    pub shipment_id: ShipmentId,
    pub stage: ShipmentStatus,
    pub recorded_at: DateTime<Utc>,
    pub actor_id: ActorId,
    pub trigger: TriggerKind,
    pub notes: Option<String>,
    pub location: Option<GeoPoint>,
}

impl NewShipmentStage {
    pub fn with_id(self, id: i64) -> ShipmentStage {
        ShipmentStage {
            id,
            shipment_id: self.shipment_id,
            stage: self.stage,
            recorded_at: self.recorded_at,
            actor_id: self.actor_id,
            trigger: self.trigger,
            notes: self.notes,
            location: self.location,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentStage {
    pub id: i64,
    pub shipment_id: ShipmentId,
    pub stage: ShipmentStatus,
    pub recorded_at: DateTime<Utc>,
    pub actor_id: ActorId,
    pub trigger: TriggerKind,
    pub notes: Option<String>,
    pub location: Option<GeoPoint>,
}

/// Record handed to the audit sink after a transition commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub stage_id: i64,
    pub shipment_id: ShipmentId,
    pub from: Option<ShipmentStatus>,
    pub stage: ShipmentStatus,
    pub actor_id: ActorId,
    pub trigger: TriggerKind,
    pub recorded_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl TransitionEvent {
    pub fn from_stage(stage: &ShipmentStage, from: Option<ShipmentStatus>) -> Self {
        Self {
            stage_id: stage.id,
            shipment_id: stage.shipment_id,
            from,
            stage: stage.stage,
            actor_id: stage.actor_id.clone(),
            trigger: stage.trigger,
            recorded_at: stage.recorded_at,
            notes: stage.notes.clone(),
        }
    }
}
