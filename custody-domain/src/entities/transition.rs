// Transition request/outcome entities

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entities::{Principal, Shipment, ShipmentStage};
use crate::value_objects::{GeoPoint, ShipmentId, ShipmentStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRequest {
    pub shipment_id: ShipmentId,
    pub target: ShipmentStatus,
    pub principal: Principal,
    pub notes: Option<String>,
    pub location: Option<GeoPoint>,
    pub report: Option<String>,
    /// Defaults to the invocation time.
    pub at: Option<DateTime<Utc>>,
}

impl TransitionRequest {
    pub fn new(shipment_id: ShipmentId, target: ShipmentStatus, principal: Principal) -> Self {
        Self {
            shipment_id,
            target,
            principal,
            notes: None,
            location: None,
            report: None,
            at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    Applied {
        shipment: Shipment,
        stage: ShipmentStage,
    },
    /// The shipment was already at the requested stage; nothing was written.
    AlreadyApplied { shipment: Shipment },
}

impl TransitionOutcome {
    pub fn shipment(&self) -> &Shipment {
        match self {
            TransitionOutcome::Applied { shipment, .. } => shipment,
            TransitionOutcome::AlreadyApplied { shipment } => shipment,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }
}
