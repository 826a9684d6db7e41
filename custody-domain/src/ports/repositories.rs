use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{NewShipmentStage, OverdueShipment, Shipment, ShipmentStage};
use crate::services::{DwellPolicy, DwellRule};
use crate::value_objects::{ShipmentId, ShipmentStatus};

/// Result of a guarded ledger write.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitResult {
    Committed(ShipmentStage),
    /// Another writer moved the shipment first; nothing was written.
    Conflict { current: ShipmentStatus },
}

/// Durable store for shipment projections and their append-only stage log.
///
/// `commit_transition` is the only way an existing shipment changes. It must
/// write the projection and the stage record atomically, and only if the
/// stored status still equals `expected`. Writers of the same shipment are
/// serialized by that check; writers of different shipments are not.
#[async_trait]
pub trait ShipmentLedger: Send + Sync {
    async fn ensure_schema(&self) -> anyhow::Result<()>;
    async fn ping(&self) -> anyhow::Result<()>;

    async fn insert_shipment(
        &self,
        shipment: &Shipment,
        initial: NewShipmentStage,
    ) -> anyhow::Result<ShipmentStage>;
    async fn find_shipment(&self, id: &ShipmentId) -> anyhow::Result<Option<Shipment>>;
    async fn list_stages(&self, id: &ShipmentId) -> anyhow::Result<Vec<ShipmentStage>>;

    async fn commit_transition(
        &self,
        expected: ShipmentStatus,
        projection: &Shipment,
        stage: NewShipmentStage,
    ) -> anyhow::Result<CommitResult>;

    /// Non-completed shipments that dwelt past their stage threshold, most
    /// overdue first, at most `limit`.
    async fn find_overdue(
        &self,
        now: DateTime<Utc>,
        policy: &DwellPolicy,
        limit: usize,
    ) -> anyhow::Result<Vec<OverdueShipment>>;
}

#[async_trait]
pub trait DwellPolicyRepository: Send + Sync {
    async fn load_dwell_rules(&self, path: &str) -> anyhow::Result<Vec<DwellRule>>;
}
