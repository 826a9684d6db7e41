use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use custody_domain::{
    CommitResult, DwellPolicy, NewShipmentStage, OverdueShipment, Shipment, ShipmentId,
    ShipmentLedger, ShipmentStage, ShipmentStatus,
};

struct LedgerEntry {
    shipment: Shipment,
    stages: Vec<ShipmentStage>,
}

/// Process-local ledger. Each shipment sits behind its own mutex, so
/// transitions of one shipment serialize while different shipments proceed
/// independently.
#[derive(Default)]
pub struct MemoryShipmentLedger {
    entries: RwLock<HashMap<ShipmentId, Arc<Mutex<LedgerEntry>>>>,
    next_stage_id: AtomicI64,
}

impl MemoryShipmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_stage_id(&self) -> i64 {
        self.next_stage_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn entry(&self, id: &ShipmentId) -> Option<Arc<Mutex<LedgerEntry>>> {
        self.entries.read().await.get(id).cloned()
    }

    pub async fn shipment_count(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn stage_count(&self) -> usize {
        let entries: Vec<_> = self.entries.read().await.values().cloned().collect();
        let mut total = 0;
        for entry in entries {
            total += entry.lock().await.stages.len();
        }
        total
    }
}

#[async_trait]
impl ShipmentLedger for MemoryShipmentLedger {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_shipment(
        &self,
        shipment: &Shipment,
        initial: NewShipmentStage,
    ) -> Result<ShipmentStage> {
        if initial.shipment_id != shipment.id {
            bail!("initial stage belongs to another shipment");
        }
        let mut entries = self.entries.write().await;
        if entries.contains_key(&shipment.id) {
            bail!("shipment {} already exists", shipment.id);
        }
        let stage = initial.with_id(self.allocate_stage_id());
        entries.insert(
            shipment.id,
            Arc::new(Mutex::new(LedgerEntry {
                shipment: shipment.clone(),
                stages: vec![stage.clone()],
            })),
        );
        Ok(stage)
    }

    async fn find_shipment(&self, id: &ShipmentId) -> Result<Option<Shipment>> {
        let Some(entry) = self.entry(id).await else {
            return Ok(None);
        };
        let guard = entry.lock().await;
        Ok(Some(guard.shipment.clone()))
    }

    async fn list_stages(&self, id: &ShipmentId) -> Result<Vec<ShipmentStage>> {
        let Some(entry) = self.entry(id).await else {
            return Ok(Vec::new());
        };
        let guard = entry.lock().await;
        Ok(guard.stages.clone())
    }

    async fn commit_transition(
        &self,
        expected: ShipmentStatus,
        projection: &Shipment,
        stage: NewShipmentStage,
    ) -> Result<CommitResult> {
        if stage.shipment_id != projection.id {
            bail!("stage record belongs to another shipment");
        }
        let entry = self
            .entry(&projection.id)
            .await
            .ok_or_else(|| anyhow!("shipment {} not found", projection.id))?;
        let mut guard = entry.lock().await;
        if guard.shipment.status != expected {
            return Ok(CommitResult::Conflict {
                current: guard.shipment.status,
            });
        }
        let stage = stage.with_id(self.allocate_stage_id());
        guard.shipment = projection.clone();
        guard.stages.push(stage.clone());
        Ok(CommitResult::Committed(stage))
    }

    async fn find_overdue(
        &self,
        now: DateTime<Utc>,
        policy: &DwellPolicy,
        limit: usize,
    ) -> Result<Vec<OverdueShipment>> {
        let entries: Vec<_> = self.entries.read().await.values().cloned().collect();
        let mut snapshot = Vec::with_capacity(entries.len());
        for entry in entries {
            snapshot.push(entry.lock().await.shipment.clone());
        }
        Ok(policy.select_overdue(snapshot.iter(), now, limit))
    }
}
