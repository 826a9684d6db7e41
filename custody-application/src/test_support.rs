use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use custody_domain::ports::{AuditSink, IdentityProvider, RoleDirectory, ShipmentLedger};
use custody_domain::{
    ActorId, CommitResult, DwellHours, DwellPolicy, NewShipment, NewShipmentStage,
    OverdueShipment, Principal, RuntimeConfig, Shipment, ShipmentId, ShipmentStage,
    ShipmentStatus, TransitionEvent, TriggerKind,
};
use custody_infrastructure::{MemoryShipmentLedger, StaticRoleDirectory};

use crate::commands::shipment_commands::register_shipment;
use crate::{AppState, Metrics};

pub const SYSTEM_SECRET: &str = "cron-secret";

#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<TransitionEvent>>,
}

impl RecordingAuditSink {
    pub fn events(&self) -> Vec<TransitionEvent> {
        self.events.lock().expect("lock").clone()
    }
}

impl AuditSink for RecordingAuditSink {
    fn publish(&self, event: TransitionEvent) {
        self.events.lock().expect("lock").push(event);
    }
}

/// Maps fixed tokens to users. The token `broken` simulates an outage.
#[derive(Default)]
pub struct StubIdentity {
    sessions: HashMap<String, ActorId>,
}

impl StubIdentity {
    pub fn with_session(mut self, token: &str, user: &str) -> Self {
        self.sessions.insert(token.to_string(), ActorId::new(user));
        self
    }
}

#[async_trait]
impl IdentityProvider for StubIdentity {
    async fn verify_session(&self, token: &str) -> anyhow::Result<Option<ActorId>> {
        if token == "broken" {
            return Err(anyhow!("identity service unreachable"));
        }
        Ok(self.sessions.get(token).cloned())
    }
}

/// In-memory ledger with switches for the failure and race cases.
#[derive(Default)]
pub struct ScriptedLedger {
    inner: MemoryShipmentLedger,
    race_next: AtomicBool,
    fail_overdue: AtomicBool,
    failing: Mutex<HashSet<ShipmentId>>,
    commit_delay: Mutex<Option<StdDuration>>,
    overdue_delay: Mutex<Option<StdDuration>>,
}

impl ScriptedLedger {
    /// The next commit is preceded by an operator applying the same stage.
    pub fn arm_race(&self) {
        self.race_next.store(true, Ordering::SeqCst);
    }

    pub fn fail_commits_for(&self, id: ShipmentId) {
        self.failing.lock().expect("lock").insert(id);
    }

    pub fn fail_overdue_queries(&self) {
        self.fail_overdue.store(true, Ordering::SeqCst);
    }

    pub fn delay_commits(&self, delay: StdDuration) {
        *self.commit_delay.lock().expect("lock") = Some(delay);
    }

    pub fn delay_overdue_queries(&self, delay: StdDuration) {
        *self.overdue_delay.lock().expect("lock") = Some(delay);
    }

    pub async fn stage_count(&self) -> usize {
        self.inner.stage_count().await
    }

    pub async fn shipment_count(&self) -> usize {
        self.inner.shipment_count().await
    }

    pub async fn status_of(&self, id: &ShipmentId) -> ShipmentStatus {
        self.inner
            .find_shipment(id)
            .await
            .expect("find")
            .expect("exists")
            .status
    }
}

#[async_trait]
impl ShipmentLedger for ScriptedLedger {
    async fn ensure_schema(&self) -> anyhow::Result<()> {
        self.inner.ensure_schema().await
    }

    async fn ping(&self) -> anyhow::Result<()> {
        self.inner.ping().await
    }

    async fn insert_shipment(
        &self,
        shipment: &Shipment,
        initial: NewShipmentStage,
    ) -> anyhow::Result<ShipmentStage> {
        self.inner.insert_shipment(shipment, initial).await
    }

    async fn find_shipment(&self, id: &ShipmentId) -> anyhow::Result<Option<Shipment>> {
        self.inner.find_shipment(id).await
    }

    async fn list_stages(&self, id: &ShipmentId) -> anyhow::Result<Vec<ShipmentStage>> {
        self.inner.list_stages(id).await
    }

    async fn commit_transition(
        &self,
        expected: ShipmentStatus,
        projection: &Shipment,
        stage: NewShipmentStage,
    ) -> anyhow::Result<CommitResult> {
        let delay = *self.commit_delay.lock().expect("lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().expect("lock").contains(&projection.id) {
            bail!("simulated storage failure");
        }
        if self.race_next.swap(false, Ordering::SeqCst) {
            let mut human = stage.clone();
            human.actor_id = ActorId::new("operator-7");
            human.trigger = TriggerKind::Human;
            self.inner
                .commit_transition(expected, projection, human)
                .await?;
        }
        self.inner.commit_transition(expected, projection, stage).await
    }

    async fn find_overdue(
        &self,
        now: DateTime<Utc>,
        policy: &DwellPolicy,
        limit: usize,
    ) -> anyhow::Result<Vec<OverdueShipment>> {
        let delay = *self.overdue_delay.lock().expect("lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_overdue.load(Ordering::SeqCst) {
            bail!("simulated query failure");
        }
        self.inner.find_overdue(now, policy, limit).await
    }
}

pub struct Harness {
    pub state: AppState,
    pub ledger: Arc<ScriptedLedger>,
    pub audit: Arc<RecordingAuditSink>,
}

pub fn harness() -> Harness {
    let identity = StubIdentity::default()
        .with_session("admin-token", "admin-1")
        .with_session("user-token", "user-1");
    harness_with(Arc::new(identity), Arc::new(StaticRoleDirectory::new(["admin-1"])))
}

pub fn harness_with(identity: Arc<dyn IdentityProvider>, roles: Arc<dyn RoleDirectory>) -> Harness {
    let ledger = Arc::new(ScriptedLedger::default());
    let audit = Arc::new(RecordingAuditSink::default());
    let config = RuntimeConfig {
        system_secret: Some(SYSTEM_SECRET.to_string()),
        ..RuntimeConfig::default()
    };
    let state = AppState {
        dwell_policy: Arc::new(DwellPolicy::from_hours(&DwellHours::default())),
        config,
        ledger: ledger.clone(),
        audit_sink: audit.clone(),
        identity,
        roles,
        metrics: Arc::new(Metrics::default()),
    };
    Harness {
        state,
        ledger,
        audit,
    }
}

pub fn draft() -> NewShipment {
    NewShipment {
        generator_company_id: "gen-1".to_string(),
        transporter_company_id: Some("trans-1".to_string()),
        recycler_company_id: Some("rec-1".to_string()),
        driver_id: Some("driver-1".to_string()),
        waste_type_id: "plastics".to_string(),
        quantity: 4.0,
        unit: "t".to_string(),
        description: None,
    }
}

pub fn user(id: &str) -> Principal {
    Principal::User(ActorId::new(id))
}

pub async fn registered(state: &AppState, at: DateTime<Utc>) -> Shipment {
    register_shipment(state, draft(), &user("gen-user"), at)
        .await
        .expect("register")
}
