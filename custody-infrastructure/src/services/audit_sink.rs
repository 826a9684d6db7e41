use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clickhouse::{Client, Row};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, warn};

use custody_domain::ports::AuditSink;
use custody_domain::TransitionEvent;

use crate::utils::{sign_hmac_sha256, to_offset_datetime};

pub const SIGNATURE_HEADER: &str = "X-Custody-Signature";

/// Writes every transition to the structured log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn publish(&self, event: TransitionEvent) {
        info!(
            target: "custody::audit",
            stage_id = event.stage_id,
            shipment_id = %event.shipment_id,
            from = event.from.map(|status| status.as_str()).unwrap_or("-"),
            stage = %event.stage,
            actor = %event.actor_id,
            trigger = event.trigger.as_str(),
            recorded_at = %event.recorded_at,
            "transition recorded"
        );
    }
}

/// Hands each event to every wrapped sink.
#[derive(Default, Clone)]
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AuditSink for FanoutAuditSink {
    fn publish(&self, event: TransitionEvent) {
        for sink in &self.sinks {
            sink.publish(event.clone());
        }
    }
}

#[derive(Debug, Clone, Serialize, Row)]
pub struct TransitionEventRow {
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    pub recorded_at: OffsetDateTime,
    pub stage_id: i64,
    pub shipment_id: String,
    pub from_stage: String,
    pub stage: String,
    pub actor_id: String,
    pub trigger_kind: String,
    pub notes: String,
}

impl From<&TransitionEvent> for TransitionEventRow {
    fn from(event: &TransitionEvent) -> Self {
        Self {
            recorded_at: to_offset_datetime(event.recorded_at),
            stage_id: event.stage_id,
            shipment_id: event.shipment_id.to_string(),
            from_stage: event
                .from
                .map(|status| status.as_str().to_string())
                .unwrap_or_default(),
            stage: event.stage.as_str().to_string(),
            actor_id: event.actor_id.to_string(),
            trigger_kind: event.trigger.as_str().to_string(),
            notes: event.notes.clone().unwrap_or_default(),
        }
    }
}

/// Archives transitions into a ClickHouse table for reporting.
#[derive(Clone)]
pub struct ClickhouseAuditSink {
    client: Client,
    database: String,
}

impl ClickhouseAuditSink {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        let create_db = format!("CREATE DATABASE IF NOT EXISTS {}", self.database);
        self.client.query(&create_db).execute().await?;

        let create_events = r#"
CREATE TABLE IF NOT EXISTS shipment_transition_events (
    recorded_at DateTime64(3),
    stage_id Int64,
    shipment_id String,
    from_stage String,
    stage String,
    actor_id String,
    trigger_kind String,
    notes String
) ENGINE = MergeTree
PARTITION BY toYYYYMM(recorded_at)
ORDER BY (recorded_at, shipment_id, stage_id)
"#;
        self.client.query(create_events).execute().await?;
        Ok(())
    }

    pub async fn insert_events(&self, events: &[TransitionEvent]) -> Result<()> {
        let mut insert = self.client.insert("shipment_transition_events")?;
        for event in events {
            insert.write(&TransitionEventRow::from(event)).await?;
        }
        insert.end().await?;
        Ok(())
    }
}

impl AuditSink for ClickhouseAuditSink {
    fn publish(&self, event: TransitionEvent) {
        let sink = self.clone();
        tokio::spawn(async move {
            if let Err(err) = sink.insert_events(&[event]).await {
                warn!("clickhouse audit insert failed: {}", err);
            }
        });
    }
}

/// Posts each transition as JSON to an external endpoint. When a secret is
/// configured the body is signed with HMAC-SHA256.
#[derive(Clone)]
pub struct WebhookAuditSink {
    client: reqwest::Client,
    url: String,
    secret: Option<String>,
}

impl WebhookAuditSink {
    pub fn new(url: String, secret: Option<String>, timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds.max(3)))
            .build()?;
        Ok(Self {
            client,
            url,
            secret,
        })
    }

    pub async fn deliver(&self, event: &TransitionEvent) -> Result<()> {
        let body = serde_json::to_vec(event)?;
        let mut request = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(secret) = &self.secret {
            let signature = sign_hmac_sha256(secret, &body)?;
            request = request.header(SIGNATURE_HEADER, format!("sha256={signature}"));
        }
        request.body(body).send().await?.error_for_status()?;
        Ok(())
    }
}

impl AuditSink for WebhookAuditSink {
    fn publish(&self, event: TransitionEvent) {
        let sink = self.clone();
        tokio::spawn(async move {
            if let Err(err) = sink.deliver(&event).await {
                warn!(
                    shipment_id = %event.shipment_id,
                    stage = %event.stage,
                    "audit webhook failed: {}",
                    err
                );
            }
        });
    }
}
