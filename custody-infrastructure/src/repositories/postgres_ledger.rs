use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use custody_domain::{
    sort_most_overdue_first, ActorId, CommitResult, DwellPolicy, GeoPoint, NewShipmentStage,
    OverdueShipment, Shipment, ShipmentId, ShipmentLedger, ShipmentStage, ShipmentStatus,
    TriggerKind,
};

const SHIPMENT_COLUMNS: &str = "id, generator_company_id, transporter_company_id, \
recycler_company_id, driver_id, waste_type_id, quantity, unit, description, status, \
departed_at, arrived_at, sorting_started_at, sorting_completed_at, recycling_started_at, \
recycling_completed_at, completed_at, location_latitude, location_longitude, \
location_captured_at, disposal_report, recycling_report, final_report, created_at, updated_at";

const STAGE_COLUMNS: &str = "id, shipment_id, stage, recorded_at, actor_id, trigger_kind, notes, \
latitude, longitude, location_captured_at";

const STAGE_ANCHOR_EXPR: &str = "CASE status \
WHEN 'created' THEN created_at \
WHEN 'in_transit' THEN departed_at \
WHEN 'delivered' THEN arrived_at \
WHEN 'sorting' THEN sorting_started_at \
WHEN 'recycling' THEN recycling_started_at \
ELSE completed_at END";

const SCHEMA: [&str; 4] = [
    r#"
CREATE TABLE IF NOT EXISTS shipments (
    id UUID PRIMARY KEY,
    generator_company_id TEXT NOT NULL,
    transporter_company_id TEXT,
    recycler_company_id TEXT,
    driver_id TEXT,
    waste_type_id TEXT NOT NULL,
    quantity DOUBLE PRECISION NOT NULL,
    unit TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL CHECK (status IN ('created', 'in_transit', 'delivered', 'sorting', 'recycling', 'completed')),
    departed_at TIMESTAMPTZ,
    arrived_at TIMESTAMPTZ,
    sorting_started_at TIMESTAMPTZ,
    sorting_completed_at TIMESTAMPTZ,
    recycling_started_at TIMESTAMPTZ,
    recycling_completed_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ,
    location_latitude DOUBLE PRECISION,
    location_longitude DOUBLE PRECISION,
    location_captured_at TIMESTAMPTZ,
    disposal_report TEXT,
    recycling_report TEXT,
    final_report TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
)
"#,
    r#"
CREATE INDEX IF NOT EXISTS shipments_open_status_idx
    ON shipments (status)
    WHERE status <> 'completed'
"#,
    r#"
CREATE TABLE IF NOT EXISTS shipment_stages (
    id BIGSERIAL PRIMARY KEY,
    shipment_id UUID NOT NULL REFERENCES shipments (id),
    stage TEXT NOT NULL,
    recorded_at TIMESTAMPTZ NOT NULL,
    actor_id TEXT NOT NULL,
    trigger_kind TEXT NOT NULL,
    notes TEXT,
    latitude DOUBLE PRECISION,
    longitude DOUBLE PRECISION,
    location_captured_at TIMESTAMPTZ
)
"#,
    r#"
CREATE INDEX IF NOT EXISTS shipment_stages_shipment_idx
    ON shipment_stages (shipment_id, id)
"#,
];

#[derive(Debug, FromRow)]
struct ShipmentRow {
    id: Uuid,
    generator_company_id: String,
    transporter_company_id: Option<String>,
    recycler_company_id: Option<String>,
    driver_id: Option<String>,
    waste_type_id: String,
    quantity: f64,
    unit: String,
    description: Option<String>,
    status: String,
    departed_at: Option<DateTime<Utc>>,
    arrived_at: Option<DateTime<Utc>>,
    sorting_started_at: Option<DateTime<Utc>>,
    sorting_completed_at: Option<DateTime<Utc>>,
    recycling_started_at: Option<DateTime<Utc>>,
    recycling_completed_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    location_latitude: Option<f64>,
    location_longitude: Option<f64>,
    location_captured_at: Option<DateTime<Utc>>,
    disposal_report: Option<String>,
    recycling_report: Option<String>,
    final_report: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ShipmentRow> for Shipment {
    type Error = anyhow::Error;

    fn try_from(row: ShipmentRow) -> Result<Self> {
        Ok(Shipment {
            id: ShipmentId(row.id),
            generator_company_id: row.generator_company_id,
            transporter_company_id: row.transporter_company_id,
            recycler_company_id: row.recycler_company_id,
            driver_id: row.driver_id,
            waste_type_id: row.waste_type_id,
            quantity: row.quantity,
            unit: row.unit,
            description: row.description,
            status: row.status.parse()?,
            departed_at: row.departed_at,
            arrived_at: row.arrived_at,
            sorting_started_at: row.sorting_started_at,
            sorting_completed_at: row.sorting_completed_at,
            recycling_started_at: row.recycling_started_at,
            recycling_completed_at: row.recycling_completed_at,
            completed_at: row.completed_at,
            current_location: geo_point(
                row.location_latitude,
                row.location_longitude,
                row.location_captured_at,
            ),
            disposal_report: row.disposal_report,
            recycling_report: row.recycling_report,
            final_report: row.final_report,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct StageRow {
    id: i64,
    shipment_id: Uuid,
    stage: String,
    recorded_at: DateTime<Utc>,
    actor_id: String,
    trigger_kind: String,
    notes: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    location_captured_at: Option<DateTime<Utc>>,
}

impl TryFrom<StageRow> for ShipmentStage {
    type Error = anyhow::Error;

    fn try_from(row: StageRow) -> Result<Self> {
        Ok(ShipmentStage {
            id: row.id,
            shipment_id: ShipmentId(row.shipment_id),
            stage: row.stage.parse()?,
            recorded_at: row.recorded_at,
            actor_id: ActorId(row.actor_id),
            trigger: TriggerKind::from(row.trigger_kind.as_str()),
            notes: row.notes,
            location: geo_point(row.latitude, row.longitude, row.location_captured_at),
        })
    }
}

fn geo_point(
    latitude: Option<f64>,
    longitude: Option<f64>,
    captured_at: Option<DateTime<Utc>>,
) -> Option<GeoPoint> {
    Some(GeoPoint {
        latitude: latitude?,
        longitude: longitude?,
        captured_at: captured_at?,
    })
}

/// Ledger backed by Postgres. Each transition runs in one transaction that
/// locks the shipment row, re-checks the status and writes both tables.
#[derive(Clone)]
pub struct PostgresShipmentLedger {
    pool: PgPool,
}

impl PostgresShipmentLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }
}

async fn insert_stage(
    tx: &mut Transaction<'_, Postgres>,
    stage: &NewShipmentStage,
) -> Result<i64> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO shipment_stages \
         (shipment_id, stage, recorded_at, actor_id, trigger_kind, notes, latitude, longitude, location_captured_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
    )
    .bind(stage.shipment_id.0)
    .bind(stage.stage.as_str())
    .bind(stage.recorded_at)
    .bind(stage.actor_id.as_str())
    .bind(stage.trigger.as_str())
    .bind(stage.notes.as_deref())
    .bind(stage.location.map(|point| point.latitude))
    .bind(stage.location.map(|point| point.longitude))
    .bind(stage.location.map(|point| point.captured_at))
    .fetch_one(&mut **tx)
    .await?;
    Ok(id)
}

#[async_trait]
impl ShipmentLedger for PostgresShipmentLedger {
    async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
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
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO shipments \
             (id, generator_company_id, transporter_company_id, recycler_company_id, driver_id, \
              waste_type_id, quantity, unit, description, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(shipment.id.0)
        .bind(&shipment.generator_company_id)
        .bind(shipment.transporter_company_id.as_deref())
        .bind(shipment.recycler_company_id.as_deref())
        .bind(shipment.driver_id.as_deref())
        .bind(&shipment.waste_type_id)
        .bind(shipment.quantity)
        .bind(&shipment.unit)
        .bind(shipment.description.as_deref())
        .bind(shipment.status.as_str())
        .bind(shipment.created_at)
        .bind(shipment.updated_at)
        .execute(&mut *tx)
        .await?;
        let id = insert_stage(&mut tx, &initial).await?;
        tx.commit().await?;
        Ok(initial.with_id(id))
    }

    async fn find_shipment(&self, id: &ShipmentId) -> Result<Option<Shipment>> {
        let query = format!("SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE id = $1");
        let row = sqlx::query_as::<_, ShipmentRow>(&query)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Shipment::try_from).transpose()
    }

    async fn list_stages(&self, id: &ShipmentId) -> Result<Vec<ShipmentStage>> {
        let query = format!(
            "SELECT {STAGE_COLUMNS} FROM shipment_stages WHERE shipment_id = $1 ORDER BY id ASC"
        );
        let rows = sqlx::query_as::<_, StageRow>(&query)
            .bind(id.0)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(ShipmentStage::try_from).collect()
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
        let mut tx = self.pool.begin().await?;
        let locked: Option<(String,)> =
            sqlx::query_as("SELECT status FROM shipments WHERE id = $1 FOR UPDATE")
                .bind(projection.id.0)
                .fetch_optional(&mut *tx)
                .await?;
        let (status,) = locked.ok_or_else(|| anyhow!("shipment {} not found", projection.id))?;
        let current: ShipmentStatus = status.parse()?;
        if current != expected {
            tx.rollback().await?;
            return Ok(CommitResult::Conflict { current });
        }

        let location = projection.current_location;
        let updated = sqlx::query(
            "UPDATE shipments SET \
             status = $2, departed_at = $3, arrived_at = $4, sorting_started_at = $5, \
             sorting_completed_at = $6, recycling_started_at = $7, recycling_completed_at = $8, \
             completed_at = $9, location_latitude = $10, location_longitude = $11, \
             location_captured_at = $12, disposal_report = $13, recycling_report = $14, \
             final_report = $15, updated_at = $16 \
             WHERE id = $1 AND status = $17",
        )
        .bind(projection.id.0)
        .bind(projection.status.as_str())
        .bind(projection.departed_at)
        .bind(projection.arrived_at)
        .bind(projection.sorting_started_at)
        .bind(projection.sorting_completed_at)
        .bind(projection.recycling_started_at)
        .bind(projection.recycling_completed_at)
        .bind(projection.completed_at)
        .bind(location.map(|point| point.latitude))
        .bind(location.map(|point| point.longitude))
        .bind(location.map(|point| point.captured_at))
        .bind(projection.disposal_report.as_deref())
        .bind(projection.recycling_report.as_deref())
        .bind(projection.final_report.as_deref())
        .bind(projection.updated_at)
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(CommitResult::Conflict { current });
        }

        let id = insert_stage(&mut tx, &stage).await?;
        tx.commit().await?;
        Ok(CommitResult::Committed(stage.with_id(id)))
    }

    async fn find_overdue(
        &self,
        now: DateTime<Utc>,
        policy: &DwellPolicy,
        limit: usize,
    ) -> Result<Vec<OverdueShipment>> {
        let thresholds: Vec<_> = policy.thresholds().collect();
        if thresholds.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE status <> 'completed' AND ("
        ));
        for (index, (stage, max_dwell)) in thresholds.iter().enumerate() {
            if index > 0 {
                builder.push(" OR ");
            }
            builder
                .push("(status = ")
                .push_bind(stage.as_str())
                .push(" AND ")
                .push(anchor_column(*stage))
                .push(" < ")
                .push_bind(now - *max_dwell)
                .push(")");
        }
        builder
            .push(") ORDER BY ")
            .push(STAGE_ANCHOR_EXPR)
            .push(" ASC, id ASC LIMIT ")
            .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));

        let rows = builder
            .build_query_as::<ShipmentRow>()
            .fetch_all(&self.pool)
            .await?;
        let mut overdue = Vec::with_capacity(rows.len());
        for row in rows {
            let shipment = Shipment::try_from(row)?;
            if let Some(entry) = policy.evaluate(&shipment, now) {
                overdue.push(entry);
            }
        }
        sort_most_overdue_first(&mut overdue);
        Ok(overdue)
    }
}

fn anchor_column(stage: ShipmentStatus) -> &'static str {
    match stage {
        ShipmentStatus::Created => "created_at",
        ShipmentStatus::InTransit => "departed_at",
        ShipmentStatus::Delivered => "arrived_at",
        ShipmentStatus::Sorting => "sorting_started_at",
        ShipmentStatus::Recycling => "recycling_started_at",
        ShipmentStatus::Completed => "completed_at",
    }
}
