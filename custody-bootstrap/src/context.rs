use std::sync::Arc;

use anyhow::{anyhow, Result};
use clickhouse::Client;
use tracing::{info, warn};

use custody_application::{AppState, Metrics};
use custody_domain::ports::{
    AuditSink, DwellPolicyRepository, IdentityProvider, RoleDirectory, ShipmentLedger,
};
use custody_domain::{format_duration, DbConfig, DwellPolicy, LedgerBackend, RuntimeConfig};
use custody_infrastructure::{
    select_role_directory, AppConfig, ClickhouseAuditSink, DisabledIdentityProvider,
    DwellPolicyFileRepository, FanoutAuditSink, HttpIdentityProvider, MemoryShipmentLedger,
    PostgresShipmentLedger, RoleSource, TracingAuditSink, WebhookAuditSink,
};

pub struct AppContext {
    pub state: AppState,
}

impl AppContext {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let runtime_config = config.to_runtime_config();
        let db_config = config.to_db_config();

        let ledger = build_ledger(&db_config).await?;
        ledger.ensure_schema().await?;

        let audit_sink = build_audit_sink(&runtime_config, &db_config).await?;
        let identity = build_identity(&runtime_config)?;
        let roles: Arc<dyn RoleDirectory> = match select_role_directory(&runtime_config)? {
            RoleSource::Static(directory) => Arc::new(directory),
            RoleSource::Http(directory) => Arc::new(directory),
        };
        let dwell_policy = load_dwell_policy(&runtime_config).await?;

        let state = AppState {
            config: runtime_config,
            ledger,
            audit_sink,
            identity,
            roles,
            dwell_policy: Arc::new(dwell_policy),
            metrics: Arc::new(Metrics::default()),
        };

        Ok(Self { state })
    }
}

async fn build_ledger(db_config: &DbConfig) -> Result<Arc<dyn ShipmentLedger>> {
    match db_config.ledger_backend {
        LedgerBackend::Memory => {
            warn!("using the in-memory ledger; shipments are lost on restart");
            Ok(Arc::new(MemoryShipmentLedger::new()))
        }
        LedgerBackend::Postgres => {
            let url = db_config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow!("database_url is required for the postgres ledger"))?;
            let ledger =
                PostgresShipmentLedger::connect(url, db_config.database_max_connections).await?;
            info!("postgres ledger connected");
            Ok(Arc::new(ledger))
        }
    }
}

async fn build_audit_sink(
    runtime_config: &RuntimeConfig,
    db_config: &DbConfig,
) -> Result<Arc<dyn AuditSink>> {
    let mut sinks: Vec<Arc<dyn AuditSink>> = vec![Arc::new(TracingAuditSink)];

    if let Some(url) = &db_config.clickhouse_url {
        let mut clickhouse = Client::default()
            .with_url(url)
            .with_database(&db_config.clickhouse_database);
        if let Some(user) = &db_config.clickhouse_user {
            clickhouse = clickhouse.with_user(user);
        }
        if let Some(password) = &db_config.clickhouse_password {
            clickhouse = clickhouse.with_password(password);
        }
        let sink = ClickhouseAuditSink::new(clickhouse, db_config.clickhouse_database.clone());
        sink.ensure_schema().await?;
        sinks.push(Arc::new(sink));
    }

    if let Some(url) = &runtime_config.audit_webhook_url {
        sinks.push(Arc::new(WebhookAuditSink::new(
            url.clone(),
            runtime_config.audit_webhook_secret.clone(),
            runtime_config.request_timeout_seconds,
        )?));
    }

    info!(sinks = sinks.len(), "audit sinks ready");
    Ok(Arc::new(FanoutAuditSink::new(sinks)))
}

fn build_identity(runtime_config: &RuntimeConfig) -> Result<Arc<dyn IdentityProvider>> {
    match &runtime_config.identity_url {
        Some(url) => Ok(Arc::new(HttpIdentityProvider::new(
            url.clone(),
            runtime_config.identity_api_key.clone(),
            runtime_config.request_timeout_seconds,
        )?)),
        None => {
            warn!("identity_url not set; only the system secret is accepted");
            Ok(Arc::new(DisabledIdentityProvider))
        }
    }
}

pub async fn load_dwell_policy(runtime_config: &RuntimeConfig) -> Result<DwellPolicy> {
    let mut policy = DwellPolicy::from_hours(&runtime_config.dwell_hours);
    if let Some(path) = &runtime_config.dwell_policy_path {
        let rules = DwellPolicyFileRepository::new().load_dwell_rules(path).await?;
        info!(path = %path, rules = rules.len(), "dwell policy overrides loaded");
        policy.apply_rules(&rules);
    }
    for (stage, max_dwell) in policy.thresholds() {
        info!(stage = %stage, max_dwell = %format_duration(max_dwell), "dwell threshold");
    }
    Ok(policy)
}
