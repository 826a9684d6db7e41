// Runtime configuration handed from infrastructure to the application

use serde::{Deserialize, Serialize};

use crate::services::DwellHours;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub bind_addr: String,
    pub system_secret: Option<String>,
    pub admin_user_ids: Vec<String>,
    pub identity_url: Option<String>,
    pub identity_api_key: Option<String>,
    pub audit_webhook_url: Option<String>,
    pub audit_webhook_secret: Option<String>,
    pub dwell_hours: DwellHours,
    pub dwell_policy_path: Option<String>,
    pub auto_approve_batch_limit: usize,
    pub auto_approve_concurrency: usize,
    pub auto_approve_deadline_seconds: u64,
    pub auto_approve_interval_minutes: u64,
    pub max_body_bytes: u64,
    pub request_timeout_seconds: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3240".to_string(),
            system_secret: None,
            admin_user_ids: Vec::new(),
            identity_url: None,
            identity_api_key: None,
            audit_webhook_url: None,
            audit_webhook_secret: None,
            dwell_hours: DwellHours::default(),
            dwell_policy_path: None,
            auto_approve_batch_limit: 500,
            auto_approve_concurrency: 4,
            auto_approve_deadline_seconds: 50,
            auto_approve_interval_minutes: 0,
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub ledger_backend: LedgerBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub clickhouse_url: Option<String>,
    pub clickhouse_database: String,
    pub clickhouse_user: Option<String>,
    pub clickhouse_password: Option<String>,
}
