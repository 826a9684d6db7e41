use std::env;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tokio::fs;
use tracing::warn;

use custody_domain::{normalize_optional_text, DbConfig, DwellHours, LedgerBackend, RuntimeConfig};

use crate::config::validation::{validate_database_url, validate_http_url, validate_positive};

pub const CONFIG_PATH_ENV: &str = "CUSTODY_CONFIG";

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    pub system_secret: Option<String>,
    pub admin_user_ids: Vec<String>,
    pub identity_url: Option<String>,
    pub identity_api_key: Option<String>,
    pub ledger_backend: LedgerBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub clickhouse_url: Option<String>,
    pub clickhouse_database: String,
    pub clickhouse_user: Option<String>,
    pub clickhouse_password: Option<String>,
    pub audit_webhook_url: Option<String>,
    pub audit_webhook_secret: Option<String>,
    pub dwell_policy_path: Option<String>,
    pub dwell: DwellHours,
    pub auto_approve_batch_limit: usize,
    pub auto_approve_concurrency: usize,
    pub auto_approve_deadline_seconds: u64,
    pub auto_approve_interval_minutes: u64,
    pub max_body_bytes: u64,
    pub request_timeout_seconds: u64,
    pub log_format: LogFormat,
    pub log_dir: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let runtime = RuntimeConfig::default();
        Self {
            bind_addr: runtime.bind_addr,
            system_secret: None,
            admin_user_ids: Vec::new(),
            identity_url: None,
            identity_api_key: None,
            ledger_backend: LedgerBackend::Memory,
            database_url: None,
            database_max_connections: 10,
            clickhouse_url: None,
            clickhouse_database: "custody".to_string(),
            clickhouse_user: None,
            clickhouse_password: None,
            audit_webhook_url: None,
            audit_webhook_secret: None,
            dwell_policy_path: None,
            dwell: DwellHours::default(),
            auto_approve_batch_limit: runtime.auto_approve_batch_limit,
            auto_approve_concurrency: runtime.auto_approve_concurrency,
            auto_approve_deadline_seconds: runtime.auto_approve_deadline_seconds,
            auto_approve_interval_minutes: runtime.auto_approve_interval_minutes,
            max_body_bytes: runtime.max_body_bytes,
            request_timeout_seconds: runtime.request_timeout_seconds,
            log_format: LogFormat::Text,
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Loads from `CUSTODY_CONFIG`, falling back to `./config.toml`.
    pub async fn load() -> Result<Self> {
        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "./config.toml".to_string());
        Self::load_from(&path).await
    }

    pub async fn load_from(path: &str) -> Result<Self> {
        let file_path = Path::new(path);
        let base_dir = file_path.parent();
        let mut config = if file_path.exists() {
            let content = fs::read_to_string(file_path).await?;
            Self::from_toml(&content)?
        } else {
            warn!("{} not found, using defaults", path);
            AppConfig::default()
        };
        config.apply_env_overrides();
        config.resolve_paths(base_dir);
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|err| anyhow!("invalid config: {}", err))
    }

    pub fn normalize(&mut self) {
        for value in [
            &mut self.system_secret,
            &mut self.identity_url,
            &mut self.identity_api_key,
            &mut self.database_url,
            &mut self.clickhouse_url,
            &mut self.clickhouse_user,
            &mut self.clickhouse_password,
            &mut self.audit_webhook_url,
            &mut self.audit_webhook_secret,
            &mut self.dwell_policy_path,
            &mut self.log_dir,
        ] {
            *value = normalize_optional_text(value.take());
        }
        self.admin_user_ids = normalize_id_list(std::mem::take(&mut self.admin_user_ids));
        if self.database_max_connections == 0 {
            self.database_max_connections = 1;
        }
    }

    fn resolve_paths(&mut self, base_dir: Option<&Path>) {
        let Some(base) = base_dir else {
            return;
        };
        if let Some(path) = &self.dwell_policy_path {
            self.dwell_policy_path = Some(resolve_path(base, path));
        }
        if let Some(dir) = &self.log_dir {
            self.log_dir = Some(resolve_path(base, dir));
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.bind_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|err| anyhow!("invalid bind_addr: {}", err))?;
        validate_positive("max_body_bytes", self.max_body_bytes)?;
        validate_positive("request_timeout_seconds", self.request_timeout_seconds)?;
        validate_positive("auto_approve_batch_limit", self.auto_approve_batch_limit as u64)?;
        validate_positive("auto_approve_concurrency", self.auto_approve_concurrency as u64)?;
        validate_positive(
            "auto_approve_deadline_seconds",
            self.auto_approve_deadline_seconds,
        )?;
        if let Some(url) = &self.identity_url {
            validate_http_url("identity_url", url)?;
        }
        if let Some(url) = &self.audit_webhook_url {
            validate_http_url("audit_webhook_url", url)?;
        }
        if let Some(url) = &self.clickhouse_url {
            validate_http_url("clickhouse_url", url)?;
        }
        if self.ledger_backend == LedgerBackend::Postgres {
            let url = self
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow!("ledger_backend = \"postgres\" requires database_url"))?;
            validate_database_url(url)?;
        }
        Ok(())
    }

    pub fn to_runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            bind_addr: self.bind_addr.clone(),
            system_secret: self.system_secret.clone(),
            admin_user_ids: self.admin_user_ids.clone(),
            identity_url: self.identity_url.clone(),
            identity_api_key: self.identity_api_key.clone(),
            audit_webhook_url: self.audit_webhook_url.clone(),
            audit_webhook_secret: self.audit_webhook_secret.clone(),
            dwell_hours: self.dwell.clone(),
            dwell_policy_path: self.dwell_policy_path.clone(),
            auto_approve_batch_limit: self.auto_approve_batch_limit,
            auto_approve_concurrency: self.auto_approve_concurrency,
            auto_approve_deadline_seconds: self.auto_approve_deadline_seconds,
            auto_approve_interval_minutes: self.auto_approve_interval_minutes,
            max_body_bytes: self.max_body_bytes,
            request_timeout_seconds: self.request_timeout_seconds,
        }
    }

    pub fn to_db_config(&self) -> DbConfig {
        DbConfig {
            ledger_backend: self.ledger_backend,
            database_url: self.database_url.clone(),
            database_max_connections: self.database_max_connections,
            clickhouse_url: self.clickhouse_url.clone(),
            clickhouse_database: self.clickhouse_database.clone(),
            clickhouse_user: self.clickhouse_user.clone(),
            clickhouse_password: self.clickhouse_password.clone(),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("CUSTODY_BIND_ADDR") {
            self.bind_addr = value;
        }
        if let Ok(value) = env::var("CUSTODY_SYSTEM_SECRET") {
            self.system_secret = Some(value);
        }
        if let Ok(value) = env::var("CUSTODY_ADMIN_USER_IDS") {
            self.admin_user_ids = parse_env_id_list(&value);
        }
        if let Ok(value) = env::var("CUSTODY_IDENTITY_URL") {
            self.identity_url = Some(value);
        }
        if let Ok(value) = env::var("CUSTODY_IDENTITY_API_KEY") {
            self.identity_api_key = Some(value);
        }
        if let Ok(value) = env::var("CUSTODY_LEDGER_BACKEND") {
            match value.trim().to_ascii_lowercase().as_str() {
                "memory" => self.ledger_backend = LedgerBackend::Memory,
                "postgres" => self.ledger_backend = LedgerBackend::Postgres,
                other => warn!("ignoring unknown CUSTODY_LEDGER_BACKEND '{}'", other),
            }
        }
        if let Ok(value) = env::var("CUSTODY_DATABASE_URL") {
            self.database_url = Some(value);
        }
        if let Ok(value) = env::var("CUSTODY_DATABASE_MAX_CONNECTIONS") {
            self.database_max_connections = value.parse().unwrap_or(self.database_max_connections);
        }
        if let Ok(value) = env::var("CUSTODY_CLICKHOUSE_URL") {
            self.clickhouse_url = Some(value);
        }
        if let Ok(value) = env::var("CUSTODY_CLICKHOUSE_DATABASE") {
            self.clickhouse_database = value;
        }
        if let Ok(value) = env::var("CUSTODY_CLICKHOUSE_USER") {
            self.clickhouse_user = Some(value);
        }
        if let Ok(value) = env::var("CUSTODY_CLICKHOUSE_PASSWORD") {
            self.clickhouse_password = Some(value);
        }
        if let Ok(value) = env::var("CUSTODY_AUDIT_WEBHOOK_URL") {
            self.audit_webhook_url = Some(value);
        }
        if let Ok(value) = env::var("CUSTODY_AUDIT_WEBHOOK_SECRET") {
            self.audit_webhook_secret = Some(value);
        }
        if let Ok(value) = env::var("CUSTODY_DWELL_POLICY_PATH") {
            self.dwell_policy_path = Some(value);
        }
        if let Ok(value) = env::var("CUSTODY_AUTO_APPROVE_BATCH_LIMIT") {
            self.auto_approve_batch_limit = value.parse().unwrap_or(self.auto_approve_batch_limit);
        }
        if let Ok(value) = env::var("CUSTODY_AUTO_APPROVE_CONCURRENCY") {
            self.auto_approve_concurrency = value.parse().unwrap_or(self.auto_approve_concurrency);
        }
        if let Ok(value) = env::var("CUSTODY_AUTO_APPROVE_DEADLINE_SECONDS") {
            self.auto_approve_deadline_seconds =
                value.parse().unwrap_or(self.auto_approve_deadline_seconds);
        }
        if let Ok(value) = env::var("CUSTODY_AUTO_APPROVE_INTERVAL_MINUTES") {
            self.auto_approve_interval_minutes =
                value.parse().unwrap_or(self.auto_approve_interval_minutes);
        }
        if let Ok(value) = env::var("CUSTODY_MAX_BODY_BYTES") {
            self.max_body_bytes = value.parse().unwrap_or(self.max_body_bytes);
        }
        if let Ok(value) = env::var("CUSTODY_REQUEST_TIMEOUT_SECONDS") {
            self.request_timeout_seconds = value.parse().unwrap_or(self.request_timeout_seconds);
        }
        if let Ok(value) = env::var("CUSTODY_LOG_FORMAT") {
            if value.trim().eq_ignore_ascii_case("json") {
                self.log_format = LogFormat::Json;
            } else {
                self.log_format = LogFormat::Text;
            }
        }
        if let Ok(value) = env::var("CUSTODY_LOG_DIR") {
            self.log_dir = Some(value);
        }
    }
}

fn resolve_path(base: &Path, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return trimmed.to_string();
    }
    let path = Path::new(trimmed);
    if path.is_absolute() {
        trimmed.to_string()
    } else {
        base.join(path).to_string_lossy().to_string()
    }
}

fn parse_env_id_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn normalize_id_list(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = values
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}
