use std::sync::Arc;

use custody_domain::ports::{AuditSink, IdentityProvider, RoleDirectory, ShipmentLedger};
use custody_domain::{DwellPolicy, RuntimeConfig};

use crate::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: RuntimeConfig,
    pub ledger: Arc<dyn ShipmentLedger>,
    pub audit_sink: Arc<dyn AuditSink>,
    pub identity: Arc<dyn IdentityProvider>,
    pub roles: Arc<dyn RoleDirectory>,
    pub dwell_policy: Arc<DwellPolicy>,
    pub metrics: Arc<Metrics>,
}
