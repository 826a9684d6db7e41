// Auto-approval entities

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::entities::Shipment;

/// A shipment that has stayed at its current stage longer than allowed.
#[derive(Debug, Clone, PartialEq)]
pub struct OverdueShipment {
    pub shipment: Shipment,
    pub elapsed: Duration,
    pub max_dwell: Duration,
}

/// Summary of one auto-approval run. Partial failure is reported here
/// rather than as an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutoApprovalReport {
    pub candidates: usize,
    pub advanced: usize,
    pub skipped: usize,
    pub failed: usize,
    pub remaining: usize,
    pub timed_out: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AutoApprovalReport {
    pub fn is_partial(&self) -> bool {
        self.failed > 0 || self.remaining > 0
    }
}
