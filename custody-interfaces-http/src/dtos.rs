use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use custody_domain::{AutoApprovalReport, GeoPoint};

#[derive(Debug, Deserialize)]
pub struct LocationPayload {
    pub latitude: f64,
    pub longitude: f64,
    /// Defaults to the transition time.
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
}

impl LocationPayload {
    pub fn into_point(self, fallback: DateTime<Utc>) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
            captured_at: self.captured_at.unwrap_or(fallback),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TransitionPayload {
    #[serde(alias = "stage")]
    pub target: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub location: Option<LocationPayload>,
    #[serde(default)]
    pub report: Option<String>,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct AutoApproveResponse {
    pub success: bool,
    pub advanced: usize,
    pub failed: usize,
    pub skipped: usize,
    pub remaining: usize,
    pub timed_out: bool,
    pub timestamp: DateTime<Utc>,
}

impl From<&AutoApprovalReport> for AutoApproveResponse {
    fn from(report: &AutoApprovalReport) -> Self {
        Self {
            success: true,
            advanced: report.advanced,
            failed: report.failed,
            skipped: report.skipped,
            remaining: report.remaining,
            timed_out: report.timed_out,
            timestamp: report.finished_at,
        }
    }
}
