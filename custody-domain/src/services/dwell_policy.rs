use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{OverdueShipment, Shipment};
use crate::value_objects::ShipmentStatus;

// Thresholds are capped at roughly a century.
const MAX_DWELL_MINUTES: i64 = 100 * 365 * 24 * 60;

/// Maximum dwell per stage, in hours, as written in config. `None` means the
/// stage is never auto-advanced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DwellHours {
    pub created: Option<u64>,
    pub in_transit: Option<u64>,
    pub delivered: Option<u64>,
    pub sorting: Option<u64>,
    pub recycling: Option<u64>,
}

impl Default for DwellHours {
    fn default() -> Self {
        Self {
            created: Some(48),
            in_transit: Some(72),
            delivered: Some(48),
            sorting: Some(72),
            recycling: Some(168),
        }
    }
}

/// One entry of the dwell policy override file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DwellRule {
    pub stage: ShipmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_dwell_hours: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_dwell_minutes: Option<u64>,
}

impl DwellRule {
    pub fn effective_max_dwell(&self) -> Option<Duration> {
        let minutes = self
            .max_dwell_minutes
            .or(self.max_dwell_hours.map(|hours| hours.saturating_mul(60)))?;
        if minutes == 0 {
            return None;
        }
        Some(capped_minutes(minutes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DwellPolicy {
    thresholds: BTreeMap<ShipmentStatus, Duration>,
}

impl DwellPolicy {
    pub fn from_hours(hours: &DwellHours) -> Self {
        let mut policy = Self::default();
        let entries = [
            (ShipmentStatus::Created, hours.created),
            (ShipmentStatus::InTransit, hours.in_transit),
            (ShipmentStatus::Delivered, hours.delivered),
            (ShipmentStatus::Sorting, hours.sorting),
            (ShipmentStatus::Recycling, hours.recycling),
        ];
        for (stage, value) in entries {
            if let Some(hours) = value.filter(|hours| *hours > 0) {
                policy.set(stage, Some(capped_minutes(hours.saturating_mul(60))));
            }
        }
        policy
    }

    /// Sets or clears the threshold for a stage. Terminal stages are ignored.
    pub fn set(&mut self, stage: ShipmentStatus, max_dwell: Option<Duration>) {
        if stage.is_terminal() {
            return;
        }
        match max_dwell {
            Some(value) if value > Duration::zero() => {
                self.thresholds.insert(stage, value);
            }
            _ => {
                self.thresholds.remove(&stage);
            }
        }
    }

    pub fn apply_rules(&mut self, rules: &[DwellRule]) {
        for rule in rules {
            self.set(rule.stage, rule.effective_max_dwell());
        }
    }

    pub fn max_dwell(&self, stage: ShipmentStatus) -> Option<Duration> {
        self.thresholds.get(&stage).copied()
    }

    pub fn thresholds(&self) -> impl Iterator<Item = (ShipmentStatus, Duration)> + '_ {
        self.thresholds.iter().map(|(stage, value)| (*stage, *value))
    }

    /// Returns the overdue entry when the shipment has dwelt strictly longer
    /// than its stage allows.
    pub fn evaluate(&self, shipment: &Shipment, now: DateTime<Utc>) -> Option<OverdueShipment> {
        if shipment.status.is_terminal() {
            return None;
        }
        let max_dwell = self.max_dwell(shipment.status)?;
        let elapsed = now.signed_duration_since(shipment.stage_anchor());
        if elapsed <= max_dwell {
            return None;
        }
        Some(OverdueShipment {
            shipment: shipment.clone(),
            elapsed,
            max_dwell,
        })
    }

    /// Overdue shipments, most overdue first; ties broken by id so the order
    /// is deterministic.
    pub fn select_overdue<'a>(
        &self,
        shipments: impl IntoIterator<Item = &'a Shipment>,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Vec<OverdueShipment> {
        let mut overdue: Vec<OverdueShipment> = shipments
            .into_iter()
            .filter_map(|shipment| self.evaluate(shipment, now))
            .collect();
        sort_most_overdue_first(&mut overdue);
        overdue.truncate(limit);
        overdue
    }
}

fn capped_minutes(minutes: u64) -> Duration {
    let minutes = i64::try_from(minutes).unwrap_or(i64::MAX).min(MAX_DWELL_MINUTES);
    Duration::minutes(minutes)
}

pub fn sort_most_overdue_first(overdue: &mut [OverdueShipment]) {
    overdue.sort_by(|a, b| {
        b.elapsed
            .cmp(&a.elapsed)
            .then_with(|| a.shipment.id.cmp(&b.shipment.id))
    });
}
