// Shipment entity
// The materialized projection of a shipment's stage history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::RegistrationError;
use crate::utils::normalize_optional_text;
use crate::value_objects::{GeoPoint, ReportKind, ShipmentId, ShipmentStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub generator_company_id: String,
    pub transporter_company_id: Option<String>,
    pub recycler_company_id: Option<String>,
    pub driver_id: Option<String>,
    pub waste_type_id: String,
    pub quantity: f64,
    pub unit: String,
    pub description: Option<String>,
    pub status: ShipmentStatus,
    pub departed_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub sorting_started_at: Option<DateTime<Utc>>,
    pub sorting_completed_at: Option<DateTime<Utc>>,
    pub recycling_started_at: Option<DateTime<Utc>>,
    pub recycling_completed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub current_location: Option<GeoPoint>,
    pub disposal_report: Option<String>,
    pub recycling_report: Option<String>,
    pub final_report: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration data supplied by the party creating a shipment.
#[derive(Debug, Clone, Deserialize)]
pub struct NewShipment {
    pub generator_company_id: String,
    #[serde(default)]
    pub transporter_company_id: Option<String>,
    #[serde(default)]
    pub recycler_company_id: Option<String>,
    #[serde(default)]
    pub driver_id: Option<String>,
    pub waste_type_id: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewShipment {
    /// Trims the text fields and rejects drafts that cannot be tracked.
    pub fn validate(mut self) -> Result<Self, RegistrationError> {
        self.generator_company_id = required(self.generator_company_id, "generator_company_id")?;
        self.waste_type_id = required(self.waste_type_id, "waste_type_id")?;
        self.unit = required(self.unit, "unit")?;
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(RegistrationError::InvalidQuantity(self.quantity));
        }
        self.transporter_company_id = normalize_optional_text(self.transporter_company_id);
        self.recycler_company_id = normalize_optional_text(self.recycler_company_id);
        self.driver_id = normalize_optional_text(self.driver_id);
        self.description = normalize_optional_text(self.description);
        Ok(self)
    }
}

fn required(value: String, field: &'static str) -> Result<String, RegistrationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RegistrationError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

impl Shipment {
    pub fn create(id: ShipmentId, draft: NewShipment, now: DateTime<Utc>) -> Self {
        Self {
            id,
            generator_company_id: draft.generator_company_id,
            transporter_company_id: draft.transporter_company_id,
            recycler_company_id: draft.recycler_company_id,
            driver_id: draft.driver_id,
            waste_type_id: draft.waste_type_id,
            quantity: draft.quantity,
            unit: draft.unit,
            description: draft.description,
            status: ShipmentStatus::Created,
            departed_at: None,
            arrived_at: None,
            sorting_started_at: None,
            sorting_completed_at: None,
            recycling_started_at: None,
            recycling_completed_at: None,
            completed_at: None,
            current_location: None,
            disposal_report: None,
            recycling_report: None,
            final_report: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// When the shipment entered its current stage. Dwell time is measured
    /// from here.
    pub fn stage_anchor(&self) -> DateTime<Utc> {
        self.entered_at(self.status).unwrap_or(self.created_at)
    }

    pub fn entered_at(&self, status: ShipmentStatus) -> Option<DateTime<Utc>> {
        match status {
            ShipmentStatus::Created => Some(self.created_at),
            ShipmentStatus::InTransit => self.departed_at,
            ShipmentStatus::Delivered => self.arrived_at,
            ShipmentStatus::Sorting => self.sorting_started_at,
            ShipmentStatus::Recycling => self.recycling_started_at,
            ShipmentStatus::Completed => self.completed_at,
        }
    }

    /// Milestone timestamps in canonical order.
    pub fn milestones(&self) -> [(&'static str, Option<DateTime<Utc>>); 7] {
        [
            ("departed_at", self.departed_at),
            ("arrived_at", self.arrived_at),
            ("sorting_started_at", self.sorting_started_at),
            ("sorting_completed_at", self.sorting_completed_at),
            ("recycling_started_at", self.recycling_started_at),
            ("recycling_completed_at", self.recycling_completed_at),
            ("completed_at", self.completed_at),
        ]
    }

    /// Stamps the milestones for entering `status`. Fields already set are
    /// left alone.
    pub fn stamp_entry(&mut self, status: ShipmentStatus, at: DateTime<Utc>) {
        match status {
            ShipmentStatus::Created => {}
            ShipmentStatus::InTransit => set_once(&mut self.departed_at, at),
            ShipmentStatus::Delivered => set_once(&mut self.arrived_at, at),
            ShipmentStatus::Sorting => set_once(&mut self.sorting_started_at, at),
            ShipmentStatus::Recycling => {
                set_once(&mut self.sorting_completed_at, at);
                set_once(&mut self.recycling_started_at, at);
            }
            ShipmentStatus::Completed => {
                set_once(&mut self.recycling_completed_at, at);
                set_once(&mut self.completed_at, at);
            }
        }
    }

    pub fn report(&self, kind: ReportKind) -> Option<&str> {
        match kind {
            ReportKind::Disposal => self.disposal_report.as_deref(),
            ReportKind::Recycling => self.recycling_report.as_deref(),
            ReportKind::Final => self.final_report.as_deref(),
        }
    }

    /// Write-once: returns false when the slot already holds a report.
    pub fn attach_report(&mut self, kind: ReportKind, content: String) -> bool {
        let slot = match kind {
            ReportKind::Disposal => &mut self.disposal_report,
            ReportKind::Recycling => &mut self.recycling_report,
            ReportKind::Final => &mut self.final_report,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(content);
        true
    }

    /// Replaces the current location unless the stored fix is newer.
    pub fn supersede_location(&mut self, point: GeoPoint) {
        match self.current_location {
            Some(existing) if existing.captured_at > point.captured_at => {}
            _ => self.current_location = Some(point),
        }
    }

    pub fn milestones_are_monotonic(&self) -> bool {
        let mut previous = self.created_at;
        for (_, value) in self.milestones() {
            if let Some(at) = value {
                if at < previous {
                    return false;
                }
                previous = at;
            }
        }
        true
    }

    /// Every stage up to the current one has its entry stamp, and none after.
    pub fn status_matches_milestones(&self) -> bool {
        ShipmentStatus::ALL.iter().all(|stage| {
            let stamped = self.entered_at(*stage).is_some();
            stamped == (*stage <= self.status)
        })
    }
}

fn set_once(slot: &mut Option<DateTime<Utc>>, at: DateTime<Utc>) {
    if slot.is_none() {
        *slot = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> NewShipment {
        NewShipment {
            generator_company_id: " gen-1 ".to_string(),
            transporter_company_id: Some("  ".to_string()),
            recycler_company_id: None,
            driver_id: None,
            waste_type_id: "paper".to_string(),
            quantity: 3.5,
            unit: "t".to_string(),
            description: None,
        }
    }

    #[test]
    fn validate_trims_and_blanks() {
        let draft = draft().validate().expect("valid");
        assert_eq!(draft.generator_company_id, "gen-1");
        assert_eq!(draft.transporter_company_id, None);
    }

    #[test]
    fn validate_rejects_missing_and_bad_quantity() {
        let mut missing = draft();
        missing.unit = " ".to_string();
        assert_eq!(
            missing.validate().expect_err("no unit"),
            RegistrationError::MissingField("unit")
        );

        for quantity in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let mut bad = draft();
            bad.quantity = quantity;
            assert!(matches!(
                bad.validate(),
                Err(RegistrationError::InvalidQuantity(_))
            ));
        }
    }

    #[test]
    fn fresh_shipment_is_anchored_at_creation() {
        let now = chrono::Utc::now();
        let shipment = Shipment::create(ShipmentId::new(), draft(), now);
        assert_eq!(shipment.stage_anchor(), now);
        assert!(shipment.status_matches_milestones());
    }

    #[test]
    fn reports_are_write_once() {
        let now = chrono::Utc::now();
        let mut shipment = Shipment::create(ShipmentId::new(), draft(), now);
        assert!(shipment.attach_report(ReportKind::Final, "a".to_string()));
        assert!(!shipment.attach_report(ReportKind::Final, "b".to_string()));
        assert_eq!(shipment.report(ReportKind::Final), Some("a"));
    }
}
