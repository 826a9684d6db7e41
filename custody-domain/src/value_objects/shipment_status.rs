// Shipment status value object

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::value_objects::ReportKind;

/// Position of a shipment in the custody chain. Variant order is the
/// canonical stage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Created,
    InTransit,
    Delivered,
    Sorting,
    Recycling,
    Completed,
}

impl ShipmentStatus {
    pub const ALL: [ShipmentStatus; 6] = [
        ShipmentStatus::Created,
        ShipmentStatus::InTransit,
        ShipmentStatus::Delivered,
        ShipmentStatus::Sorting,
        ShipmentStatus::Recycling,
        ShipmentStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Created => "created",
            ShipmentStatus::InTransit => "in_transit",
            ShipmentStatus::Delivered => "delivered",
            ShipmentStatus::Sorting => "sorting",
            ShipmentStatus::Recycling => "recycling",
            ShipmentStatus::Completed => "completed",
        }
    }

    /// The only stage a shipment may move to from `self`.
    pub fn next(&self) -> Option<ShipmentStatus> {
        match self {
            ShipmentStatus::Created => Some(ShipmentStatus::InTransit),
            ShipmentStatus::InTransit => Some(ShipmentStatus::Delivered),
            ShipmentStatus::Delivered => Some(ShipmentStatus::Sorting),
            ShipmentStatus::Sorting => Some(ShipmentStatus::Recycling),
            ShipmentStatus::Recycling => Some(ShipmentStatus::Completed),
            ShipmentStatus::Completed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }

    /// Report that may be attached when a shipment enters this stage.
    pub fn report_slot(&self) -> Option<ReportKind> {
        match self {
            ShipmentStatus::Sorting => Some(ReportKind::Disposal),
            ShipmentStatus::Recycling => Some(ReportKind::Recycling),
            ShipmentStatus::Completed => Some(ReportKind::Final),
            _ => None,
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown shipment status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for ShipmentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        ShipmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_walks_the_canonical_order() {
        let mut walked = vec![ShipmentStatus::Created];
        while let Some(next) = walked.last().and_then(|status| status.next()) {
            walked.push(next);
        }
        assert_eq!(walked, ShipmentStatus::ALL.to_vec());
        assert!(ShipmentStatus::Completed.is_terminal());
    }

    #[test]
    fn ordering_matches_canonical_order() {
        assert!(ShipmentStatus::Created < ShipmentStatus::InTransit);
        assert!(ShipmentStatus::Recycling < ShipmentStatus::Completed);
    }

    #[test]
    fn parses_loose_spellings() {
        assert_eq!("In-Transit".parse::<ShipmentStatus>(), Ok(ShipmentStatus::InTransit));
        assert_eq!(" completed ".parse::<ShipmentStatus>(), Ok(ShipmentStatus::Completed));
        assert!("shipped".parse::<ShipmentStatus>().is_err());
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&ShipmentStatus::InTransit).expect("serialize");
        assert_eq!(json, "\"in_transit\"");
    }
}
