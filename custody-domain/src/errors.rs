use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::value_objects::{ShipmentId, ShipmentStatus};

/// Reasons a transition request is refused. Each variant carries enough
/// context for the acting user to decide whether to retry or escalate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    #[error("shipment {0} not found")]
    NotFound(ShipmentId),
    #[error("cannot move shipment from '{from}' to '{to}': stages advance one step at a time")]
    InvalidTransition {
        from: ShipmentStatus,
        to: ShipmentStatus,
    },
    #[error("shipment is already '{status}'; no further transitions are allowed")]
    TerminalState { status: ShipmentStatus },
    #[error("transition time {requested} is earlier than the current stage began ({stage_started})")]
    TimestampRegression {
        requested: DateTime<Utc>,
        stage_started: DateTime<Utc>,
    },
    #[error("transition time {requested} is ahead of the server clock ({now})")]
    TimestampInFuture {
        requested: DateTime<Utc>,
        now: DateTime<Utc>,
    },
    #[error("stage '{stage}' does not accept a report")]
    ReportNotAccepted { stage: ShipmentStatus },
    #[error("invalid location: {0}")]
    InvalidLocation(String),
    #[error("invalid actor: {0}")]
    InvalidActor(String),
}

impl TransitionError {
    pub fn code(&self) -> &'static str {
        match self {
            TransitionError::NotFound(_) => "not_found",
            TransitionError::InvalidTransition { .. } => "invalid_transition",
            TransitionError::TerminalState { .. } => "terminal_state",
            TransitionError::TimestampRegression { .. } => "timestamp_regression",
            TransitionError::TimestampInFuture { .. } => "timestamp_in_future",
            TransitionError::ReportNotAccepted { .. } => "report_not_accepted",
            TransitionError::InvalidLocation(_) => "invalid_location",
            TransitionError::InvalidActor(_) => "invalid_actor",
        }
    }
}

/// Reasons a new shipment is refused at registration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error("quantity must be a positive number, got {0}")]
    InvalidQuantity(f64),
}
