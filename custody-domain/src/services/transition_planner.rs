use chrono::{DateTime, Duration, Utc};

use crate::entities::{NewShipmentStage, Principal, Shipment, TransitionRequest};
use crate::errors::TransitionError;
use crate::utils::normalize_optional_text;
use crate::value_objects::ShipmentStatus;

/// How far a caller-supplied transition time may run ahead of the server clock.
pub const MAX_CLOCK_SKEW_SECONDS: i64 = 300;

/// What the ledger must do to honor a transition request.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionPlan {
    /// The shipment already sits at the requested stage.
    AlreadyApplied,
    Apply(PlannedTransition),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTransition {
    /// Status the projection must still have when the plan is committed.
    pub expected: ShipmentStatus,
    pub projection: Shipment,
    pub stage: NewShipmentStage,
}

/// Validates `request` against the current projection and computes the new
/// projection plus the stage record to append. Pure: nothing is written.
pub fn plan_transition(
    current: &Shipment,
    request: &TransitionRequest,
    now: DateTime<Utc>,
) -> Result<TransitionPlan, TransitionError> {
    validate_principal(&request.principal)?;

    let from = current.status;
    let target = request.target;
    if target == from {
        return Ok(TransitionPlan::AlreadyApplied);
    }
    if from.is_terminal() {
        return Err(TransitionError::TerminalState { status: from });
    }
    if from.next() != Some(target) {
        return Err(TransitionError::InvalidTransition { from, to: target });
    }

    let at = request.at.unwrap_or(now);
    if at > now + Duration::seconds(MAX_CLOCK_SKEW_SECONDS) {
        return Err(TransitionError::TimestampInFuture { requested: at, now });
    }
    let stage_started = current.stage_anchor();
    if at < stage_started {
        return Err(TransitionError::TimestampRegression {
            requested: at,
            stage_started,
        });
    }

    if let Some(point) = &request.location {
        point.validate().map_err(TransitionError::InvalidLocation)?;
    }

    let mut projection = current.clone();
    projection.status = target;
    projection.stamp_entry(target, at);
    projection.updated_at = now.max(at);

    if let Some(report) = normalize_optional_text(request.report.clone()) {
        let kind = target
            .report_slot()
            .ok_or(TransitionError::ReportNotAccepted { stage: target })?;
        if !projection.attach_report(kind, report) {
            return Err(TransitionError::ReportNotAccepted { stage: target });
        }
    }

    if let Some(point) = request.location {
        projection.supersede_location(point);
    }

    let stage = NewShipmentStage {
        shipment_id: current.id,
        stage: target,
        recorded_at: at,
        actor_id: request.principal.actor_id(),
        trigger: request.principal.trigger_kind(),
        notes: normalize_optional_text(request.notes.clone()),
        location: request.location,
    };

    Ok(TransitionPlan::Apply(PlannedTransition {
        expected: from,
        projection,
        stage,
    }))
}

fn validate_principal(principal: &Principal) -> Result<(), TransitionError> {
    if let Principal::User(actor) = principal {
        if actor.as_str().trim().is_empty() {
            return Err(TransitionError::InvalidActor("actor id must not be empty".to_string()));
        }
        if actor.is_system() {
            return Err(TransitionError::InvalidActor(format!(
                "'{}' is reserved for automated transitions",
                actor
            )));
        }
    }
    Ok(())
}
