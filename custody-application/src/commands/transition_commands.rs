use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{AppError, AppState};
use custody_domain::services::{plan_transition, TransitionPlan};
use custody_domain::{
    CommitResult, TransitionError, TransitionEvent, TransitionOutcome, TransitionRequest,
};

const MAX_COMMIT_ATTEMPTS: usize = 3;

/// Moves a shipment to `request.target`.
///
/// The plan is computed against the stored projection and committed with a
/// compare-and-swap on its status. If another writer got there first the
/// request is re-planned against the fresh state, so a racing writer that
/// applied the same stage turns this call into a no-op.
pub async fn transition_shipment(
    state: &AppState,
    request: TransitionRequest,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, AppError> {
    let result = apply_transition(state, &request, now).await;
    match &result {
        Ok(TransitionOutcome::Applied { stage, .. }) => state.metrics.record_transition(stage.trigger),
        Ok(TransitionOutcome::AlreadyApplied { .. }) => state.metrics.record_noop(),
        Err(AppError::Transition(_)) => state.metrics.record_rejected(),
        Err(_) => {}
    }
    result
}

async fn apply_transition(
    state: &AppState,
    request: &TransitionRequest,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, AppError> {
    for attempt in 1..=MAX_COMMIT_ATTEMPTS {
        let current = state
            .ledger
            .find_shipment(&request.shipment_id)
            .await?
            .ok_or(TransitionError::NotFound(request.shipment_id))?;

        let planned = match plan_transition(&current, request, now)? {
            TransitionPlan::AlreadyApplied => {
                debug!(
                    shipment_id = %current.id,
                    stage = %current.status,
                    "transition already applied"
                );
                return Ok(TransitionOutcome::AlreadyApplied { shipment: current });
            }
            TransitionPlan::Apply(planned) => planned,
        };

        let expected = planned.expected;
        match state
            .ledger
            .commit_transition(expected, &planned.projection, planned.stage)
            .await?
        {
            CommitResult::Committed(stage) => {
                info!(
                    shipment_id = %stage.shipment_id,
                    from = %expected,
                    to = %stage.stage,
                    actor = %stage.actor_id,
                    trigger = stage.trigger.as_str(),
                    "shipment transitioned"
                );
                state
                    .audit_sink
                    .publish(TransitionEvent::from_stage(&stage, Some(expected)));
                return Ok(TransitionOutcome::Applied {
                    shipment: planned.projection,
                    stage,
                });
            }
            CommitResult::Conflict { current } => {
                debug!(
                    shipment_id = %request.shipment_id,
                    expected = %expected,
                    current = %current,
                    attempt,
                    "transition lost a race, re-planning"
                );
            }
        }
    }

    Err(AppError::Conflict(format!(
        "shipment {} kept changing; gave up after {} attempts",
        request.shipment_id, MAX_COMMIT_ATTEMPTS
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::test_support::{harness, registered, user};
    use custody_domain::{Principal, ShipmentId, ShipmentStatus, TriggerKind};

    #[tokio::test]
    async fn unknown_shipment_is_not_found_and_writes_nothing() {
        let h = harness();
        let request =
            TransitionRequest::new(ShipmentId::new(), ShipmentStatus::InTransit, user("u-1"));
        let err = transition_shipment(&h.state, request, Utc::now())
            .await
            .expect_err("missing shipment");
        assert!(matches!(err, AppError::Transition(TransitionError::NotFound(_))));
        assert_eq!(h.ledger.stage_count().await, 0);
        assert!(h.audit.events().is_empty());
    }

    #[tokio::test]
    async fn applied_transition_publishes_one_event() {
        let h = harness();
        let now = Utc::now();
        let shipment = registered(&h.state, now).await;

        let request = TransitionRequest::new(shipment.id, ShipmentStatus::InTransit, user("driver-1"));
        let outcome = transition_shipment(&h.state, request, now + Duration::hours(1))
            .await
            .expect("transition");
        assert!(outcome.is_applied());
        assert_eq!(outcome.shipment().departed_at, Some(now + Duration::hours(1)));

        let events = h.audit.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].from, Some(ShipmentStatus::Created));
        assert_eq!(events[1].stage, ShipmentStatus::InTransit);
        assert_eq!(events[1].trigger, TriggerKind::Human);
        assert_eq!(h.state.metrics.transitions(TriggerKind::Human), 1);
    }

    #[tokio::test]
    async fn repeating_the_current_stage_is_a_silent_noop() {
        let h = harness();
        let now = Utc::now();
        let shipment = registered(&h.state, now).await;
        let request = TransitionRequest::new(shipment.id, ShipmentStatus::InTransit, user("driver-1"));
        transition_shipment(&h.state, request.clone(), now)
            .await
            .expect("first");
        let before = h.ledger.stage_count().await;

        let again = transition_shipment(&h.state, request, now + Duration::minutes(5))
            .await
            .expect("second");
        assert!(!again.is_applied());
        assert_eq!(h.ledger.stage_count().await, before);
        assert_eq!(h.audit.events().len(), 2);
        assert_eq!(h.state.metrics.noops(), 1);
    }

    #[tokio::test]
    async fn skipping_is_rejected_and_leaves_state_alone() {
        let h = harness();
        let now = Utc::now();
        let shipment = registered(&h.state, now).await;
        let request = TransitionRequest::new(shipment.id, ShipmentStatus::Delivered, user("u-1"));
        let err = transition_shipment(&h.state, request, now)
            .await
            .expect_err("skip");
        assert!(matches!(
            err,
            AppError::Transition(TransitionError::InvalidTransition { .. })
        ));
        assert_eq!(h.ledger.status_of(&shipment.id).await, ShipmentStatus::Created);
    }

    #[tokio::test]
    async fn lost_race_to_the_same_stage_becomes_noop() {
        let h = harness();
        let now = Utc::now();
        let shipment = registered(&h.state, now).await;
        h.ledger.arm_race();

        let request = TransitionRequest::new(shipment.id, ShipmentStatus::InTransit, Principal::System);
        let outcome = transition_shipment(&h.state, request, now)
            .await
            .expect("transition");
        assert!(!outcome.is_applied());

        let stages = h.state.ledger.list_stages(&shipment.id).await.expect("stages");
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].actor_id.as_str(), "operator-7");
        assert_eq!(h.state.metrics.transitions(TriggerKind::System), 0);
    }
}
