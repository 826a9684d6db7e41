use chrono::{DateTime, Utc};
use tracing::info;

use crate::{AppError, AppState};
use custody_domain::{
    NewShipment, NewShipmentStage, Principal, Shipment, ShipmentId, ShipmentStatus,
    TransitionEvent,
};

/// Registers a shipment in `created` together with its initial stage record.
pub async fn register_shipment(
    state: &AppState,
    draft: NewShipment,
    principal: &Principal,
    now: DateTime<Utc>,
) -> Result<Shipment, AppError> {
    let draft = draft.validate()?;
    let shipment = Shipment::create(ShipmentId::new(), draft, now);
    let initial = NewShipmentStage {
        shipment_id: shipment.id,
        stage: ShipmentStatus::Created,
        recorded_at: now,
        actor_id: principal.actor_id(),
        trigger: principal.trigger_kind(),
        notes: None,
        location: None,
    };

    let stage = state.ledger.insert_shipment(&shipment, initial).await?;
    state.metrics.record_registration();
    info!(
        shipment_id = %shipment.id,
        actor = %stage.actor_id,
        waste_type = %shipment.waste_type_id,
        "shipment registered"
    );
    state
        .audit_sink
        .publish(TransitionEvent::from_stage(&stage, None));
    Ok(shipment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{draft, harness, user};

    #[tokio::test]
    async fn registration_writes_initial_stage_and_event() {
        let h = harness();
        let now = Utc::now();
        let shipment = register_shipment(&h.state, draft(), &user("gen-user"), now)
            .await
            .expect("register");

        assert_eq!(shipment.status, ShipmentStatus::Created);
        let stages = h.state.ledger.list_stages(&shipment.id).await.expect("stages");
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].stage, ShipmentStatus::Created);
        assert_eq!(stages[0].actor_id.as_str(), "gen-user");

        let events = h.audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].from, None);
    }

    #[tokio::test]
    async fn invalid_draft_is_rejected_without_writes() {
        let h = harness();
        let mut bad = draft();
        bad.quantity = 0.0;
        let err = register_shipment(&h.state, bad, &user("gen-user"), Utc::now())
            .await
            .expect_err("zero quantity");
        assert!(matches!(err, AppError::Registration(_)));
        assert_eq!(h.ledger.shipment_count().await, 0);
        assert!(h.audit.events().is_empty());
    }
}
