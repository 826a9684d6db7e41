use crate::{AppError, AppState};
use custody_domain::{Shipment, ShipmentId, ShipmentStage};

pub async fn get_shipment(state: &AppState, id: &ShipmentId) -> Result<Shipment, AppError> {
    state
        .ledger
        .find_shipment(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("shipment {}", id)))
}

/// Stage history in commit order. Unknown ids are `NotFound` rather than an
/// empty list.
pub async fn list_stages(state: &AppState, id: &ShipmentId) -> Result<Vec<ShipmentStage>, AppError> {
    let shipment = get_shipment(state, id).await?;
    let mut stages = state.ledger.list_stages(&shipment.id).await?;
    stages.sort_by_key(|stage| stage.id);
    Ok(stages)
}

pub async fn check_ledger(state: &AppState) -> Result<(), AppError> {
    state.ledger.ping().await?;
    Ok(())
}
