use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;

use custody_application::authorization::authenticate_user;
use custody_application::commands::{shipment_commands, transition_commands};
use custody_application::queries::shipment_queries;
use custody_application::AppState;
use custody_domain::{
    NewShipment, Principal, Shipment, ShipmentId, ShipmentStage, ShipmentStatus,
    TransitionOutcome, TransitionRequest,
};

use crate::dtos::TransitionPayload;
use crate::error::HttpError;
use crate::middleware::extract_bearer;

fn parse_shipment_id(raw: &str) -> Result<ShipmentId, HttpError> {
    raw.parse().map_err(|_| HttpError::BadRequest {
        code: "invalid_id",
        message: format!("'{}' is not a shipment id", raw),
    })
}

async fn session_principal(state: &AppState, headers: &HeaderMap) -> Result<Principal, HttpError> {
    let token = extract_bearer(headers);
    let user = authenticate_user(state, token.as_deref()).await?;
    Ok(Principal::User(user))
}

pub async fn register_shipment(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<NewShipment>, JsonRejection>,
) -> Result<(StatusCode, Json<Shipment>), HttpError> {
    let principal = session_principal(&state, &headers).await?;
    let Json(draft) = payload?;
    let shipment =
        shipment_commands::register_shipment(&state, draft, &principal, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(shipment)))
}

pub async fn get_shipment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Shipment>, HttpError> {
    session_principal(&state, &headers).await?;
    let id = parse_shipment_id(&id)?;
    Ok(Json(shipment_queries::get_shipment(&state, &id).await?))
}

pub async fn list_shipment_stages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<ShipmentStage>>, HttpError> {
    session_principal(&state, &headers).await?;
    let id = parse_shipment_id(&id)?;
    Ok(Json(shipment_queries::list_stages(&state, &id).await?))
}

pub async fn transition_shipment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<TransitionPayload>, JsonRejection>,
) -> Result<Json<TransitionOutcome>, HttpError> {
    let principal = session_principal(&state, &headers).await?;
    let id = parse_shipment_id(&id)?;
    let Json(payload) = payload?;
    let target: ShipmentStatus = payload.target.parse().map_err(|err| HttpError::BadRequest {
        code: "unknown_stage",
        message: format!("{}", err),
    })?;

    let now = Utc::now();
    let mut request = TransitionRequest::new(id, target, principal);
    request.at = payload.at;
    request.notes = payload.notes;
    request.report = payload.report;
    request.location = payload
        .location
        .map(|location| location.into_point(payload.at.unwrap_or(now)));

    let outcome = transition_commands::transition_shipment(&state, request, now).await?;
    Ok(Json(outcome))
}
