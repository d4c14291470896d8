use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::engine::claim;
use crate::engine::matching::attempt_match;
use crate::engine::queue::enqueue_match_job;
use crate::error::AppError;
use crate::geo;
use crate::models::driver::GeoPoint;
use crate::models::request::{Request, RequestStatus, ServiceType};
use crate::models::trip::Trip;
use crate::state::AppState;
use crate::store::TxOutcome;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/requests", post(create_request).get(list_requests))
        .route("/requests/:id", get(get_request))
        .route("/requests/:id/cancel", post(cancel_request))
        .route("/requests/:id/accept", post(accept_request))
        .route("/requests/:id/decline", post(decline_request))
}

#[derive(Deserialize)]
pub struct CreateRequestRequest {
    pub commuter_id: Uuid,
    pub pickup_location: GeoPoint,
    pub dropoff_location: GeoPoint,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub service_type: ServiceType,
}

#[derive(Deserialize)]
pub struct ListRequestsQuery {
    pub status: Option<RequestStatus>,
}

#[derive(Deserialize)]
pub struct DriverActionRequest {
    pub driver_id: Uuid,
}

async fn create_request(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRequestRequest>,
) -> Result<Json<Request>, AppError> {
    if !payload.pickup_location.is_valid() {
        return Err(AppError::BadRequest("invalid pickup location".to_string()));
    }
    if !payload.dropoff_location.is_valid() {
        return Err(AppError::BadRequest("invalid dropoff location".to_string()));
    }
    if payload.pickup_address.trim().is_empty() || payload.dropoff_address.trim().is_empty() {
        return Err(AppError::BadRequest("addresses cannot be empty".to_string()));
    }
    if !payload.service_type.is_enabled() {
        return Err(AppError::BadRequest(
            "service type is not yet available".to_string(),
        ));
    }

    let trip_miles = geo::km_to_miles(geo::distance_km(
        &payload.pickup_location,
        &payload.dropoff_location,
    ));
    let now = Utc::now();

    let request = Request {
        id: Uuid::new_v4(),
        commuter_id: payload.commuter_id,
        pickup_location: payload.pickup_location,
        dropoff_location: payload.dropoff_location,
        pickup_address: payload.pickup_address,
        dropoff_address: payload.dropoff_address,
        service_type: payload.service_type,
        status: RequestStatus::Searching,
        claimed_by_driver_id: None,
        claim_expires_at: None,
        notified_driver_ids: Vec::new(),
        matched_driver_id: None,
        estimated_eta_minutes: geo::eta_minutes(trip_miles),
        created_at: now,
        expires_at: now + Duration::seconds(state.config.request_ttl_secs),
    };

    state.requests.insert(request.id, request.clone()).await;
    enqueue_match_job(&state, request.id).await?;

    Ok(Json(request))
}

async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Request>, AppError> {
    let request = state
        .requests
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;

    Ok(Json(request))
}

async fn list_requests(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListRequestsQuery>,
) -> Json<Vec<Request>> {
    let requests = state
        .requests
        .query(|request| query.status.is_none_or(|status| request.status == status))
        .await
        .into_iter()
        .map(|(_, request)| request)
        .collect();

    Json(requests)
}

/// Either party may cancel while the request is still `searching` or
/// `claimed`; terminal requests stay as they are.
async fn cancel_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Request>, AppError> {
    let written = state
        .requests
        .run_transaction(id, |doc| {
            let Some(request) = doc else {
                return Err(AppError::NotFound(format!("request {id} not found")));
            };
            if request.status.is_terminal() {
                return Err(AppError::WrongState);
            }

            let mut next = request.clone();
            next.status = RequestStatus::Cancelled;
            next.claimed_by_driver_id = None;
            next.claim_expires_at = None;
            Ok(TxOutcome::Write(next))
        })
        .await?;

    written
        .map(Json)
        .ok_or_else(|| AppError::Internal("transaction committed without a write".to_string()))
}

async fn accept_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriverActionRequest>,
) -> Result<Json<Trip>, AppError> {
    let trip = claim::accept(&state, id, payload.driver_id).await?;
    Ok(Json(trip))
}

async fn decline_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriverActionRequest>,
) -> Result<Json<Request>, AppError> {
    let request = claim::decline(&state, id, payload.driver_id).await?;

    // Declining immediately hands the request to the next candidate. The
    // decline itself already succeeded, so a failed re-match only gets
    // logged; the expiry scanner will pick the request up again.
    if let Err(err) = attempt_match(&state, id).await {
        warn!(request_id = %id, error = %err, "re-match after decline failed");
    }

    Ok(Json(request))
}
