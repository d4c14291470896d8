use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::{Driver, GeoPoint, VehicleInfo};
use crate::models::request::{Request, RequestStatus};
use crate::state::AppState;
use crate::store::TxOutcome;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver).get(list_drivers))
        .route("/drivers/:id", get(get_driver))
        .route("/drivers/:id/location", patch(update_driver_location))
        .route("/drivers/:id/availability", patch(update_driver_availability))
        .route("/drivers/:id/claimed", get(claimed_requests))
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub name: String,
    pub location: GeoPoint,
    pub service_radius_km: f64,
    pub vehicle: VehicleInfo,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

#[derive(Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub is_available: bool,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<Json<Driver>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if !payload.location.is_valid() {
        return Err(AppError::BadRequest("invalid location".to_string()));
    }
    if payload.service_radius_km <= 0.0 {
        return Err(AppError::BadRequest(
            "service radius must be > 0".to_string(),
        ));
    }

    let now = Utc::now();
    let driver = Driver {
        id: Uuid::new_v4(),
        name: payload.name,
        // Drivers come online explicitly; until then they are invisible to
        // candidate search and carry no proximity key.
        is_available: false,
        is_verified: false,
        is_actively_driving: false,
        location: payload.location,
        geohash: None,
        service_radius_km: payload.service_radius_km,
        vehicle: payload.vehicle,
        total_trips: 0,
        created_at: now,
        updated_at: now,
    };

    state.drivers.insert(driver.id, driver.clone()).await;
    Ok(Json(driver))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<Driver>> {
    let drivers = state
        .drivers
        .query(|_| true)
        .await
        .into_iter()
        .map(|(_, driver)| driver)
        .collect();
    Json(drivers)
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, AppError> {
    let driver = state
        .drivers
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

    Ok(Json(driver))
}

async fn update_driver_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Driver>, AppError> {
    if !payload.location.is_valid() {
        return Err(AppError::BadRequest("invalid location".to_string()));
    }

    let written = state
        .drivers
        .run_transaction(id, |doc| {
            let Some(driver) = doc else {
                return Err(AppError::NotFound(format!("driver {id} not found")));
            };
            let mut next = driver.clone();
            next.set_location(payload.location);
            Ok(TxOutcome::Write(next))
        })
        .await?;

    committed(written)
}

async fn update_driver_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Driver>, AppError> {
    let written = state
        .drivers
        .run_transaction(id, |doc| {
            let Some(driver) = doc else {
                return Err(AppError::NotFound(format!("driver {id} not found")));
            };
            let mut next = driver.clone();
            next.set_availability(payload.is_available);
            Ok(TxOutcome::Write(next))
        })
        .await?;

    committed(written)
}

/// The driver-facing live view: requests currently claimed by this driver.
/// The mobile client polls or subscribes to this to raise the
/// incoming-request popup with its local countdown.
async fn claimed_requests(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<Vec<Request>> {
    let requests = state
        .requests
        .query(|request| {
            request.status == RequestStatus::Claimed && request.claimed_by_driver_id == Some(id)
        })
        .await
        .into_iter()
        .map(|(_, request)| request)
        .collect();

    Json(requests)
}

fn committed(written: Option<Driver>) -> Result<Json<Driver>, AppError> {
    written
        .map(Json)
        .ok_or_else(|| AppError::Internal("transaction committed without a write".to_string()))
}
