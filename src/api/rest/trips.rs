use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::GeoPoint;
use crate::models::trip::{Trip, TripStatus};
use crate::state::AppState;
use crate::store::TxOutcome;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/trips/:id", get(get_trip))
        .route("/trips/:id/status", patch(update_trip_status))
        .route("/trips/:id/path", post(append_trip_path))
}

#[derive(Deserialize)]
pub struct UpdateTripStatusRequest {
    pub status: TripStatus,
}

#[derive(Deserialize)]
pub struct AppendPathRequest {
    pub location: GeoPoint,
}

async fn get_trip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    let trip = state
        .trips
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("trip {id} not found")))?;

    Ok(Json(trip))
}

async fn update_trip_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTripStatusRequest>,
) -> Result<Json<Trip>, AppError> {
    let written = state
        .trips
        .run_transaction(id, |doc| {
            let Some(trip) = doc else {
                return Err(AppError::NotFound(format!("trip {id} not found")));
            };
            if !trip.status.can_transition_to(payload.status) {
                return Err(AppError::InvalidTransition(format!(
                    "{:?} -> {:?}",
                    trip.status, payload.status
                )));
            }

            let mut next = trip.clone();
            next.status = payload.status;
            match payload.status {
                TripStatus::Arrived => next.arrival_time = Some(Utc::now()),
                TripStatus::Completed => next.completion_time = Some(Utc::now()),
                _ => {}
            }
            Ok(TxOutcome::Write(next))
        })
        .await?;

    committed(written)
}

async fn append_trip_path(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AppendPathRequest>,
) -> Result<Json<Trip>, AppError> {
    if !payload.location.is_valid() {
        return Err(AppError::BadRequest("invalid location".to_string()));
    }

    let written = state
        .trips
        .run_transaction(id, |doc| {
            let Some(trip) = doc else {
                return Err(AppError::NotFound(format!("trip {id} not found")));
            };
            let mut next = trip.clone();
            next.driver_path.push(payload.location);
            Ok(TxOutcome::Write(next))
        })
        .await?;

    committed(written)
}

fn committed(written: Option<Trip>) -> Result<Json<Trip>, AppError> {
    written
        .map(Json)
        .ok_or_else(|| AppError::Internal("transaction committed without a write".to_string()))
}
