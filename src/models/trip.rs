use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo;
use crate::models::driver::GeoPoint;
use crate::models::request::Request;

/// Flat base rate for a tow job. Pricing beyond this is out of scope.
const FLAT_TOW_RATE: f64 = 75.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    EnRoute,
    Arrived,
    InProgress,
    Completed,
    Cancelled,
}

impl TripStatus {
    /// The trip status machine only moves forward; cancellation is allowed
    /// from any non-terminal state.
    pub fn can_transition_to(&self, next: TripStatus) -> bool {
        use TripStatus::*;
        match (self, next) {
            (EnRoute, Arrived) | (Arrived, InProgress) | (InProgress, Completed) => true,
            (EnRoute | Arrived | InProgress, Cancelled) => true,
            _ => false,
        }
    }
}

/// Created exactly once per accepted claim; never reconciled back into the
/// request it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub request_id: Uuid,
    pub commuter_id: Uuid,
    pub driver_id: Uuid,
    pub status: TripStatus,
    pub pickup_location: GeoPoint,
    pub dropoff_location: GeoPoint,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub start_time: DateTime<Utc>,
    pub arrival_time: Option<DateTime<Utc>>,
    pub completion_time: Option<DateTime<Utc>>,
    pub distance_km: f64,
    pub estimated_price: f64,
    pub final_price: Option<f64>,
    pub driver_path: Vec<GeoPoint>,
}

impl Trip {
    pub fn from_accepted_request(request: &Request, driver_id: Uuid) -> Self {
        let distance_km =
            geo::distance_km(&request.pickup_location, &request.dropoff_location);

        Self {
            id: Uuid::new_v4(),
            request_id: request.id,
            commuter_id: request.commuter_id,
            driver_id,
            status: TripStatus::EnRoute,
            pickup_location: request.pickup_location,
            dropoff_location: request.dropoff_location,
            pickup_address: request.pickup_address.clone(),
            dropoff_address: request.dropoff_address.clone(),
            start_time: Utc::now(),
            arrival_time: None,
            completion_time: None,
            distance_km,
            estimated_price: FLAT_TOW_RATE,
            final_price: None,
            driver_path: Vec::new(),
        }
    }
}
