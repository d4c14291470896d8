use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::geohash;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// A point is usable when it lies in valid coordinate ranges and is not
    /// the (0, 0) null-island sentinel used by clients for "unset".
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
            && !(self.lat == 0.0 && self.lng == 0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub make: String,
    pub model: String,
    pub year: u16,
    pub license_plate: String,
    pub towing_capacity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub is_available: bool,
    pub is_verified: bool,
    pub is_actively_driving: bool,
    pub location: GeoPoint,
    /// Proximity key for range queries. `None` while the driver is
    /// unavailable; recomputed on every location change.
    pub geohash: Option<String>,
    pub service_radius_km: f64,
    pub vehicle: VehicleInfo,
    pub total_trips: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    pub fn set_location(&mut self, location: GeoPoint) {
        self.location = location;
        self.refresh_geohash();
        self.updated_at = Utc::now();
    }

    pub fn set_availability(&mut self, is_available: bool) {
        self.is_available = is_available;
        self.refresh_geohash();
        self.updated_at = Utc::now();
    }

    fn refresh_geohash(&mut self) {
        self.geohash = self.is_available.then(|| {
            geohash::encode(self.location.lat, self.location.lng, geohash::DEFAULT_PRECISION)
        });
    }
}
