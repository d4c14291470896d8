use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Tow,
    JumpStart,
    FuelDelivery,
    TireChange,
    Lockout,
    WinchOut,
}

impl ServiceType {
    /// Only towing is live; the remaining variants are reserved and rejected
    /// at request creation.
    pub fn is_enabled(&self) -> bool {
        matches!(self, ServiceType::Tow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Searching,
    Claimed,
    Accepted,
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Accepted | RequestStatus::Cancelled)
    }
}

/// One commuter's need for assistance.
///
/// `claimed_by_driver_id` and `claim_expires_at` are set and cleared
/// together. `notified_driver_ids` only ever grows. `matched_driver_id` is
/// set exactly when the request reaches `Accepted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    pub commuter_id: Uuid,
    pub pickup_location: GeoPoint,
    pub dropoff_location: GeoPoint,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub service_type: ServiceType,
    pub status: RequestStatus,
    pub claimed_by_driver_id: Option<Uuid>,
    pub claim_expires_at: Option<DateTime<Utc>>,
    pub notified_driver_ids: Vec<Uuid>,
    pub matched_driver_id: Option<Uuid>,
    pub estimated_eta_minutes: u32,
    pub created_at: DateTime<Utc>,
    /// Absolute TTL on the whole request, independent of any claim window.
    pub expires_at: DateTime<Utc>,
}

impl Request {
    /// Set-union append, mirroring the store's arrayUnion primitive.
    pub fn notify(&mut self, driver_id: Uuid) {
        if !self.notified_driver_ids.contains(&driver_id) {
            self.notified_driver_ids.push(driver_id);
        }
    }

    pub fn claim_expired(&self, now: DateTime<Utc>) -> bool {
        self.claim_expires_at.is_some_and(|deadline| deadline <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_is_idempotent() {
        let mut request = Request {
            id: Uuid::from_u128(1),
            commuter_id: Uuid::from_u128(2),
            pickup_location: GeoPoint { lat: 34.24, lng: -118.53 },
            dropoff_location: GeoPoint { lat: 34.3, lng: -118.6 },
            pickup_address: "101 Main St".to_string(),
            dropoff_address: "5 Garage Way".to_string(),
            service_type: ServiceType::Tow,
            status: RequestStatus::Searching,
            claimed_by_driver_id: None,
            claim_expires_at: None,
            notified_driver_ids: Vec::new(),
            matched_driver_id: None,
            estimated_eta_minutes: 12,
            created_at: Utc::now(),
            expires_at: Utc::now(),
        };

        let a = Uuid::from_u128(10);
        let b = Uuid::from_u128(11);
        request.notify(a);
        request.notify(a);
        request.notify(b);
        assert_eq!(request.notified_driver_ids, vec![a, b]);
    }

    #[test]
    fn only_tow_is_enabled() {
        assert!(ServiceType::Tow.is_enabled());
        assert!(!ServiceType::JumpStart.is_enabled());
        assert!(!ServiceType::WinchOut.is_enabled());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&RequestStatus::Searching).unwrap();
        assert_eq!(json, "\"searching\"");
    }
}
