pub mod geohash;

use crate::models::driver::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;
const MILES_PER_KM: f64 = 0.621_371;

/// Average tow-truck speed used for rough ETA estimates.
const AVERAGE_SPEED_MPH: f64 = 25.0;

/// Great-circle distance between two points.
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

pub fn km_to_miles(km: f64) -> f64 {
    km * MILES_PER_KM
}

/// Minutes to cover `distance_miles` at the assumed average speed, rounded up.
pub fn eta_minutes(distance_miles: f64) -> u32 {
    (distance_miles / AVERAGE_SPEED_MPH * 60.0).ceil().max(0.0) as u32
}
