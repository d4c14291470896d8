//! Radius-bounded nearest-driver search.

use std::collections::HashSet;

use futures::future::join_all;
use tracing::debug;
use uuid::Uuid;

use crate::geo;
use crate::geo::geohash;
use crate::models::driver::{Driver, GeoPoint};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub driver_id: Uuid,
    pub distance_km: f64,
}

/// Nearest available driver within `radius_km` of `location`, skipping ids
/// in `exclude`. Returns `None` when nobody qualifies; that is an outcome,
/// not an error.
///
/// Per-range store fetches run concurrently. The geohash cover over-matches
/// by design, so every candidate is re-checked against the exact distance.
/// Ties go to the first candidate encountered, deterministic within a run.
pub async fn find_closest_driver(
    state: &AppState,
    location: GeoPoint,
    radius_km: f64,
    exclude: &[Uuid],
) -> Option<Candidate> {
    let bounds = geohash::query_bounds(location.lat, location.lng, radius_km * 1000.0);
    debug!(ranges = bounds.len(), "computed geohash query bounds");

    let fetches = bounds.into_iter().map(|range| {
        state.drivers.query(move |driver: &Driver| {
            driver.is_available
                && driver
                    .geohash
                    .as_deref()
                    .is_some_and(|hash| range.contains(hash))
        })
    });
    let snapshots = join_all(fetches).await;

    let mut seen = HashSet::new();
    let mut closest: Option<Candidate> = None;

    for (driver_id, driver) in snapshots.into_iter().flatten() {
        if !seen.insert(driver_id) || exclude.contains(&driver_id) {
            continue;
        }

        let distance_km = geo::distance_km(&location, &driver.location);
        if distance_km > radius_km {
            continue;
        }
        if closest.is_none_or(|best| distance_km < best.distance_km) {
            closest = Some(Candidate {
                driver_id,
                distance_km,
            });
        }
    }

    if let Some(candidate) = closest {
        debug!(
            driver_id = %candidate.driver_id,
            distance_km = candidate.distance_km,
            "found closest driver"
        );
    }
    closest
}
