//! Claim lifecycle transactions.
//!
//! Every operation here is a single-document optimistic transaction against
//! the request store: preconditions are re-read on each attempt and a losing
//! concurrent writer observes a clean abort, never a partial merge. At most
//! one of any concurrent pair can succeed against the same pre-state.

use chrono::{Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::request::{Request, RequestStatus};
use crate::models::trip::Trip;
use crate::state::AppState;
use crate::store::TxOutcome;

fn committed(written: Option<Request>) -> Result<Request, AppError> {
    written.ok_or_else(|| AppError::Internal("transaction committed without a write".to_string()))
}

/// Exclusively assign a `searching` request to one driver for the duration
/// of the acceptance window.
pub async fn claim(
    state: &AppState,
    request_id: Uuid,
    driver_id: Uuid,
) -> Result<Request, AppError> {
    let window = Duration::seconds(state.config.claim_window_secs);

    let written = state
        .requests
        .run_transaction(request_id, |doc| {
            let Some(request) = doc else {
                return Err(AppError::NotFound(format!("request {request_id} not found")));
            };
            if request.status != RequestStatus::Searching {
                return Err(AppError::AlreadyClaimedOrGone);
            }

            let mut next = request.clone();
            next.status = RequestStatus::Claimed;
            next.claimed_by_driver_id = Some(driver_id);
            next.claim_expires_at = Some(Utc::now() + window);
            next.notify(driver_id);
            Ok(TxOutcome::Write(next))
        })
        .await?;

    info!(request_id = %request_id, driver_id = %driver_id, "request claimed");
    committed(written)
}

/// Promote a claim to an accepted match and create the trip.
pub async fn accept(
    state: &AppState,
    request_id: Uuid,
    driver_id: Uuid,
) -> Result<Trip, AppError> {
    let accepted = state
        .requests
        .run_transaction(request_id, |doc| {
            let Some(request) = doc else {
                return Err(AppError::NotFound(format!("request {request_id} not found")));
            };
            if request.status != RequestStatus::Claimed {
                return Err(AppError::WrongState);
            }
            if request.claimed_by_driver_id != Some(driver_id) {
                return Err(AppError::WrongClaimant);
            }
            if request.claim_expired(Utc::now()) {
                return Err(AppError::ClaimExpired);
            }

            let mut next = request.clone();
            next.status = RequestStatus::Accepted;
            next.matched_driver_id = Some(driver_id);
            Ok(TxOutcome::Write(next))
        })
        .await?;
    let accepted = committed(accepted)?;

    let trip = Trip::from_accepted_request(&accepted, driver_id);
    state.trips.insert(trip.id, trip.clone()).await;

    // The driver is on the hook now; reflect it on their document.
    state
        .drivers
        .run_transaction(driver_id, |doc| {
            let Some(driver) = doc else {
                return Ok(TxOutcome::Skip);
            };
            let mut next = driver.clone();
            next.is_actively_driving = true;
            next.updated_at = Utc::now();
            Ok(TxOutcome::Write(next))
        })
        .await?;

    info!(
        request_id = %request_id,
        driver_id = %driver_id,
        trip_id = %trip.id,
        "claim accepted, trip created"
    );
    Ok(trip)
}

/// Release a claim back to `searching`. The declining driver stays in the
/// notified set so they are never offered the same request twice.
pub async fn decline(
    state: &AppState,
    request_id: Uuid,
    driver_id: Uuid,
) -> Result<Request, AppError> {
    let written = state
        .requests
        .run_transaction(request_id, |doc| {
            let Some(request) = doc else {
                return Err(AppError::NotFound(format!("request {request_id} not found")));
            };
            if request.status != RequestStatus::Claimed {
                return Err(AppError::WrongState);
            }
            if request.claimed_by_driver_id != Some(driver_id) {
                return Err(AppError::WrongClaimant);
            }

            Ok(TxOutcome::Write(release(request)))
        })
        .await?;

    info!(request_id = %request_id, driver_id = %driver_id, "claim declined");
    committed(written)
}

/// Scanner-side release of an expired claim. No claimant identity check,
/// and a silent no-op when another actor already advanced the request.
pub async fn expire_reset(
    state: &AppState,
    request_id: Uuid,
) -> Result<Option<Request>, AppError> {
    let now = Utc::now();

    let written = state
        .requests
        .run_transaction(request_id, |doc| {
            let Some(request) = doc else {
                return Ok(TxOutcome::Skip);
            };
            if request.status != RequestStatus::Claimed || !request.claim_expired(now) {
                return Ok(TxOutcome::Skip);
            }

            Ok(TxOutcome::Write(release(request)))
        })
        .await?;

    if written.is_some() {
        info!(request_id = %request_id, "expired claim reset to searching");
    }
    Ok(written)
}

fn release(request: &Request) -> Request {
    let mut next = request.clone();
    next.status = RequestStatus::Searching;
    next.claimed_by_driver_id = None;
    next.claim_expires_at = None;
    next
}
