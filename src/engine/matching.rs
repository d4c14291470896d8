//! Match orchestration: wires candidate search and claim transactions
//! together, triggered on request creation, after a decline, and from the
//! expiry scanner.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::claim;
use crate::engine::search::find_closest_driver;
use crate::error::AppError;
use crate::models::request::RequestStatus;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchOutcome {
    /// The request was claimed for this driver.
    Claimed(Uuid),
    /// No driver qualified; the request stays `searching`.
    NoCandidate,
    /// Another actor advanced the request first; nothing to do.
    Skipped,
}

/// Drains the match-job queue fed by request creation.
pub async fn run_match_worker(state: Arc<AppState>, mut match_rx: mpsc::Receiver<Uuid>) {
    info!("match worker started");

    while let Some(request_id) = match_rx.recv().await {
        state.metrics.match_jobs_in_queue.dec();

        if let Err(err) = attempt_match(&state, request_id).await {
            error!(request_id = %request_id, error = %err, "match attempt failed");
        }
    }

    warn!("match worker stopped: queue channel closed");
}

/// One full match attempt for a request.
///
/// No-ops unless the request is still `searching`. A claim that loses a
/// race against another trigger is benign and is not retried within this
/// invocation; the next trigger will pick the request up again.
pub async fn attempt_match(
    state: &AppState,
    request_id: Uuid,
) -> Result<MatchOutcome, AppError> {
    let start = Instant::now();
    let result = attempt_match_inner(state, request_id).await;

    let outcome = match &result {
        Ok(MatchOutcome::Claimed(_)) => "claimed",
        Ok(MatchOutcome::NoCandidate) => "no_candidate",
        Ok(MatchOutcome::Skipped) => "skipped",
        Err(_) => "error",
    };
    state
        .metrics
        .match_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());
    state
        .metrics
        .matches_total
        .with_label_values(&[outcome])
        .inc();

    result
}

async fn attempt_match_inner(
    state: &AppState,
    request_id: Uuid,
) -> Result<MatchOutcome, AppError> {
    let request = state
        .requests
        .get(request_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))?;

    if request.status != RequestStatus::Searching {
        debug!(request_id = %request_id, status = ?request.status, "request already advanced");
        return Ok(MatchOutcome::Skipped);
    }

    let candidate = find_closest_driver(
        state,
        request.pickup_location,
        state.config.search_radius_km,
        &request.notified_driver_ids,
    )
    .await;

    let Some(candidate) = candidate else {
        warn!(request_id = %request_id, "no available drivers within radius");
        return Ok(MatchOutcome::NoCandidate);
    };

    match claim::claim(state, request_id, candidate.driver_id).await {
        Ok(_) => {
            info!(
                request_id = %request_id,
                driver_id = %candidate.driver_id,
                distance_km = candidate.distance_km,
                "request matched"
            );
            Ok(MatchOutcome::Claimed(candidate.driver_id))
        }
        Err(err) if err.is_precondition_race() => {
            debug!(request_id = %request_id, "lost claim race to another trigger");
            Ok(MatchOutcome::Skipped)
        }
        Err(err) => Err(err),
    }
}
