//! Periodic expiry scanner.
//!
//! Expiry is data, not a timer: a claim carries its deadline and the
//! scanner discovers it lazily, so detection lags the deadline by at most
//! one sweep period. The same sweep also cancels requests whose absolute
//! TTL has passed.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{error, info};
use uuid::Uuid;

use crate::engine::claim::expire_reset;
use crate::engine::matching::attempt_match;
use crate::error::AppError;
use crate::models::request::RequestStatus;
use crate::state::AppState;
use crate::store::TxOutcome;

pub async fn run_expiry_scanner(state: Arc<AppState>) {
    let mut ticker = interval(Duration::from_secs(state.config.sweep_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        interval_secs = state.config.sweep_interval_secs,
        "expiry scanner started"
    );

    loop {
        ticker.tick().await;

        let start = Instant::now();
        sweep(&state, Utc::now()).await;
        state
            .metrics
            .sweep_duration_seconds
            .observe(start.elapsed().as_secs_f64());
    }
}

/// One pass over the store. Each expired claim is handled independently and
/// concurrently; an individual failure is logged and never aborts the rest
/// of the sweep or future sweeps.
pub async fn sweep(state: &AppState, now: DateTime<Utc>) {
    let expired = state
        .requests
        .query(|request| request.status == RequestStatus::Claimed && request.claim_expired(now))
        .await;

    if !expired.is_empty() {
        info!(count = expired.len(), "processing expired claims");
    }

    let reassignments = expired.into_iter().map(|(request_id, _)| async move {
        if let Err(err) = reassign_expired(state, request_id).await {
            error!(
                request_id = %request_id,
                error = %err,
                "failed to reassign expired claim"
            );
        }
    });
    join_all(reassignments).await;

    let stale = state
        .requests
        .query(|request| request.status == RequestStatus::Searching && request.expires_at <= now)
        .await;

    for (request_id, _) in stale {
        if let Err(err) = cancel_stale_request(state, request_id, now).await {
            error!(
                request_id = %request_id,
                error = %err,
                "failed to cancel request past its ttl"
            );
        }
    }
}

async fn reassign_expired(state: &AppState, request_id: Uuid) -> Result<(), AppError> {
    if expire_reset(state, request_id).await?.is_some() {
        state.metrics.claims_expired_total.inc();
    }
    attempt_match(state, request_id).await?;
    Ok(())
}

/// Unmatched requests do not search forever: past the absolute TTL they are
/// cancelled so commuters get a definitive answer.
async fn cancel_stale_request(
    state: &AppState,
    request_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let written = state
        .requests
        .run_transaction(request_id, |doc| {
            let Some(request) = doc else {
                return Ok(TxOutcome::Skip);
            };
            if request.status != RequestStatus::Searching || request.expires_at > now {
                return Ok(TxOutcome::Skip);
            }

            let mut next = request.clone();
            next.status = RequestStatus::Cancelled;
            Ok(TxOutcome::Write(next))
        })
        .await?;

    if written.is_some() {
        state.metrics.requests_expired_total.inc();
        info!(request_id = %request_id, "request cancelled after ttl");
    }
    Ok(())
}
