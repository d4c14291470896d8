use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub async fn enqueue_match_job(state: &AppState, request_id: Uuid) -> Result<(), AppError> {
    state
        .match_tx
        .send(request_id)
        .await
        .map_err(|err| AppError::Internal(format!("match queue send failed: {err}")))?;

    state.metrics.match_jobs_in_queue.inc();
    Ok(())
}
