use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report storage connectivity and the number of open input buffers.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_draft_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "draft store health check failed");
            }
        }
        Err(_) => warn!("draft store unavailable (degraded mode)"),
    }

    let open_inputs = state.aggregator().len();
    if state.is_degraded() {
        HealthResponse::degraded(open_inputs)
    } else {
        HealthResponse::ok(open_inputs)
    }
}
