//! Health endpoint payload.

use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Authoring flows currently collecting input.
    pub open_inputs: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(open_inputs: usize) -> Self {
        Self {
            status: "ok".to_string(),
            open_inputs,
        }
    }

    /// Create a health response indicating the system is running without storage.
    pub fn degraded(open_inputs: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            open_inputs,
        }
    }
}
