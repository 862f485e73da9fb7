//! Entry point for updates pushed by the chat platform.

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::post,
};
use tracing::{error, warn};

use crate::{
    dto::telegram::Update,
    error::{AppError, ServiceError},
    services::update_service,
    state::SharedState,
};

/// Header carrying the secret registered together with the webhook.
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Webhook route guarded by the secret-token check.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/telegram/webhook", post(receive_update))
        .route_layer(middleware::from_fn_with_state(state, require_webhook_secret))
}

/// Handle one update.
///
/// Always answers 200 once the secret matched: handler failures are logged here, since
/// an error status only makes the platform redeliver the same update.
#[utoipa::path(
    post,
    path = "/telegram/webhook",
    tag = "bot",
    params(("X-Telegram-Bot-Api-Secret-Token" = Option<String>, Header, description = "Secret configured with setWebhook; required when the server has one")),
    request_body = Update,
    responses(
        (status = 200, description = "Update accepted"),
        (status = 401, description = "Missing or wrong secret token")
    )
)]
pub async fn receive_update(
    State(state): State<SharedState>,
    Json(update): Json<Update>,
) -> StatusCode {
    let update_id = update.update_id;
    if let Err(err) = update_service::handle_update(&state, update).await {
        match &err {
            ServiceError::Unauthorized(_) | ServiceError::InvalidInput(_) => {
                warn!(update_id, error = %err, "update rejected");
            }
            _ => error!(update_id, error = ?err, "update handling failed"),
        }
    }
    StatusCode::OK
}

async fn require_webhook_secret(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config().webhook_secret.as_deref() else {
        return Ok(next.run(req).await);
    };

    let provided = req
        .headers()
        .get(SECRET_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized("missing header `X-Telegram-Bot-Api-Secret-Token`".into())
        })?;

    if provided != expected {
        return Err(AppError::Unauthorized("invalid webhook secret".into()));
    }
    Ok(next.run(req).await)
}
