use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
};
use tracing::warn;

use crate::{error::AppError, state::SharedState};

pub mod docs;
pub mod extract;
pub mod health;
pub mod public;
pub mod rooms;
pub mod user;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let config = state.config();

    let guarded = rooms::mutating_router()
        .merge(user::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), admission_control));

    let api_router = health::router()
        .merge(rooms::router())
        .merge(guarded)
        .layer(DefaultBodyLimit::max(config.limits.max_payload_size));

    api_router
        .merge(public::router(&config.public_dir))
        .merge(docs::router())
        .with_state(state)
}

/// Refuse the request with 429 once any rate or budget window is spent.
async fn admission_control(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if let Err(err) = state.throttle().check() {
        warn!(uri = %req.uri(), error = %err, "request throttled");
        return Err(err.into());
    }
    Ok(next.run(req).await)
}
