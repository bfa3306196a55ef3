use std::path::Path;

use axum::{Router, response::Redirect, routing::get};
use tower_http::services::ServeDir;

use crate::state::SharedState;

const LANDING_PAGE: &str = "/public/index.html";

/// Serve the browser client from `public_dir` and send `/` to its landing page.
pub fn router(public_dir: &Path) -> Router<SharedState> {
    Router::new()
        .route("/", get(|| async { Redirect::to(LANDING_PAGE) }))
        .nest_service("/public", ServeDir::new(public_dir))
}
