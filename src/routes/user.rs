use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{services::session_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/user",
    tag = "players",
    responses(
        (status = 101, description = "Switching protocols; the first message must be a handshake"),
        (status = 429, description = "Admission control refused the connection")
    )
)]
/// Upgrade the HTTP connection into a player session.
pub async fn user_handler(
    State(state): State<SharedState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let read_limit = state.config().websocket.read_limit;
    ws.max_message_size(read_limit)
        .max_frame_size(read_limit)
        .on_upgrade(move |socket| session_service::handle_socket(state, socket))
}

/// Configure the player WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/user", get(user_handler))
}
