use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::room::{JoinableRoom, RoomMembershipResponse, RoomRequest},
    error::AppError,
    routes::extract::ValidJson,
    services::room_service,
    state::SharedState,
};

/// Lobby listing; never throttled.
pub fn router() -> Router<SharedState> {
    Router::new().route("/rooms", get(list_rooms))
}

/// Room-mutating lobby routes, guarded by admission control in [`crate::routes::router`].
pub fn mutating_router() -> Router<SharedState> {
    Router::new()
        .route("/room", post(create_room))
        .route("/join", post(join_room))
}

/// List rooms that still have an open seat.
#[utoipa::path(
    get,
    path = "/rooms",
    tag = "rooms",
    responses((status = 200, description = "Joinable rooms", body = [JoinableRoom]))
)]
pub async fn list_rooms(State(state): State<SharedState>) -> Json<Vec<JoinableRoom>> {
    Json(room_service::list_rooms(&state).await)
}

/// Open a room; the requesting user becomes its host.
#[utoipa::path(
    post,
    path = "/room",
    tag = "rooms",
    request_body = RoomRequest,
    responses(
        (status = 200, description = "Room created", body = RoomMembershipResponse),
        (status = 400, description = "Malformed or oversized body, or invalid name, team or striker"),
        (status = 429, description = "Try again later"),
        (status = 500, description = "Room exists, server full or user not found")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    ValidJson(payload): ValidJson<RoomRequest>,
) -> Result<Json<RoomMembershipResponse>, AppError> {
    Ok(Json(room_service::create_room(&state, payload).await?))
}

/// Join an existing room on a team and striker slot.
#[utoipa::path(
    post,
    path = "/join",
    tag = "rooms",
    request_body = RoomRequest,
    responses(
        (status = 200, description = "Membership added", body = RoomMembershipResponse),
        (status = 400, description = "Malformed body, unknown room or user, full team or taken striker"),
        (status = 429, description = "Try again later"),
        (status = 500, description = "Room is full or closing")
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    ValidJson(payload): ValidJson<RoomRequest>,
) -> Result<Json<RoomMembershipResponse>, AppError> {
    Ok(Json(room_service::join_room(&state, payload).await?))
}
