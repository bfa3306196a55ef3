use crate::{
    dto::{format_system_time, health::HealthResponse},
    state::SharedState,
};

/// Report liveness together with current registry occupancy.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let users = state.users().len().await;
    let rooms = state.rooms().len().await;
    HealthResponse::ok(users, rooms, format_system_time(state.started_at()))
}
