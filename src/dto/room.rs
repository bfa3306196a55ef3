//! DTOs for the lobby endpoints: listing, creating and joining rooms.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{dto::validation::validate_team, state::room::Team};

/// Payload of `POST /room` and `POST /join`.
///
/// Missing fields deserialize as empty and are rejected by validation with a 400.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct RoomRequest {
    #[validate(length(min = 1, message = "roomName is required"))]
    pub room_name: String,
    #[validate(length(min = 1, message = "userName is required"))]
    pub user_name: String,
    #[validate(custom(function = "validate_team"))]
    pub team: String,
    pub striker: usize,
}

impl RoomRequest {
    /// Team requested by the client; only meaningful once validated.
    pub fn team(&self) -> Option<Team> {
        Team::parse(&self.team)
    }
}

/// Seat granted to a user after creating or joining a room.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomMembershipResponse {
    pub room_name: String,
    pub user_name: String,
    pub team: Team,
    pub striker: usize,
    pub is_host: bool,
}

/// Lobby entry for a room that still has an open seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinableRoom {
    pub room_name: String,
    pub can_join_left_team: bool,
    pub can_join_right_team: bool,
    pub available_strikers: Vec<usize>,
}
