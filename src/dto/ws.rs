use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Channel tag carried by the first message of every persistent connection.
pub const HANDSHAKE_CHANNEL: &str = "handshake";
/// Channel tag of the notification sent when a member leaves a room.
pub const MEMBER_LEFT_CHANNEL: &str = "memberLeft";
/// Channel tag of the notification telling a member it became host.
pub const REASSIGN_HOST_CHANNEL: &str = "reassignHost";
/// Channel tag of relayed game-state updates.
pub const STATE_CHANNEL: &str = "state";

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
/// First message a client sends after the upgrade, announcing the user name it wants.
///
/// Missing fields decode as empty so the registry can report what is wrong with them.
pub struct HandshakeRequest {
    pub channel: String,
    pub user_name: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Acknowledgement of a handshake attempt.
pub struct HandshakeResponse {
    pub channel: String,
    pub is_success: bool,
    pub message: String,
}

impl HandshakeResponse {
    /// Positive acknowledgement for a freshly registered user.
    pub fn accepted(user_name: &str) -> Self {
        Self {
            channel: HANDSHAKE_CHANNEL.into(),
            is_success: true,
            message: format!("Created user {user_name}"),
        }
    }

    /// Negative acknowledgement carrying the rejection reason.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            channel: HANDSHAKE_CHANNEL.into(),
            is_success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Tells the remaining members of a room that someone left.
pub struct MemberLeftNotice {
    pub channel: String,
    pub user_name: String,
}

impl MemberLeftNotice {
    pub fn new(user_name: &str) -> Self {
        Self {
            channel: MEMBER_LEFT_CHANNEL.into(),
            user_name: user_name.into(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Tells a member it is now the host of its room.
pub struct ReassignHostNotice {
    pub channel: String,
}

impl Default for ReassignHostNotice {
    fn default() -> Self {
        Self {
            channel: REASSIGN_HOST_CHANNEL.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
/// Per-tick game state relayed between the members of a room.
///
/// Coordinates are fixed-point integers produced by the client. Non-host clients omit the puck
/// and score fields. `userName` and `isHost` are always overwritten by the server.
pub struct GameStateMessage {
    pub channel: String,
    pub user_name: String,
    pub is_host: bool,
    pub team: String,
    pub striker: i64,
    pub player_x_pos: i64,
    pub player_y_pos: i64,
    pub player_x_vel: i64,
    pub player_y_vel: i64,
    pub puck_x_pos: i64,
    pub puck_y_pos: i64,
    pub puck_x_vel: i64,
    pub puck_y_vel: i64,
    pub left_score: i64,
    pub right_score: i64,
}
