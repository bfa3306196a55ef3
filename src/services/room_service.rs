use tracing::{info, warn};

use crate::{
    dto::room::{JoinableRoom, RoomMembershipResponse, RoomRequest},
    error::ServiceError,
    state::{
        RoomHandle, SharedState, Team,
        room::RoomMember,
        users::{PlaceError, Placement, UserHandle},
    },
};

/// Rooms that still have a free seat on at least one team.
pub async fn list_rooms(state: &SharedState) -> Vec<JoinableRoom> {
    state.rooms().joinable_rooms().await
}

/// Open a new room with the requesting user as its only member and host.
pub async fn create_room(
    state: &SharedState,
    request: RoomRequest,
) -> Result<RoomMembershipResponse, ServiceError> {
    let team = requested_team(&request)?;
    let user = state
        .users()
        .lookup(&request.user_name)
        .await
        .map_err(|_| ServiceError::CreatorNotFound(request.user_name.clone()))?;
    ensure_unplaced(&user)?;

    let room = state
        .rooms()
        .create(
            &request.room_name,
            user.name(),
            RoomMember {
                team,
                striker: Some(request.striker),
                outbox: user.outbox().clone(),
            },
        )
        .await?;

    seat_user(state, &room, &user, team, request.striker).await?;
    info!(room = %request.room_name, user = %request.user_name, %team, "room opened");

    Ok(RoomMembershipResponse {
        room_name: request.room_name,
        user_name: request.user_name,
        team,
        striker: request.striker,
        is_host: true,
    })
}

/// Seat the requesting user in an existing room on the requested team and striker.
pub async fn join_room(
    state: &SharedState,
    request: RoomRequest,
) -> Result<RoomMembershipResponse, ServiceError> {
    let team = requested_team(&request)?;
    let room = state.rooms().find(&request.room_name).await?;
    let user = state.users().lookup(&request.user_name).await?;
    ensure_unplaced(&user)?;

    room.join(user.name(), team, request.striker, user.outbox().clone())
        .await?;
    seat_user(state, &room, &user, team, request.striker).await?;

    let is_host = room.host().await.as_deref() == Some(user.name());
    Ok(RoomMembershipResponse {
        room_name: request.room_name,
        user_name: request.user_name,
        team,
        striker: request.striker,
        is_host,
    })
}

fn requested_team(request: &RoomRequest) -> Result<Team, ServiceError> {
    request
        .team()
        .ok_or_else(|| ServiceError::Validation(format!("unknown team `{}`", request.team)))
}

fn ensure_unplaced(user: &UserHandle) -> Result<(), ServiceError> {
    match user.room_name() {
        Some(room) => Err(ServiceError::Validation(format!(
            "user {} is already in room {room}",
            user.name()
        ))),
        None => Ok(()),
    }
}

/// Record the new membership on the user, undoing the room seat when the user is gone
/// or was placed elsewhere concurrently.
async fn seat_user(
    state: &SharedState,
    room: &RoomHandle,
    user: &UserHandle,
    team: Team,
    striker: usize,
) -> Result<(), ServiceError> {
    let placement = Placement {
        room: room.name().to_string(),
        team,
        striker,
    };
    let Err(err) = user.place(placement) else {
        return Ok(());
    };

    warn!(room = %room.name(), user = %user.name(), error = ?err, "rolling back membership");
    if let Err(rollback) = room.remove_member(user.name(), state.rooms()).await {
        warn!(room = %room.name(), user = %user.name(), error = %rollback, "rollback failed");
    }

    Err(match err {
        PlaceError::Departed => ServiceError::NotFound(format!("user {} not found", user.name())),
        PlaceError::AlreadyPlaced(other) => ServiceError::Validation(format!(
            "user {} is already in room {other}",
            user.name()
        )),
    })
}
