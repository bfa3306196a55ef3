//! A single game instance: bounded two-team membership, striker slots, host designation and
//! the relay that fans each member's game state out to the others.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::{
    config::LimitsConfig,
    dto::{
        room::JoinableRoom,
        ws::{GameStateMessage, MemberLeftNotice, ReassignHostNotice},
    },
    state::{outbox::Outbox, rooms::RoomRegistry},
};

/// Shared handle to a live room.
pub type RoomHandle = Arc<Room>;

/// Side of the table a member plays on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Left,
    Right,
}

impl Team {
    /// Parse the wire representation (`"left"` / `"right"`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a membership change on a room is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// The room emptied out and is being torn down.
    #[error("room is closed")]
    Closed,
    /// Every seat in the room is taken.
    #[error("room is full")]
    FullRoom,
    /// The requested team already has its maximum number of players.
    #[error("{0} team is full")]
    TeamFull(Team),
    /// Another member already holds the requested striker slot.
    #[error("striker {0} is taken")]
    StrikerTaken(usize),
    /// The striker slot does not exist in this room.
    #[error("striker {slot} is out of range (expected 0..{max})")]
    InvalidStriker { slot: usize, max: usize },
    /// The user is already a member of this room.
    #[error("user {0} is already in the room")]
    AlreadyMember(String),
    /// The user is not a member of this room.
    #[error("user {0} is not in the room")]
    NotMember(String),
}

/// Seat limits for one room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomLimits {
    pub max_members: usize,
    pub max_per_team: usize,
}

impl From<&LimitsConfig> for RoomLimits {
    fn from(limits: &LimitsConfig) -> Self {
        Self {
            max_members: limits.max_users_per_room,
            max_per_team: limits.max_users_per_team,
        }
    }
}

/// A member's seat inside a room.
#[derive(Debug, Clone)]
pub struct RoomMember {
    pub team: Team,
    pub striker: Option<usize>,
    pub outbox: Outbox,
}

/// What happened when a member left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveOutcome {
    /// Member promoted to host, if the departing member was host.
    pub new_host: Option<String>,
    /// Whether the room emptied and was deleted from the registry.
    pub room_deleted: bool,
}

#[derive(Debug)]
struct RoomState {
    members: IndexMap<String, RoomMember>,
    host: Option<String>,
    left_count: usize,
    right_count: usize,
    closed: bool,
}

impl RoomState {
    fn team_count(&self, team: Team) -> usize {
        match team {
            Team::Left => self.left_count,
            Team::Right => self.right_count,
        }
    }

    fn team_count_mut(&mut self, team: Team) -> &mut usize {
        match team {
            Team::Left => &mut self.left_count,
            Team::Right => &mut self.right_count,
        }
    }

    fn striker_holder(&self, slot: usize) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, member)| member.striker == Some(slot))
            .map(|(name, _)| name.as_str())
    }

    fn check_team(&self, team: Team, limits: RoomLimits) -> Result<(), RoomError> {
        if self.closed {
            return Err(RoomError::Closed);
        }
        if self.team_count(team) >= limits.max_per_team {
            return Err(RoomError::TeamFull(team));
        }
        Ok(())
    }

    fn check_striker(&self, name: &str, slot: usize, limits: RoomLimits) -> Result<(), RoomError> {
        if slot >= limits.max_members {
            return Err(RoomError::InvalidStriker {
                slot,
                max: limits.max_members,
            });
        }
        match self.striker_holder(slot) {
            Some(holder) if holder != name => Err(RoomError::StrikerTaken(slot)),
            _ => Ok(()),
        }
    }

    fn insert(&mut self, name: &str, member: RoomMember, limits: RoomLimits) -> Result<(), RoomError> {
        if self.closed {
            return Err(RoomError::Closed);
        }
        if self.members.len() >= limits.max_members {
            return Err(RoomError::FullRoom);
        }
        if self.members.contains_key(name) {
            return Err(RoomError::AlreadyMember(name.into()));
        }
        self.check_team(member.team, limits)?;

        *self.team_count_mut(member.team) += 1;
        self.members.insert(name.to_string(), member);
        Ok(())
    }

    fn available_strikers(&self, limits: RoomLimits) -> Vec<usize> {
        (0..limits.max_members)
            .filter(|slot| self.striker_holder(*slot).is_none())
            .collect()
    }
}

/// One game instance.
#[derive(Debug)]
pub struct Room {
    name: String,
    limits: RoomLimits,
    state: AsyncMutex<RoomState>,
    relay: Mutex<Option<mpsc::Sender<GameStateMessage>>>,
}

impl Room {
    /// Open a room with `host` as its only member and host.
    ///
    /// Returns the receiving end of the relay channel, to be drained by [`Room::run_relay`].
    pub fn open(
        name: impl Into<String>,
        limits: RoomLimits,
        host: &str,
        member: RoomMember,
    ) -> Result<(RoomHandle, mpsc::Receiver<GameStateMessage>), RoomError> {
        let mut state = RoomState {
            members: IndexMap::with_capacity(limits.max_members),
            host: None,
            left_count: 0,
            right_count: 0,
            closed: false,
        };
        if let Some(slot) = member.striker {
            state.check_striker(host, slot, limits)?;
        }
        state.insert(host, member, limits)?;
        state.host = Some(host.to_string());

        let (relay_tx, relay_rx) = mpsc::channel(1);
        let room = Arc::new(Self {
            name: name.into(),
            limits,
            state: AsyncMutex::new(state),
            relay: Mutex::new(Some(relay_tx)),
        });
        Ok((room, relay_rx))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Seat a user on `team` without a striker slot.
    pub async fn add_member(&self, name: &str, team: Team, outbox: Outbox) -> Result<(), RoomError> {
        let mut state = self.state.lock().await;
        state.insert(
            name,
            RoomMember {
                team,
                striker: None,
                outbox,
            },
            self.limits,
        )?;
        info!(room = %self.name, user = %name, %team, "added member");
        Ok(())
    }

    /// Give `name` the striker `slot`, replacing any slot it held before.
    pub async fn assign_striker(&self, name: &str, slot: usize) -> Result<(), RoomError> {
        let mut state = self.state.lock().await;
        state.check_striker(name, slot, self.limits)?;
        let member = state
            .members
            .get_mut(name)
            .ok_or_else(|| RoomError::NotMember(name.into()))?;
        member.striker = Some(slot);
        Ok(())
    }

    /// Seat a user on `team` holding `striker`, checking team, slot and capacity atomically.
    pub async fn join(
        &self,
        name: &str,
        team: Team,
        striker: usize,
        outbox: Outbox,
    ) -> Result<(), RoomError> {
        let mut state = self.state.lock().await;
        state.check_team(team, self.limits)?;
        state.check_striker(name, striker, self.limits)?;
        state.insert(
            name,
            RoomMember {
                team,
                striker: Some(striker),
                outbox,
            },
            self.limits,
        )?;
        info!(room = %self.name, user = %name, %team, striker, "user joined room");
        Ok(())
    }

    /// Striker slots no current member holds.
    pub async fn available_strikers(&self) -> Vec<usize> {
        self.state.lock().await.available_strikers(self.limits)
    }

    /// Current `(left, right)` team sizes.
    pub async fn team_counts(&self) -> (usize, usize) {
        let state = self.state.lock().await;
        (state.left_count, state.right_count)
    }

    /// Name of the current host.
    pub async fn host(&self) -> Option<String> {
        self.state.lock().await.host.clone()
    }

    /// Member names in joining order.
    pub async fn members(&self) -> Vec<String> {
        self.state.lock().await.members.keys().cloned().collect()
    }

    /// Listing entry for the lobby, or `None` when nobody can join any more.
    pub async fn joinable(&self) -> Option<JoinableRoom> {
        let state = self.state.lock().await;
        let can_join_left = state.left_count < self.limits.max_per_team;
        let can_join_right = state.right_count < self.limits.max_per_team;
        if state.closed || !(can_join_left || can_join_right) {
            return None;
        }
        Some(JoinableRoom {
            room_name: self.name.clone(),
            can_join_left_team: can_join_left,
            can_join_right_team: can_join_right,
            available_strikers: state.available_strikers(self.limits),
        })
    }

    /// Remove a member, hand the host role on if needed, tell the others, and delete the
    /// room from `rooms` once it is empty.
    pub async fn remove_member(
        &self,
        name: &str,
        rooms: &RoomRegistry,
    ) -> Result<RemoveOutcome, RoomError> {
        let mut state = self.state.lock().await;

        let Some(leaving) = state.members.shift_remove(name) else {
            return Err(RoomError::NotMember(name.into()));
        };
        *state.team_count_mut(leaving.team) -= 1;

        let mut new_host = None;
        if state.host.as_deref() == Some(name) {
            state.host = self.reassign_host(&state.members, name);
            new_host = state.host.clone();
        }

        self.broadcast_member_left(&state.members, name);
        info!(room = %self.name, user = %name, "deleted member");

        let room_deleted = state.members.is_empty();
        if room_deleted {
            state.closed = true;
            if let Err(err) = rooms.remove(&self.name).await {
                warn!(room = %self.name, error = %err, "failed to delete empty room");
            }
        }

        Ok(RemoveOutcome {
            new_host,
            room_deleted,
        })
    }

    /// Promote the first remaining member, in joining order, that accepts the notification.
    /// When nobody can be reached the longest-standing member still becomes host.
    fn reassign_host(
        &self,
        members: &IndexMap<String, RoomMember>,
        previous: &str,
    ) -> Option<String> {
        let notice = ReassignHostNotice::default();
        for (candidate, member) in members {
            match member.outbox.send_json(&notice) {
                Ok(()) => {
                    info!(room = %self.name, from = %previous, to = %candidate, "reassigned host");
                    return Some(candidate.clone());
                }
                Err(err) => {
                    warn!(
                        room = %self.name,
                        from = %previous,
                        to = %candidate,
                        error = %err,
                        "failed to notify host candidate"
                    );
                }
            }
        }

        let (fallback, _) = members.first()?;
        warn!(room = %self.name, to = %fallback, "no host candidate reachable; keeping oldest member");
        Some(fallback.clone())
    }

    fn broadcast_member_left(&self, members: &IndexMap<String, RoomMember>, leaving: &str) {
        let notice = MemberLeftNotice::new(leaving);
        for (name, member) in members {
            if let Err(err) = member.outbox.send_json(&notice) {
                warn!(
                    room = %self.name,
                    user = %name,
                    left = %leaving,
                    error = %err,
                    "failed to notify member about departure"
                );
            }
        }
    }

    /// Hand a member's state to the broadcast worker, waiting while it is busy.
    ///
    /// Returns `false` when the room is closing and the message was dropped.
    pub async fn relay(&self, message: GameStateMessage) -> bool {
        let sender = self
            .relay
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match sender {
            Some(sender) => sender.send(message).await.is_ok(),
            None => false,
        }
    }

    /// Close the relay channel so the broadcast worker stops once drained.
    pub fn close_relay(&self) {
        self.relay
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Write `message` to every member except its sender, flagging whether the sender is host.
    ///
    /// Returns the number of members the message was handed to.
    pub async fn fan_out(&self, mut message: GameStateMessage) -> usize {
        let state = self.state.lock().await;
        if state.members.len() <= 1 {
            return 0;
        }

        message.is_host = state.host.as_deref() == Some(message.user_name.as_str());
        let payload = match serde_json::to_string(&message) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(room = %self.name, error = %err, "failed to encode state");
                return 0;
            }
        };

        let mut delivered = 0;
        for (name, member) in state.members.iter() {
            if *name == message.user_name {
                continue;
            }
            match member.outbox.send_text(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => warn!(
                    room = %self.name,
                    from = %message.user_name,
                    to = %name,
                    error = %err,
                    "failed to send state"
                ),
            }
        }
        delivered
    }

    /// Broadcast worker: drain the relay channel until it is closed.
    pub async fn run_relay(self: Arc<Self>, mut relay_rx: mpsc::Receiver<GameStateMessage>) {
        debug!(room = %self.name, "relay worker started");
        while let Some(message) = relay_rx.recv().await {
            self.fan_out(message).await;
        }
        debug!(room = %self.name, "relay worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::ws::Message;
    use tokio::sync::mpsc::Receiver;

    use super::*;
    use crate::config::LimitsConfig;

    const LIMITS: RoomLimits = RoomLimits {
        max_members: 4,
        max_per_team: 2,
    };

    fn member(team: Team, striker: Option<usize>) -> (RoomMember, Receiver<Message>) {
        let (outbox, rx) = Outbox::channel();
        (
            RoomMember {
                team,
                striker,
                outbox,
            },
            rx,
        )
    }

    fn drain(rx: &mut Receiver<Message>) -> Vec<serde_json::Value> {
        let mut frames = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let Message::Text(text) = message {
                frames.push(serde_json::from_str(text.as_str()).unwrap());
            }
        }
        frames
    }

    fn registry() -> RoomRegistry {
        RoomRegistry::new(&LimitsConfig::default())
    }

    #[tokio::test]
    async fn add_member_enforces_team_and_room_caps() {
        let (host, _host_rx) = member(Team::Left, Some(0));
        let (room, _relay) = Room::open("r1", LIMITS, "a", host).unwrap();

        room.add_member("b", Team::Left, Outbox::channel().0).await.unwrap();
        assert_eq!(
            room.add_member("c", Team::Left, Outbox::channel().0).await,
            Err(RoomError::TeamFull(Team::Left))
        );
        room.add_member("c", Team::Right, Outbox::channel().0).await.unwrap();
        room.add_member("d", Team::Right, Outbox::channel().0).await.unwrap();
        assert_eq!(
            room.add_member("e", Team::Right, Outbox::channel().0).await,
            Err(RoomError::FullRoom)
        );
        assert_eq!(room.team_counts().await, (2, 2));
    }

    #[tokio::test]
    async fn add_member_succeeds_iff_room_and_team_have_space() {
        let limits = RoomLimits {
            max_members: 3,
            max_per_team: 2,
        };
        let (host, _rx) = member(Team::Left, None);
        let (room, _relay) = Room::open("r", limits, "m0", host).unwrap();

        for index in 1..6 {
            let team = if index % 2 == 0 { Team::Left } else { Team::Right };
            let (left, right) = room.team_counts().await;
            let len = room.members().await.len();
            let team_count = if team == Team::Left { left } else { right };
            let expected = len < limits.max_members && team_count < limits.max_per_team;

            let result = room
                .add_member(&format!("m{index}"), team, Outbox::channel().0)
                .await;
            assert_eq!(result.is_ok(), expected, "member {index} on {team}");

            let (left, right) = room.team_counts().await;
            assert_eq!(left + right, room.members().await.len());
        }
    }

    #[tokio::test]
    async fn strikers_are_exclusive_and_listed_as_complement() {
        let (host, _rx) = member(Team::Left, Some(2));
        let (room, _relay) = Room::open("r1", LIMITS, "a", host).unwrap();
        assert_eq!(room.available_strikers().await, vec![0, 1, 3]);

        room.add_member("b", Team::Right, Outbox::channel().0).await.unwrap();
        assert_eq!(
            room.assign_striker("b", 2).await,
            Err(RoomError::StrikerTaken(2))
        );
        room.assign_striker("b", 0).await.unwrap();
        // Moving to another slot frees the previous one.
        room.assign_striker("b", 3).await.unwrap();
        assert_eq!(room.available_strikers().await, vec![0, 1]);

        assert_eq!(
            room.assign_striker("b", 4).await,
            Err(RoomError::InvalidStriker { slot: 4, max: 4 })
        );
        assert_eq!(
            room.assign_striker("ghost", 1).await,
            Err(RoomError::NotMember("ghost".into()))
        );
    }

    #[tokio::test]
    async fn join_checks_team_before_striker() {
        let (host, _rx) = member(Team::Left, Some(0));
        let (room, _relay) = Room::open("r1", LIMITS, "a", host).unwrap();
        room.join("b", Team::Left, 1, Outbox::channel().0).await.unwrap();

        assert_eq!(
            room.join("c", Team::Left, 0, Outbox::channel().0).await,
            Err(RoomError::TeamFull(Team::Left))
        );
        assert_eq!(
            room.join("c", Team::Right, 0, Outbox::channel().0).await,
            Err(RoomError::StrikerTaken(0))
        );
        room.join("c", Team::Right, 2, Outbox::channel().0).await.unwrap();
        assert_eq!(room.team_counts().await, (2, 1));
    }

    #[tokio::test]
    async fn fan_out_skips_sender_and_flags_host() {
        let (host, mut host_rx) = member(Team::Left, Some(0));
        let (room, _relay) = Room::open("r1", LIMITS, "a", host).unwrap();
        let (b, mut b_rx) = member(Team::Left, None);
        let (c, mut c_rx) = member(Team::Right, None);
        room.add_member("b", b.team, b.outbox).await.unwrap();
        room.add_member("c", c.team, c.outbox).await.unwrap();

        let from_host = GameStateMessage {
            user_name: "a".into(),
            is_host: false,
            ..Default::default()
        };
        assert_eq!(room.fan_out(from_host).await, 2);
        assert!(drain(&mut host_rx).is_empty());
        assert_eq!(drain(&mut b_rx)[0]["isHost"], true);
        assert_eq!(drain(&mut c_rx)[0]["isHost"], true);

        let spoofed = GameStateMessage {
            user_name: "b".into(),
            is_host: true,
            ..Default::default()
        };
        assert_eq!(room.fan_out(spoofed).await, 2);
        assert!(drain(&mut b_rx).is_empty());
        assert_eq!(drain(&mut host_rx)[0]["isHost"], false);
        assert_eq!(drain(&mut c_rx)[0]["isHost"], false);
    }

    #[tokio::test]
    async fn fan_out_discards_when_alone_and_survives_dead_peers() {
        let (host, _host_rx) = member(Team::Left, None);
        let (room, _relay) = Room::open("r1", LIMITS, "a", host).unwrap();
        let message = GameStateMessage {
            user_name: "a".into(),
            ..Default::default()
        };
        assert_eq!(room.fan_out(message.clone()).await, 0);

        // "b" has no writer any more; "c" must still receive the state.
        room.add_member("b", Team::Left, Outbox::channel().0).await.unwrap();
        let (c, mut c_rx) = member(Team::Right, None);
        room.add_member("c", c.team, c.outbox).await.unwrap();

        assert_eq!(room.fan_out(message).await, 1);
        assert_eq!(drain(&mut c_rx).len(), 1);
    }

    #[tokio::test]
    async fn fan_out_skips_peers_whose_queue_is_full() {
        let (host, _host_rx) = member(Team::Left, None);
        let (room, _relay) = Room::open("r1", LIMITS, "a", host).unwrap();
        let (stalled, mut stalled_rx) = Outbox::with_capacity(1);
        stalled.ping().unwrap();
        room.add_member("b", Team::Left, stalled).await.unwrap();
        let (c, mut c_rx) = member(Team::Right, None);
        room.add_member("c", c.team, c.outbox).await.unwrap();

        let message = GameStateMessage {
            user_name: "a".into(),
            ..Default::default()
        };
        assert_eq!(room.fan_out(message.clone()).await, 1);
        assert_eq!(drain(&mut c_rx).len(), 1);

        assert!(matches!(stalled_rx.try_recv(), Ok(Message::Ping(_))));
        assert_eq!(room.fan_out(message).await, 2);
        assert_eq!(drain(&mut stalled_rx).len(), 1);
    }

    #[tokio::test]
    async fn host_departure_promotes_first_reachable_member() {
        let rooms = registry();
        let (host, _host_rx) = member(Team::Left, Some(0));
        let room = rooms.create("r1", "host", host).await.unwrap();

        let (b, mut b_rx) = member(Team::Left, None);
        let (c, mut c_rx) = member(Team::Right, None);
        room.add_member("b", b.team, b.outbox).await.unwrap();
        room.add_member("c", c.team, c.outbox).await.unwrap();

        let outcome = room.remove_member("host", &rooms).await.unwrap();
        assert_eq!(outcome.new_host.as_deref(), Some("b"));
        assert!(!outcome.room_deleted);
        assert_eq!(room.host().await.as_deref(), Some("b"));
        assert_eq!(room.members().await, ["b", "c"]);
        assert_eq!(room.team_counts().await, (1, 1));

        let b_frames = drain(&mut b_rx);
        assert_eq!(b_frames[0]["channel"], "reassignHost");
        assert_eq!(b_frames[1]["channel"], "memberLeft");
        assert_eq!(b_frames[1]["userName"], "host");

        let c_frames = drain(&mut c_rx);
        assert_eq!(c_frames.len(), 1);
        assert_eq!(c_frames[0]["channel"], "memberLeft");
    }

    #[tokio::test]
    async fn unreachable_candidates_are_skipped_for_host() {
        let rooms = registry();
        let (host, _host_rx) = member(Team::Left, None);
        let room = rooms.create("r1", "host", host).await.unwrap();

        room.add_member("b", Team::Left, Outbox::channel().0).await.unwrap();
        let (c, _c_rx) = member(Team::Right, None);
        room.add_member("c", c.team, c.outbox).await.unwrap();

        let outcome = room.remove_member("host", &rooms).await.unwrap();
        assert_eq!(outcome.new_host.as_deref(), Some("c"));

        // Nobody reachable: the oldest remaining member keeps the role.
        room.remove_member("c", &rooms).await.unwrap();
        assert_eq!(room.host().await.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn last_member_leaving_deletes_room() {
        let rooms = registry();
        let (host, _rx) = member(Team::Left, None);
        let room = rooms.create("r1", "a", host).await.unwrap();

        let outcome = room.remove_member("a", &rooms).await.unwrap();
        assert!(outcome.room_deleted);
        assert!(rooms.find("r1").await.is_err());
        assert_eq!(
            room.add_member("b", Team::Left, Outbox::channel().0).await,
            Err(RoomError::Closed)
        );
        assert!(!room.relay(GameStateMessage::default()).await);
        assert_eq!(
            room.remove_member("a", &rooms).await,
            Err(RoomError::NotMember("a".into()))
        );
    }

    #[tokio::test]
    async fn relay_worker_delivers_to_other_members() {
        let rooms = registry();
        let (host, mut host_rx) = member(Team::Left, None);
        let room = rooms.create("r1", "a", host).await.unwrap();
        let (b, mut b_rx) = member(Team::Right, None);
        room.add_member("b", b.team, b.outbox).await.unwrap();

        let message = GameStateMessage {
            channel: "state".into(),
            user_name: "b".into(),
            player_x_pos: 42,
            ..Default::default()
        };
        assert!(room.relay(message).await);

        let frame = tokio::time::timeout(std::time::Duration::from_secs(1), host_rx.recv())
            .await
            .unwrap()
            .unwrap();
        let Message::Text(text) = frame else {
            panic!("expected a text frame");
        };
        let relayed: GameStateMessage = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(relayed.player_x_pos, 42);
        assert!(!relayed.is_host);
        assert!(b_rx.try_recv().is_err());
    }
}
