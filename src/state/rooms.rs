//! Registry of live rooms keyed by their unique name. Owns each room's broadcast worker.

use indexmap::IndexMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::{
    config::LimitsConfig,
    dto::room::JoinableRoom,
    state::room::{Room, RoomError, RoomHandle, RoomLimits, RoomMember},
};

/// Failures shared by the user and room registries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Name is empty or longer than allowed.
    #[error("{kind} name {reason}")]
    InvalidName { kind: &'static str, reason: String },
    /// The registry already holds its maximum number of entries.
    #[error("server already maintains max number of {kind} ({capacity})")]
    CapacityExceeded { kind: &'static str, capacity: usize },
    /// An entry with that name already exists.
    #[error("{kind} with name {name} already exists")]
    AlreadyExists { kind: &'static str, name: String },
    /// No entry with that name exists.
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },
    /// The room could not seat its creator.
    #[error(transparent)]
    Room(#[from] RoomError),
}

/// Reject empty names and names longer than `max_length` bytes.
pub fn validate_name(kind: &'static str, name: &str, max_length: usize) -> Result<(), RegistryError> {
    if name.is_empty() {
        return Err(RegistryError::InvalidName {
            kind,
            reason: "cannot be empty".into(),
        });
    }
    if name.len() > max_length {
        return Err(RegistryError::InvalidName {
            kind,
            reason: format!("cannot be more than {max_length} characters"),
        });
    }
    Ok(())
}

/// Concurrent name → room table bounded by the server's room capacity.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: Mutex<IndexMap<String, RoomHandle>>,
    capacity: usize,
    max_name_length: usize,
    room_limits: RoomLimits,
}

impl RoomRegistry {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            rooms: Mutex::new(IndexMap::with_capacity(limits.max_room_count)),
            capacity: limits.max_room_count,
            max_name_length: limits.max_room_name_length,
            room_limits: limits.into(),
        }
    }

    /// Open a room hosted by `host` and start its broadcast worker.
    pub async fn create(
        &self,
        name: &str,
        host: &str,
        member: RoomMember,
    ) -> Result<RoomHandle, RegistryError> {
        validate_name("room", name, self.max_name_length)?;

        let mut rooms = self.rooms.lock().await;
        if rooms.len() >= self.capacity {
            return Err(RegistryError::CapacityExceeded {
                kind: "rooms",
                capacity: self.capacity,
            });
        }
        if rooms.contains_key(name) {
            return Err(RegistryError::AlreadyExists {
                kind: "room",
                name: name.into(),
            });
        }

        let (room, relay_rx) = Room::open(name, self.room_limits, host, member)?;
        rooms.insert(name.to_string(), room.clone());
        tokio::spawn(room.clone().run_relay(relay_rx));

        info!(room = %name, host = %host, "created room");
        Ok(room)
    }

    /// Find a live room by name.
    pub async fn find(&self, name: &str) -> Result<RoomHandle, RegistryError> {
        self.rooms
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                kind: "room",
                name: name.into(),
            })
    }

    /// Delete a room, closing its relay channel so the broadcast worker winds down.
    pub async fn remove(&self, name: &str) -> Result<(), RegistryError> {
        let mut rooms = self.rooms.lock().await;
        let Some(room) = rooms.get(name) else {
            return Err(RegistryError::NotFound {
                kind: "room",
                name: name.into(),
            });
        };
        room.close_relay();
        rooms.swap_remove(name);
        info!(room = %name, "deleted room");
        Ok(())
    }

    /// Rooms with at least one open seat on either team.
    ///
    /// The registry lock is released before any room is inspected.
    pub async fn joinable_rooms(&self) -> Vec<JoinableRoom> {
        let rooms = self.snapshot().await;
        let mut joinable = Vec::with_capacity(rooms.len());
        for room in rooms {
            if let Some(entry) = room.joinable().await {
                joinable.push(entry);
            }
        }
        joinable
    }

    /// Point-in-time copy of every live room.
    pub async fn snapshot(&self) -> Vec<RoomHandle> {
        self.rooms.lock().await.values().cloned().collect()
    }

    /// Number of live rooms.
    pub async fn len(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Whether no room is live.
    pub async fn is_empty(&self) -> bool {
        self.rooms.lock().await.is_empty()
    }
}
