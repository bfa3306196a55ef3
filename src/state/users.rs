//! Registry of connected users keyed by their unique name.

use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexMap;
use tokio::sync::Mutex as AsyncMutex;
use tracing::info;
use uuid::Uuid;

use crate::state::{
    outbox::Outbox,
    room::Team,
    rooms::{RegistryError, validate_name},
};

/// Shared handle to a registered user.
pub type UserHandle = Arc<User>;

/// Where a user currently sits: its room (by name), team and striker slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub room: String,
    pub team: Team,
    pub striker: usize,
}

/// Why a placement could not be recorded on a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceError {
    /// The user's session is tearing down.
    Departed,
    /// The user already sits in the named room.
    AlreadyPlaced(String),
}

/// A connected player. The room reference is a name resolved through the room registry.
#[derive(Debug)]
pub struct User {
    name: String,
    session_id: Uuid,
    outbox: Outbox,
    seat: Mutex<Seat>,
}

#[derive(Debug, Default)]
struct Seat {
    placement: Option<Placement>,
    departed: bool,
}

impl User {
    /// Create a user bound to the connection behind `outbox`.
    pub fn new(name: impl Into<String>, session_id: Uuid, outbox: Outbox) -> Self {
        Self {
            name: name.into(),
            session_id,
            outbox,
            seat: Mutex::new(Seat::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier of the connection session that registered this user.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Write side of the user's connection.
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Current placement, if the user sits in a room.
    pub fn placement(&self) -> Option<Placement> {
        self.seat().placement.clone()
    }

    /// Name of the room the user currently sits in.
    pub fn room_name(&self) -> Option<String> {
        self.seat().placement.as_ref().map(|p| p.room.clone())
    }

    /// Record the room the user just joined.
    ///
    /// Fails once the session started tearing down, or when the user already sits elsewhere;
    /// the caller must then undo the room membership it created.
    pub fn place(&self, placement: Placement) -> Result<(), PlaceError> {
        let mut seat = self.seat();
        if seat.departed {
            return Err(PlaceError::Departed);
        }
        if let Some(existing) = seat.placement.as_ref() {
            return Err(PlaceError::AlreadyPlaced(existing.room.clone()));
        }
        seat.placement = Some(placement);
        Ok(())
    }

    /// Mark the user as leaving and hand back its last placement.
    ///
    /// After this call [`User::place`] always fails, so no room can gain the user again.
    pub fn depart(&self) -> Option<Placement> {
        let mut seat = self.seat();
        seat.departed = true;
        seat.placement.take()
    }

    fn seat(&self) -> std::sync::MutexGuard<'_, Seat> {
        self.seat.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Concurrent name → user table bounded by the server's user capacity.
#[derive(Debug)]
pub struct UserRegistry {
    users: AsyncMutex<IndexMap<String, UserHandle>>,
    capacity: usize,
    max_name_length: usize,
}

impl UserRegistry {
    pub fn new(capacity: usize, max_name_length: usize) -> Self {
        Self {
            users: AsyncMutex::new(IndexMap::with_capacity(capacity)),
            capacity,
            max_name_length,
        }
    }

    /// Register a new user under `name`.
    pub async fn register(
        &self,
        name: &str,
        session_id: Uuid,
        outbox: Outbox,
    ) -> Result<UserHandle, RegistryError> {
        validate_name("user", name, self.max_name_length)?;

        let mut users = self.users.lock().await;
        if users.len() >= self.capacity {
            return Err(RegistryError::CapacityExceeded {
                kind: "users",
                capacity: self.capacity,
            });
        }
        if users.contains_key(name) {
            return Err(RegistryError::AlreadyExists {
                kind: "user",
                name: name.into(),
            });
        }

        let user = Arc::new(User::new(name, session_id, outbox));
        users.insert(name.to_string(), user.clone());
        info!(user = %name, session = %session_id, "registered user");
        Ok(user)
    }

    /// Find a registered user by name.
    pub async fn lookup(&self, name: &str) -> Result<UserHandle, RegistryError> {
        self.users
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                kind: "user",
                name: name.into(),
            })
    }

    /// Remove a user. Order of the remaining entries is not preserved.
    pub async fn remove(&self, name: &str) -> Result<UserHandle, RegistryError> {
        let removed = self.users.lock().await.swap_remove(name);
        match removed {
            Some(user) => {
                info!(user = %name, "deleted user");
                Ok(user)
            }
            None => Err(RegistryError::NotFound {
                kind: "user",
                name: name.into(),
            }),
        }
    }

    /// Point-in-time copy of every registered user.
    pub async fn snapshot(&self) -> Vec<UserHandle> {
        self.users.lock().await.values().cloned().collect()
    }

    /// Number of registered users.
    pub async fn len(&self) -> usize {
        self.users.lock().await.len()
    }

    /// Whether no user is registered.
    pub async fn is_empty(&self) -> bool {
        self.users.lock().await.is_empty()
    }
}
