pub mod limiter;
pub mod outbox;
pub mod room;
pub mod rooms;
pub mod session;
pub mod throttle;
pub mod users;

use std::{sync::Arc, time::SystemTime};

use crate::config::AppConfig;

pub use self::outbox::{Outbox, TransportError};
pub use self::room::{RoomHandle, Team};
pub use self::users::UserHandle;
use self::{rooms::RoomRegistry, throttle::ThrottleGate, users::UserRegistry};

pub type SharedState = Arc<AppState>;

/// Central application state: registries, admission gate and configuration.
///
/// Built once at startup and handed to every route and session by reference.
pub struct AppState {
    config: Arc<AppConfig>,
    users: UserRegistry,
    rooms: RoomRegistry,
    throttle: ThrottleGate,
    started_at: SystemTime,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig) -> SharedState {
        let limits = config.limits;
        Arc::new(Self {
            users: UserRegistry::new(limits.max_user_count(), limits.max_user_name_length),
            rooms: RoomRegistry::new(&limits),
            throttle: ThrottleGate::from_config(&config.throttle),
            config: Arc::new(config),
            started_at: SystemTime::now(),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Registry of connected users keyed by name.
    pub fn users(&self) -> &UserRegistry {
        &self.users
    }

    /// Registry of live rooms keyed by name.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Process-wide admission gate for mutating requests.
    pub fn throttle(&self) -> &ThrottleGate {
        &self.throttle
    }

    /// When the process started serving.
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }
}
