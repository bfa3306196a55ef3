//! Application-level configuration loading: listener, capacity limits, WebSocket guards and
//! admission-control windows.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PUCK_RELAY_CONFIG_PATH";

const SECOND: u64 = 1;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Number of requests a single browser visit issues against the mutating endpoints.
const REQUESTS_PER_VISIT: f64 = 25.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// TCP port the HTTP listener binds to.
    pub port: u16,
    /// Directory holding the static game client served under `/public`.
    pub public_dir: PathBuf,
    /// Optional log sink; when set, logs are appended to this file instead of stdout.
    pub log_file: Option<PathBuf>,
    /// Capacity limits for users and rooms.
    pub limits: LimitsConfig,
    /// Guards installed on every persistent connection.
    pub websocket: WebSocketConfig,
    /// Rate and resource-budget windows applied to mutating requests.
    pub throttle: ThrottleConfig,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        if let Some(port) = env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
        {
            config.port = port;
        }

        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            public_dir: PathBuf::from("public"),
            log_file: None,
            limits: LimitsConfig::default(),
            websocket: WebSocketConfig::default(),
            throttle: ThrottleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// Capacity limits enforced by the user and room registries.
pub struct LimitsConfig {
    /// Longest accepted user name, in bytes.
    pub max_user_name_length: usize,
    /// Longest accepted room name, in bytes.
    pub max_room_name_length: usize,
    /// Maximum number of rooms alive at once.
    pub max_room_count: usize,
    /// Maximum members per room; also the number of striker slots.
    pub max_users_per_room: usize,
    /// Maximum members per team inside a room.
    pub max_users_per_team: usize,
    /// Maximum accepted request body size for the plain endpoints, in bytes.
    pub max_payload_size: usize,
}

impl LimitsConfig {
    /// Users the server can hold: every room filled to capacity.
    pub fn max_user_count(&self) -> usize {
        self.max_room_count * self.max_users_per_room
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_user_name_length: 10,
            max_room_name_length: 10,
            max_room_count: 16,
            max_users_per_room: 4,
            max_users_per_team: 2,
            max_payload_size: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// Guards applied to each persistent connection.
pub struct WebSocketConfig {
    /// Largest accepted inbound message, in bytes.
    pub read_limit: usize,
    /// Seconds of silence after which a connection is dropped.
    pub idle_timeout_secs: u64,
    /// Seconds between heartbeat pings; must stay below the idle timeout.
    pub ping_period_secs: u64,
    /// Frames queued for a peer before further sends to it are dropped.
    pub outbox_capacity: usize,
}

impl WebSocketConfig {
    /// Read deadline measured from the last inbound frame.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Heartbeat period, clamped so a ping always lands inside one idle interval.
    pub fn ping_period(&self) -> Duration {
        let period = self
            .ping_period_secs
            .clamp(1, self.idle_timeout_secs.saturating_sub(1).max(1));
        Duration::from_secs(period)
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            read_limit: 1024,
            idle_timeout_secs: 60,
            ping_period_secs: 54,
            outbox_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// Admission-control windows; rate windows are evaluated before budget windows.
pub struct ThrottleConfig {
    /// Request-count windows, in evaluation order.
    pub rate: Vec<WindowConfig>,
    /// Abstract budget consumed by every admitted request.
    pub budget_cost_per_request: f64,
    /// Budget windows, in evaluation order.
    pub budget: Vec<WindowConfig>,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        let per_second = 2.0 * REQUESTS_PER_VISIT;
        let per_minute = 10.0 * REQUESTS_PER_VISIT;
        let per_hour = 10.0 * per_minute;
        let per_day = 2.0 * per_hour;

        Self {
            rate: vec![
                WindowConfig::new(SECOND, per_second),
                WindowConfig::new(MINUTE, per_minute),
                WindowConfig::new(HOUR, per_hour),
                WindowConfig::new(DAY, per_day),
            ],
            // 500 bytes per request, expressed in gibibytes.
            budget_cost_per_request: 500.0 / 1_000_000_000.0,
            budget: vec![
                WindowConfig::new(DAY, 7.0),
                WindowConfig::new(30 * DAY, 100.0),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
/// One fixed window: its length and how much may be consumed inside it.
pub struct WindowConfig {
    /// Window length in seconds.
    pub window_secs: u64,
    /// Total usage admitted per window.
    pub allowed: f64,
}

impl WindowConfig {
    /// Build a window entry from a length in seconds and an allowance.
    pub const fn new(window_secs: u64, allowed: f64) -> Self {
        Self {
            window_secs,
            allowed,
        }
    }

    /// Window length as a [`Duration`].
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
