use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Health status; always "ok" while the process serves requests.
    pub status: String,
    /// Users currently registered.
    pub users: usize,
    /// Rooms currently live.
    pub rooms: usize,
    /// RFC 3339 timestamp of process start.
    pub started_at: String,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(users: usize, rooms: usize, started_at: String) -> Self {
        Self {
            status: "ok".to_string(),
            users,
            rooms,
            started_at,
        }
    }
}
