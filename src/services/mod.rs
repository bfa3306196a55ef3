/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Lobby operations on rooms.
pub mod room_service;
/// Player connection lifecycle and state relay.
pub mod session_service;
