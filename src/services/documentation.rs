use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the puck relay server.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::list_rooms,
        crate::routes::rooms::create_room,
        crate::routes::rooms::join_room,
        crate::routes::user::user_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::RoomRequest,
            crate::dto::room::RoomMembershipResponse,
            crate::dto::room::JoinableRoom,
            crate::dto::ws::HandshakeRequest,
            crate::dto::ws::HandshakeResponse,
            crate::dto::ws::MemberLeftNotice,
            crate::dto::ws::ReassignHostNotice,
            crate::dto::ws::GameStateMessage,
            crate::state::room::Team,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Lobby operations: list, create and join rooms"),
        (name = "players", description = "WebSocket session carrying handshake and game state"),
    )
)]
pub struct ApiDoc;
