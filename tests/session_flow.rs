use std::{net::SocketAddr, time::Duration};

use futures::{SinkExt, StreamExt};
use puck_relay::{
    config::{AppConfig, WindowConfig},
    dto::room::RoomRequest,
    routes,
    services::room_service,
    state::{AppState, SharedState},
};
use serde_json::{Value, json};
use tokio::{
    net::{TcpListener, TcpStream},
    time::{sleep, timeout},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(config: AppConfig) -> (SharedState, SocketAddr) {
    let state = AppState::new(config);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = routes::router(state.clone());
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (state, addr)
}

async fn open(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/user")).await.unwrap();
    client
}

async fn send_json(client: &mut Client, value: Value) {
    client.send(Message::text(value.to_string())).await.unwrap();
}

/// Next text frame from the server, skipping heartbeats.
async fn next_json(client: &mut Client) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("frame within two seconds")
            .expect("connection still open")
            .unwrap();
        match frame {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

async fn handshake(addr: SocketAddr, name: &str) -> (Client, Value) {
    let mut client = open(addr).await;
    send_json(&mut client, json!({ "channel": "handshake", "userName": name })).await;
    let reply = next_json(&mut client).await;
    (client, reply)
}

/// Read until the server closes the connection.
async fn closed_by_server(client: &mut Client) -> bool {
    let drained = timeout(Duration::from_secs(5), async {
        while let Some(frame) = client.next().await {
            match frame {
                Ok(Message::Close(_)) | Err(_) => return,
                Ok(_) => continue,
            }
        }
    })
    .await;
    drained.is_ok()
}

async fn eventually<F, Fut>(state: &SharedState, condition: F) -> bool
where
    F: Fn(SharedState) -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if condition(state.clone()).await {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

fn request(room: &str, user: &str, team: &str, striker: usize) -> RoomRequest {
    RoomRequest {
        room_name: room.into(),
        user_name: user.into(),
        team: team.into(),
        striker,
    }
}

#[tokio::test]
async fn handshake_registers_the_user() {
    let (state, addr) = serve(AppConfig::default()).await;
    let (_client, reply) = handshake(addr, "alice").await;

    assert_eq!(reply["channel"], "handshake");
    assert_eq!(reply["isSuccess"], true);
    assert_eq!(reply["message"], "Created user alice");
    assert!(state.users().lookup("alice").await.is_ok());
}

#[tokio::test]
async fn handshake_on_another_channel_is_refused() {
    let (state, addr) = serve(AppConfig::default()).await;
    let mut client = open(addr).await;
    send_json(&mut client, json!({ "channel": "state", "userName": "alice" })).await;

    let reply = next_json(&mut client).await;
    assert_eq!(reply["isSuccess"], false);
    assert_eq!(reply["message"], "wrong channel used for handshake");
    assert!(closed_by_server(&mut client).await);
    assert!(state.users().is_empty().await);
}

#[tokio::test]
async fn duplicate_name_is_refused_and_first_user_kept() {
    let (state, addr) = serve(AppConfig::default()).await;
    let (_first, reply) = handshake(addr, "alice").await;
    assert_eq!(reply["isSuccess"], true);

    let (mut second, reply) = handshake(addr, "alice").await;
    assert_eq!(reply["isSuccess"], false);
    assert_eq!(reply["message"], "user with name alice already exists");
    assert!(closed_by_server(&mut second).await);
    assert_eq!(state.users().len().await, 1);
}

#[tokio::test]
async fn missing_user_name_reports_the_registry_reason() {
    let (_state, addr) = serve(AppConfig::default()).await;
    let mut client = open(addr).await;
    send_json(&mut client, json!({ "channel": "handshake" })).await;

    let reply = next_json(&mut client).await;
    assert_eq!(reply["isSuccess"], false);
    assert_eq!(reply["message"], "user name cannot be empty");
}

#[tokio::test]
async fn relayed_state_carries_the_registered_name() {
    let (state, addr) = serve(AppConfig::default()).await;
    let (mut alice, _) = handshake(addr, "alice").await;
    let (mut bob, _) = handshake(addr, "bob").await;
    room_service::create_room(&state, request("r1", "alice", "left", 0))
        .await
        .unwrap();
    room_service::join_room(&state, request("r1", "bob", "right", 1))
        .await
        .unwrap();

    // Claiming to be bob must not redirect the update away from bob.
    send_json(
        &mut alice,
        json!({ "channel": "state", "userName": "bob", "team": "left", "puckXPos": 7 }),
    )
    .await;

    let frame = next_json(&mut bob).await;
    assert_eq!(frame["channel"], "state");
    assert_eq!(frame["userName"], "alice");
    assert_eq!(frame["isHost"], true);
    assert_eq!(frame["puckXPos"], 7);
}

#[tokio::test]
async fn teardown_leaves_the_room_before_the_registry() {
    let (state, addr) = serve(AppConfig::default()).await;
    let (mut alice, _) = handshake(addr, "alice").await;
    let (mut bob, _) = handshake(addr, "bob").await;
    room_service::create_room(&state, request("r1", "alice", "left", 0))
        .await
        .unwrap();
    room_service::join_room(&state, request("r1", "bob", "right", 1))
        .await
        .unwrap();

    alice.close(None).await.unwrap();
    assert!(
        eventually(&state, |state| async move {
            state.users().lookup("alice").await.is_err()
        })
        .await
    );

    let room = state.rooms().find("r1").await.unwrap();
    assert_eq!(room.members().await, ["bob"]);
    assert_eq!(room.host().await.as_deref(), Some("bob"));
    assert_eq!(next_json(&mut bob).await["channel"], "reassignHost");
    let left = next_json(&mut bob).await;
    assert_eq!(left["channel"], "memberLeft");
    assert_eq!(left["userName"], "alice");

    bob.close(None).await.unwrap();
    assert!(
        eventually(&state, |state| async move {
            state.users().is_empty().await
        })
        .await
    );
    assert!(state.rooms().is_empty().await);
}

#[tokio::test]
async fn silent_peer_is_dropped_after_idle_timeout() {
    let mut config = AppConfig::default();
    config.websocket.idle_timeout_secs = 1;
    let (state, addr) = serve(config).await;
    let (_client, reply) = handshake(addr, "alice").await;
    assert_eq!(reply["isSuccess"], true);

    // The client is not polled, so heartbeats go unanswered.
    sleep(Duration::from_millis(300)).await;
    assert!(state.users().lookup("alice").await.is_ok());
    assert!(
        eventually(&state, |state| async move {
            state.users().is_empty().await
        })
        .await
    );
}

#[tokio::test]
async fn exhausted_budget_ends_the_session() {
    let mut config = AppConfig::default();
    config.throttle.budget_cost_per_request = 1.0;
    // One unit goes to the upgrade request, one to the first state message.
    config.throttle.budget = vec![WindowConfig::new(3600, 2.0)];
    let (state, addr) = serve(config).await;
    let (mut alice, reply) = handshake(addr, "alice").await;
    assert_eq!(reply["isSuccess"], true);

    send_json(&mut alice, json!({ "channel": "state", "puckXPos": 1 })).await;
    assert!(state.users().lookup("alice").await.is_ok());
    send_json(&mut alice, json!({ "channel": "state", "puckXPos": 2 })).await;

    assert!(closed_by_server(&mut alice).await);
    assert!(
        eventually(&state, |state| async move {
            state.users().is_empty().await
        })
        .await
    );
}
