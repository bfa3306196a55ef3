use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use thiserror::Error;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{MissedTickBehavior, interval_at, timeout},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Upper bound on flushing the final frames before the writer is aborted.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

use crate::{
    dto::ws::{
        GameStateMessage, HANDSHAKE_CHANNEL, HandshakeRequest, HandshakeResponse, STATE_CHANNEL,
    },
    state::{
        Outbox, SharedState, TransportError, UserHandle,
        rooms::RegistryError,
        session::{SessionEvent, SessionPhase},
        throttle::Throttled,
    },
};

/// Why a session stopped reading from its peer.
#[derive(Debug, Error)]
enum SessionError {
    /// No frame arrived within the read deadline.
    #[error("peer idle for more than {0:?}")]
    IdleTimeout(Duration),
    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,
    /// Reading from the transport failed.
    #[error("websocket error: {0}")]
    Transport(#[from] axum::Error),
    /// The frame could not be decoded into the expected message.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The first message was not a handshake.
    #[error("wrong channel used for handshake")]
    WrongChannel,
    /// The handshake arrived as a non-text frame.
    #[error("handshake must be a text frame")]
    UnexpectedFrame,
    /// The user registry refused the handshake.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The relay budget is exhausted.
    #[error(transparent)]
    Throttled(#[from] Throttled),
}

impl SessionError {
    /// Event fed to the phase machine when this error ends the handshake.
    fn handshake_event(&self) -> SessionEvent {
        match self {
            Self::IdleTimeout(_) | Self::Closed | Self::Transport(_) => SessionEvent::Disconnected,
            _ => SessionEvent::HandshakeRejected,
        }
    }

    /// Message returned in the failed handshake acknowledgement, if one is owed.
    fn handshake_reply(&self) -> Option<String> {
        match self {
            Self::IdleTimeout(_) | Self::Closed | Self::Transport(_) => None,
            Self::Malformed(_) | Self::UnexpectedFrame => Some("internal server error".into()),
            other => Some(other.to_string()),
        }
    }
}

/// Tracks the phase of one connection and logs each transition.
struct Session {
    id: Uuid,
    phase: SessionPhase,
}

impl Session {
    fn new(id: Uuid) -> Self {
        Self {
            id,
            phase: SessionPhase::Connecting,
        }
    }

    fn advance(&mut self, event: SessionEvent) {
        match self.phase.next(event) {
            Ok(next) => {
                debug!(
                    session = %self.id,
                    from = ?self.phase,
                    to = ?next,
                    terminal = next.is_terminal(),
                    "session transition"
                );
                self.phase = next;
            }
            Err(err) => warn!(session = %self.id, error = %err, "ignoring session event"),
        }
    }
}

/// Periodic ping running beside the read loop.
struct Heartbeat {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Heartbeat {
    fn start(session: Uuid, outbox: Outbox, period: Duration) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => match outbox.ping() {
                        Ok(()) => {}
                        Err(TransportError::Full) => {
                            debug!(session = %session, "outbound queue full; skipping ping");
                        }
                        Err(err) => {
                            debug!(session = %session, error = %err, "heartbeat stopped");
                            break;
                        }
                    },
                }
            }
        });
        Self { stop_tx, task }
    }

    /// Signal the heartbeat to stop and wait until it has.
    async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }
}

/// Handle the full lifecycle of one player connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let mut session = Session::new(Uuid::new_v4());
    let ws_config = state.config().websocket;
    let idle_timeout = ws_config.idle_timeout();

    let (sender, mut receiver) = socket.split();
    let (outbox, outbound_rx) = Outbox::with_capacity(ws_config.outbox_capacity);
    let writer_task = tokio::spawn(write_frames(sender, outbound_rx));

    let heartbeat = Heartbeat::start(session.id, outbox.clone(), ws_config.ping_period());
    session.advance(SessionEvent::Upgraded);

    let user = match handshake(&state, session.id, &mut receiver, &outbox, idle_timeout).await {
        Ok(user) => {
            session.advance(SessionEvent::HandshakeAccepted);
            Some(user)
        }
        Err(err) => {
            warn!(session = %session.id, error = %err, "handshake failed");
            if let Some(message) = err.handshake_reply() {
                let _ = outbox.send_json(&HandshakeResponse::rejected(message));
            }
            session.advance(err.handshake_event());
            None
        }
    };

    if let Some(user) = user.as_ref() {
        let reason = relay_states(&state, user, &mut receiver, idle_timeout).await;
        info!(session = %session.id, user = %user.name(), reason = %reason, "session ending");
        session.advance(SessionEvent::Disconnected);
    }

    heartbeat.stop().await;
    if let Some(user) = user {
        release_user(&state, &user).await;
    }
    session.advance(SessionEvent::Released);
    info!(session = %session.id, "session closed");

    finalize(writer_task, outbox, WRITER_DRAIN_TIMEOUT).await;
}

/// Read the handshake and register its user.
async fn handshake(
    state: &SharedState,
    session: Uuid,
    receiver: &mut SplitStream<WebSocket>,
    outbox: &Outbox,
    idle_timeout: Duration,
) -> Result<UserHandle, SessionError> {
    let text = loop {
        match next_frame(receiver, idle_timeout).await? {
            Message::Text(text) => break text,
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Binary(_) => return Err(SessionError::UnexpectedFrame),
            Message::Close(_) => return Err(SessionError::Closed),
        }
    };

    let request: HandshakeRequest = serde_json::from_str(text.as_str())?;
    if request.channel != HANDSHAKE_CHANNEL {
        return Err(SessionError::WrongChannel);
    }

    let user = state
        .users()
        .register(&request.user_name, session, outbox.clone())
        .await?;

    if outbox
        .send_json(&HandshakeResponse::accepted(user.name()))
        .is_err()
    {
        release_user(state, &user).await;
        return Err(SessionError::Closed);
    }
    Ok(user)
}

/// Forward the peer's state messages to its room until the connection ends.
async fn relay_states(
    state: &SharedState,
    user: &UserHandle,
    receiver: &mut SplitStream<WebSocket>,
    idle_timeout: Duration,
) -> SessionError {
    loop {
        let text = match next_frame(receiver, idle_timeout).await {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => return SessionError::Closed,
            Ok(_) => continue,
            Err(err) => return err,
        };

        if let Err(err) = state.throttle().charge_budget() {
            warn!(user = %user.name(), error = %err, "relay budget exhausted");
            return err.into();
        }

        let mut message: GameStateMessage = match serde_json::from_str(text.as_str()) {
            Ok(message) => message,
            Err(err) => return err.into(),
        };
        if message.channel != STATE_CHANNEL {
            debug!(user = %user.name(), channel = %message.channel, "ignoring message on unknown channel");
            continue;
        }
        message.user_name = user.name().to_string();

        let Some(room_name) = user.room_name() else {
            continue;
        };
        match state.rooms().find(&room_name).await {
            Ok(room) => {
                if !room.relay(message).await {
                    debug!(user = %user.name(), room = %room_name, "room closing; state dropped");
                }
            }
            Err(err) => debug!(user = %user.name(), error = %err, "state dropped"),
        }
    }
}

/// Await the next frame within the read deadline.
async fn next_frame(
    receiver: &mut SplitStream<WebSocket>,
    idle_timeout: Duration,
) -> Result<Message, SessionError> {
    match timeout(idle_timeout, receiver.next()).await {
        Ok(Some(Ok(message))) => Ok(message),
        Ok(Some(Err(err))) => Err(err.into()),
        Ok(None) => Err(SessionError::Closed),
        Err(_) => Err(SessionError::IdleTimeout(idle_timeout)),
    }
}

/// Drop the user from its room, if any, then from the user registry.
async fn release_user(state: &SharedState, user: &UserHandle) {
    if let Some(placement) = user.depart() {
        info!(
            session = %user.session_id(),
            user = %user.name(),
            room = %placement.room,
            team = %placement.team,
            striker = placement.striker,
            "leaving room"
        );
        match state.rooms().find(&placement.room).await {
            Ok(room) => {
                if let Err(err) = room.remove_member(user.name(), state.rooms()).await {
                    warn!(user = %user.name(), room = %placement.room, error = %err, "failed to leave room");
                }
            }
            Err(err) => warn!(user = %user.name(), error = %err, "room vanished before user left"),
        }
    }
    if let Err(err) = state.users().remove(user.name()).await {
        warn!(user = %user.name(), error = %err, "failed to delete user");
    }
}

/// Dedicated writer keeps outbound frames flowing while the session awaits inbound ones.
async fn write_frames(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<Message>,
) {
    while let Some(message) = outbound_rx.recv().await {
        let closing = matches!(message, Message::Close(_));
        if sender.send(message).await.is_err() || closing {
            break;
        }
    }
}

/// Close the transport and wait up to `deadline` for the writer task to wind down.
async fn finalize(mut writer_task: JoinHandle<()>, outbox: Outbox, deadline: Duration) {
    if let Err(err) = outbox.send(Message::Close(None)) {
        debug!(error = %err, "close frame not queued");
    }
    drop(outbox);
    if timeout(deadline, &mut writer_task).await.is_err() {
        warn!(?deadline, "writer did not drain in time; aborting");
        writer_task.abort();
    }
}
