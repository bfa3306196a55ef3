//! Write side of a persistent connection, shared between its session and room fan-out.

use axum::extract::ws::Message;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Frames buffered per connection when no explicit capacity is configured.
pub const DEFAULT_CAPACITY: usize = 64;

/// Failure to hand a message to a connection's writer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection's writer task has stopped; the peer is gone.
    #[error("connection closed")]
    Closed,
    /// The writer is not keeping up; the frame was dropped.
    #[error("outbound queue full")]
    Full,
    /// The payload could not be encoded.
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Cloneable handle queuing frames onto a connection's dedicated writer task.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<Message>,
}

impl Outbox {
    /// Wrap the sending half of a writer channel.
    pub fn new(tx: mpsc::Sender<Message>) -> Self {
        Self { tx }
    }

    /// Create an outbox with [`DEFAULT_CAPACITY`] together with the receiver its writer drains.
    pub fn channel() -> (Self, mpsc::Receiver<Message>) {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an outbox buffering at most `capacity` frames (at least one).
    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Serialize `value` as JSON and queue it as a text frame.
    pub fn send_json<T>(&self, value: &T) -> Result<(), TransportError>
    where
        T: ?Sized + Serialize,
    {
        let payload = serde_json::to_string(value)?;
        self.send_text(payload)
    }

    /// Queue an already-encoded text frame.
    pub fn send_text(&self, payload: String) -> Result<(), TransportError> {
        self.send(Message::Text(payload.into()))
    }

    /// Queue a heartbeat ping.
    pub fn ping(&self) -> Result<(), TransportError> {
        self.send(Message::Ping(Default::default()))
    }

    /// Queue a raw frame without waiting for the writer.
    pub fn send(&self, message: Message) -> Result<(), TransportError> {
        self.tx.try_send(message).map_err(|err| match err {
            TrySendError::Full(_) => TransportError::Full,
            TrySendError::Closed(_) => TransportError::Closed,
        })
    }
}
