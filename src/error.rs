use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::state::{
    room::{RoomError, Team},
    rooms::RegistryError,
    throttle::Throttled,
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Invalid input provided by the client (empty or over-length names, bad striker).
    #[error("{0}")]
    Validation(String),
    /// A user or room with that name already exists.
    #[error("{0}")]
    AlreadyExists(String),
    /// The server already holds its maximum number of users or rooms.
    #[error("{0}")]
    CapacityExceeded(String),
    /// Requested user or room was not found.
    #[error("{0}")]
    NotFound(String),
    /// The user creating a room is not registered.
    #[error("could not find user {0} that is trying to create room")]
    CreatorNotFound(String),
    /// Every seat in the room is taken.
    #[error("room is full")]
    FullRoom,
    /// The requested team is full.
    #[error("{0} team is full")]
    TeamFull(Team),
    /// The requested striker slot is held by another member.
    #[error("striker {0} is taken")]
    StrikerTaken(usize),
    /// Admission control refused the request.
    #[error("try again later")]
    Throttled(#[from] Throttled),
    /// Unexpected state, e.g. a room closing under the request.
    #[error("{0}")]
    Internal(String),
}

impl From<RegistryError> for ServiceError {
    fn from(err: RegistryError) -> Self {
        let message = err.to_string();
        match err {
            RegistryError::InvalidName { .. } => ServiceError::Validation(message),
            RegistryError::CapacityExceeded { .. } => ServiceError::CapacityExceeded(message),
            RegistryError::AlreadyExists { .. } => ServiceError::AlreadyExists(message),
            RegistryError::NotFound { .. } => ServiceError::NotFound(message),
            RegistryError::Room(room) => room.into(),
        }
    }
}

impl From<RoomError> for ServiceError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::FullRoom => ServiceError::FullRoom,
            RoomError::TeamFull(team) => ServiceError::TeamFull(team),
            RoomError::StrikerTaken(slot) => ServiceError::StrikerTaken(slot),
            RoomError::InvalidStriker { .. } | RoomError::AlreadyMember(_) => {
                ServiceError::Validation(err.to_string())
            }
            RoomError::Closed | RoomError::NotMember(_) => ServiceError::Internal(err.to_string()),
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("{0}")]
    BadRequest(String),
    /// Retryable rejection from admission control.
    #[error("{0}")]
    TooManyRequests(String),
    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Validation(_)
            | ServiceError::NotFound(_)
            | ServiceError::TeamFull(_)
            | ServiceError::StrikerTaken(_) => AppError::BadRequest(message),
            ServiceError::Throttled(_) => AppError::TooManyRequests(message),
            ServiceError::AlreadyExists(_)
            | ServiceError::CapacityExceeded(_)
            | ServiceError::CreatorNotFound(_)
            | ServiceError::FullRoom
            | ServiceError::Internal(_) => AppError::Internal(message),
        }
    }
}

impl From<Throttled> for AppError {
    fn from(err: Throttled) -> Self {
        ServiceError::from(err).into()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::state::throttle::ThrottleKind;

    fn status(err: ServiceError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn lobby_errors_map_to_documented_statuses() {
        assert_eq!(status(ServiceError::TeamFull(Team::Left)), StatusCode::BAD_REQUEST);
        assert_eq!(status(ServiceError::StrikerTaken(1)), StatusCode::BAD_REQUEST);
        assert_eq!(status(ServiceError::NotFound("room r1 not found".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(ServiceError::AlreadyExists("room with name r1 already exists".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(ServiceError::CreatorNotFound("a".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status(ServiceError::FullRoom), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn throttling_is_retryable() {
        let throttled = Throttled {
            kind: ThrottleKind::Rate,
            window: Duration::from_secs(1),
        };
        assert_eq!(status(throttled.into()), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn registry_errors_keep_their_message() {
        let err: ServiceError = RegistryError::CapacityExceeded {
            kind: "rooms",
            capacity: 16,
        }
        .into();
        assert!(matches!(err, ServiceError::CapacityExceeded(_)));
        assert_eq!(err.to_string(), "server already maintains max number of rooms (16)");
    }
}
