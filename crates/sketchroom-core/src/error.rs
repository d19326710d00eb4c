//! Error types for the synchronization engine.

use crate::storage::StorageError;
use thiserror::Error;

/// Broad failure class, used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Room, canvas, shape or message absent.
    NotFound,
    /// Access denied; nothing was mutated.
    Authorization,
    /// Malformed input, rejected before any mutation.
    Validation,
    /// Identifier generation or uniqueness failure.
    Conflict,
    /// Persistence or hashing failure.
    Internal,
}

/// Errors raised by the room registry, canvas document, presence tracker
/// and chat channel.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Room not found: {0}")]
    RoomNotFound(String),
    #[error("Room {0} is not active")]
    RoomInactive(String),
    #[error("Room {0} is full")]
    RoomFull(String),
    #[error("Password required for this room")]
    PasswordRequired,
    #[error("Invalid room password")]
    InvalidPassword,
    #[error("Guests are not allowed in this room")]
    GuestsNotAllowed,
    #[error("Failed to generate a unique room id after {0} attempts")]
    RoomIdExhausted(usize),
    #[error("Shape not found: {0}")]
    ShapeNotFound(String),
    #[error("Message not found: {0}")]
    MessageNotFound(String),
    #[error("Not authorized for room {0}")]
    UnauthorizedRoomAccess(String),
    #[error("Only the room creator can do this")]
    NotRoomCreator,
    #[error("Drawing is disabled in this room")]
    DrawingDisabled,
    #[error("Chat is disabled in this room")]
    ChatDisabled,
    #[error("Connection is not bound to a room")]
    NotBound,
    #[error("Validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::RoomNotFound(_)
            | CoreError::ShapeNotFound(_)
            | CoreError::MessageNotFound(_) => ErrorKind::NotFound,
            CoreError::RoomInactive(_)
            | CoreError::RoomFull(_)
            | CoreError::PasswordRequired
            | CoreError::InvalidPassword
            | CoreError::GuestsNotAllowed
            | CoreError::UnauthorizedRoomAccess(_)
            | CoreError::NotRoomCreator
            | CoreError::DrawingDisabled
            | CoreError::ChatDisabled
            | CoreError::NotBound => ErrorKind::Authorization,
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::RoomIdExhausted(_) => ErrorKind::Conflict,
            CoreError::Storage(StorageError::NotFound(_)) => ErrorKind::NotFound,
            CoreError::Storage(StorageError::AlreadyExists(_)) => ErrorKind::Conflict,
            CoreError::Storage(_) | CoreError::PasswordHash(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::RoomNotFound(_) => "ROOM_NOT_FOUND",
            CoreError::RoomInactive(_) => "ROOM_INACTIVE",
            CoreError::RoomFull(_) => "ROOM_FULL",
            CoreError::PasswordRequired => "PASSWORD_REQUIRED",
            CoreError::InvalidPassword => "INVALID_PASSWORD",
            CoreError::GuestsNotAllowed => "GUESTS_NOT_ALLOWED",
            CoreError::RoomIdExhausted(_) => "ROOM_ID_EXHAUSTED",
            CoreError::ShapeNotFound(_) => "SHAPE_NOT_FOUND",
            CoreError::MessageNotFound(_) => "MESSAGE_NOT_FOUND",
            CoreError::UnauthorizedRoomAccess(_) => "UNAUTHORIZED_ROOM_ACCESS",
            CoreError::NotRoomCreator => "NOT_ROOM_CREATOR",
            CoreError::DrawingDisabled => "DRAWING_DISABLED",
            CoreError::ChatDisabled => "CHAT_DISABLED",
            CoreError::NotBound => "NOT_BOUND",
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::Storage(_) => "STORAGE_ERROR",
            CoreError::PasswordHash(_) => "INTERNAL_ERROR",
        }
    }
}

/// Result type for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(CoreError::RoomNotFound("X".into()).kind(), ErrorKind::NotFound);
        assert_eq!(CoreError::RoomFull("X".into()).kind(), ErrorKind::Authorization);
        assert_eq!(CoreError::Validation("bad".into()).kind(), ErrorKind::Validation);
        assert_eq!(CoreError::RoomIdExhausted(10).kind(), ErrorKind::Conflict);
        assert_eq!(
            CoreError::Storage(StorageError::Io("disk".into())).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(CoreError::ShapeNotFound("s".into()).code(), "SHAPE_NOT_FOUND");
        assert_eq!(
            CoreError::UnauthorizedRoomAccess("r".into()).code(),
            "UNAUTHORIZED_ROOM_ACCESS"
        );
    }
}
