//! Document store abstraction for rooms, canvases and chat messages.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::canvas::Canvas;
use crate::chat::ChatMessage;
use crate::room::Room;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Document already exists: {0}")]
    AlreadyExists(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future returned by store operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Keyed persistence for the three record kinds.
///
/// Rooms are keyed by `roomId`, canvases by the `roomId` they belong to
/// and messages by their `id`. `insert_*` fails with
/// [`StorageError::AlreadyExists`] when the key is taken; `save_*` fails
/// with [`StorageError::NotFound`] when it is not.
pub trait DocumentStore: Send + Sync {
    fn get_room(&self, room_id: &str) -> BoxFuture<'_, StorageResult<Option<Room>>>;

    fn insert_room(&self, room: &Room) -> BoxFuture<'_, StorageResult<()>>;

    fn save_room(&self, room: &Room) -> BoxFuture<'_, StorageResult<()>>;

    fn delete_room(&self, room_id: &str) -> BoxFuture<'_, StorageResult<()>>;

    fn list_rooms(&self) -> BoxFuture<'_, StorageResult<Vec<Room>>>;

    fn get_canvas(&self, room_id: &str) -> BoxFuture<'_, StorageResult<Option<Canvas>>>;

    /// Insert the canvas of a room; at most one per room.
    fn insert_canvas(&self, canvas: &Canvas) -> BoxFuture<'_, StorageResult<()>>;

    fn save_canvas(&self, canvas: &Canvas) -> BoxFuture<'_, StorageResult<()>>;

    fn delete_canvas(&self, room_id: &str) -> BoxFuture<'_, StorageResult<()>>;

    fn get_message(&self, id: &str) -> BoxFuture<'_, StorageResult<Option<ChatMessage>>>;

    fn insert_message(&self, message: &ChatMessage) -> BoxFuture<'_, StorageResult<()>>;

    fn save_message(&self, message: &ChatMessage) -> BoxFuture<'_, StorageResult<()>>;

    /// The newest `limit` messages of a room, oldest first.
    fn recent_messages(
        &self,
        room_id: &str,
        limit: usize,
    ) -> BoxFuture<'_, StorageResult<Vec<ChatMessage>>>;

    fn delete_messages(&self, room_id: &str) -> BoxFuture<'_, StorageResult<()>>;
}

/// Keep the newest `limit` of `messages`, ordered oldest first.
pub(crate) fn newest_first_window(mut messages: Vec<ChatMessage>, limit: usize) -> Vec<ChatMessage> {
    messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    let skip = messages.len().saturating_sub(limit);
    messages.split_off(skip)
}
