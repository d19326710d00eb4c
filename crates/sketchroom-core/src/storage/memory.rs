//! In-memory store implementation.

use super::{newest_first_window, BoxFuture, DocumentStore, StorageError, StorageResult};
use crate::canvas::Canvas;
use crate::chat::ChatMessage;
use crate::room::Room;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory store for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryStore {
    rooms: RwLock<HashMap<String, Room>>,
    canvases: RwLock<HashMap<String, Canvas>>,
    messages: RwLock<HashMap<String, ChatMessage>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> StorageResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))
}

fn write<T>(lock: &RwLock<T>) -> StorageResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))
}

fn insert<T>(map: &RwLock<HashMap<String, T>>, key: String, value: T) -> StorageResult<()> {
    match write(map)?.entry(key) {
        Entry::Occupied(e) => Err(StorageError::AlreadyExists(e.key().clone())),
        Entry::Vacant(e) => {
            e.insert(value);
            Ok(())
        }
    }
}

fn replace<T>(map: &RwLock<HashMap<String, T>>, key: String, value: T) -> StorageResult<()> {
    let mut docs = write(map)?;
    match docs.get_mut(&key) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(StorageError::NotFound(key)),
    }
}

impl DocumentStore for MemoryStore {
    fn get_room(&self, room_id: &str) -> BoxFuture<'_, StorageResult<Option<Room>>> {
        let room_id = room_id.to_string();
        Box::pin(async move { Ok(read(&self.rooms)?.get(&room_id).cloned()) })
    }

    fn insert_room(&self, room: &Room) -> BoxFuture<'_, StorageResult<()>> {
        let room = room.clone();
        Box::pin(async move { insert(&self.rooms, room.room_id.clone(), room) })
    }

    fn save_room(&self, room: &Room) -> BoxFuture<'_, StorageResult<()>> {
        let room = room.clone();
        Box::pin(async move { replace(&self.rooms, room.room_id.clone(), room) })
    }

    fn delete_room(&self, room_id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let room_id = room_id.to_string();
        Box::pin(async move {
            write(&self.rooms)?.remove(&room_id);
            Ok(())
        })
    }

    fn list_rooms(&self) -> BoxFuture<'_, StorageResult<Vec<Room>>> {
        Box::pin(async move { Ok(read(&self.rooms)?.values().cloned().collect()) })
    }

    fn get_canvas(&self, room_id: &str) -> BoxFuture<'_, StorageResult<Option<Canvas>>> {
        let room_id = room_id.to_string();
        Box::pin(async move { Ok(read(&self.canvases)?.get(&room_id).cloned()) })
    }

    fn insert_canvas(&self, canvas: &Canvas) -> BoxFuture<'_, StorageResult<()>> {
        let canvas = canvas.clone();
        Box::pin(async move { insert(&self.canvases, canvas.room_id.clone(), canvas) })
    }

    fn save_canvas(&self, canvas: &Canvas) -> BoxFuture<'_, StorageResult<()>> {
        let canvas = canvas.clone();
        Box::pin(async move { replace(&self.canvases, canvas.room_id.clone(), canvas) })
    }

    fn delete_canvas(&self, room_id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let room_id = room_id.to_string();
        Box::pin(async move {
            write(&self.canvases)?.remove(&room_id);
            Ok(())
        })
    }

    fn get_message(&self, id: &str) -> BoxFuture<'_, StorageResult<Option<ChatMessage>>> {
        let id = id.to_string();
        Box::pin(async move { Ok(read(&self.messages)?.get(&id).cloned()) })
    }

    fn insert_message(&self, message: &ChatMessage) -> BoxFuture<'_, StorageResult<()>> {
        let message = message.clone();
        Box::pin(async move { insert(&self.messages, message.id.clone(), message) })
    }

    fn save_message(&self, message: &ChatMessage) -> BoxFuture<'_, StorageResult<()>> {
        let message = message.clone();
        Box::pin(async move { replace(&self.messages, message.id.clone(), message) })
    }

    fn recent_messages(
        &self,
        room_id: &str,
        limit: usize,
    ) -> BoxFuture<'_, StorageResult<Vec<ChatMessage>>> {
        let room_id = room_id.to_string();
        Box::pin(async move {
            let matching = read(&self.messages)?
                .values()
                .filter(|m| m.room_id == room_id)
                .cloned()
                .collect();
            Ok(newest_first_window(matching, limit))
        })
    }

    fn delete_messages(&self, room_id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let room_id = room_id.to_string();
        Box::pin(async move {
            write(&self.messages)?.retain(|_, m| m.room_id != room_id);
            Ok(())
        })
    }
}
