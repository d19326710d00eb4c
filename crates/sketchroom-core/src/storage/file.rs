//! File-based storage implementation.

use super::{newest_first_window, BoxFuture, DocumentStore, StorageError, StorageResult};
use crate::canvas::Canvas;
use crate::chat::ChatMessage;
use crate::room::Room;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const ROOMS_DIR: &str = "rooms";
const CANVASES_DIR: &str = "canvases";
const MESSAGES_DIR: &str = "messages";

/// File-based document store.
///
/// Each record is a JSON file under `rooms/`, `canvases/` or `messages/`
/// of the base directory.
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Create a file store rooted at `base_path`, creating the collection
    /// directories if needed.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        for dir in [ROOMS_DIR, CANVASES_DIR, MESSAGES_DIR] {
            let path = base_path.join(dir);
            fs::create_dir_all(&path).map_err(|e| {
                StorageError::Io(format!("Failed to create {}: {}", path.display(), e))
            })?;
        }
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn record_path(&self, collection: &str, id: &str) -> PathBuf {
        // Sanitize ID to be safe for filenames
        let safe_id: String = id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path.join(collection).join(format!("{}.json", safe_id))
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.base_path.join(collection)
    }
}

fn encode<T: Serialize>(record: &T) -> StorageResult<String> {
    serde_json::to_string_pretty(record).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn read_record<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StorageError::Io(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };
    serde_json::from_str(&json).map(Some).map_err(|e| {
        StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
    })
}

fn create_record(path: &Path, key: &str, json: &str) -> StorageResult<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => StorageError::AlreadyExists(key.to_string()),
            _ => StorageError::Io(format!("Failed to create {}: {}", path.display(), e)),
        })?;
    file.write_all(json.as_bytes())
        .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", path.display(), e)))
}

fn replace_record(path: &Path, key: &str, json: &str) -> StorageResult<()> {
    if !path.exists() {
        return Err(StorageError::NotFound(key.to_string()));
    }
    fs::write(path, json)
        .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", path.display(), e)))
}

fn remove_record(path: &Path) -> StorageResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::Io(format!(
            "Failed to delete {}: {}",
            path.display(),
            e
        ))),
    }
}

fn read_collection<T: DeserializeOwned>(dir: &Path) -> StorageResult<Vec<(PathBuf, T)>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| StorageError::Io(format!("Failed to read directory: {}", e)))?;

    let mut records = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "json") {
            if let Some(record) = read_record(&path)? {
                records.push((path, record));
            }
        }
    }
    Ok(records)
}

/// Turn an encode failure into an already-resolved future.
macro_rules! encode_or_fail {
    ($record:expr) => {
        match encode($record) {
            Ok(json) => json,
            Err(e) => return Box::pin(async move { Err(e) }),
        }
    };
}

impl DocumentStore for FileStore {
    fn get_room(&self, room_id: &str) -> BoxFuture<'_, StorageResult<Option<Room>>> {
        let path = self.record_path(ROOMS_DIR, room_id);
        Box::pin(async move { read_record(&path) })
    }

    fn insert_room(&self, room: &Room) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.record_path(ROOMS_DIR, &room.room_id);
        let key = room.room_id.clone();
        let json = encode_or_fail!(room);
        Box::pin(async move { create_record(&path, &key, &json) })
    }

    fn save_room(&self, room: &Room) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.record_path(ROOMS_DIR, &room.room_id);
        let key = room.room_id.clone();
        let json = encode_or_fail!(room);
        Box::pin(async move { replace_record(&path, &key, &json) })
    }

    fn delete_room(&self, room_id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.record_path(ROOMS_DIR, room_id);
        Box::pin(async move { remove_record(&path) })
    }

    fn list_rooms(&self) -> BoxFuture<'_, StorageResult<Vec<Room>>> {
        let dir = self.collection_path(ROOMS_DIR);
        Box::pin(async move {
            Ok(read_collection::<Room>(&dir)?
                .into_iter()
                .map(|(_, room)| room)
                .collect())
        })
    }

    fn get_canvas(&self, room_id: &str) -> BoxFuture<'_, StorageResult<Option<Canvas>>> {
        let path = self.record_path(CANVASES_DIR, room_id);
        Box::pin(async move { read_record(&path) })
    }

    fn insert_canvas(&self, canvas: &Canvas) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.record_path(CANVASES_DIR, &canvas.room_id);
        let key = canvas.room_id.clone();
        let json = encode_or_fail!(canvas);
        Box::pin(async move { create_record(&path, &key, &json) })
    }

    fn save_canvas(&self, canvas: &Canvas) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.record_path(CANVASES_DIR, &canvas.room_id);
        let key = canvas.room_id.clone();
        let json = encode_or_fail!(canvas);
        Box::pin(async move { replace_record(&path, &key, &json) })
    }

    fn delete_canvas(&self, room_id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.record_path(CANVASES_DIR, room_id);
        Box::pin(async move { remove_record(&path) })
    }

    fn get_message(&self, id: &str) -> BoxFuture<'_, StorageResult<Option<ChatMessage>>> {
        let path = self.record_path(MESSAGES_DIR, id);
        Box::pin(async move { read_record(&path) })
    }

    fn insert_message(&self, message: &ChatMessage) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.record_path(MESSAGES_DIR, &message.id);
        let key = message.id.clone();
        let json = encode_or_fail!(message);
        Box::pin(async move { create_record(&path, &key, &json) })
    }

    fn save_message(&self, message: &ChatMessage) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.record_path(MESSAGES_DIR, &message.id);
        let key = message.id.clone();
        let json = encode_or_fail!(message);
        Box::pin(async move { replace_record(&path, &key, &json) })
    }

    fn recent_messages(
        &self,
        room_id: &str,
        limit: usize,
    ) -> BoxFuture<'_, StorageResult<Vec<ChatMessage>>> {
        let dir = self.collection_path(MESSAGES_DIR);
        let room_id = room_id.to_string();
        Box::pin(async move {
            let matching = read_collection::<ChatMessage>(&dir)?
                .into_iter()
                .map(|(_, m)| m)
                .filter(|m| m.room_id == room_id)
                .collect();
            Ok(newest_first_window(matching, limit))
        })
    }

    fn delete_messages(&self, room_id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let dir = self.collection_path(MESSAGES_DIR);
        let room_id = room_id.to_string();
        Box::pin(async move {
            for (path, message) in read_collection::<ChatMessage>(&dir)? {
                if message.room_id == room_id {
                    remove_record(&path)?;
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MessageType;
    use crate::room::Seat;
    use crate::shapes::{Dimensions, Point, ShapeDraft, ShapeGeometry};
    use chrono::{Duration, Utc};
    use tempfile::tempdir;

    fn room(id: &str) -> Room {
        Room::new(
            id.to_string(),
            "Room".to_string(),
            "owner".to_string(),
            10,
            Utc::now(),
            Duration::hours(1),
        )
    }

    #[tokio::test]
    async fn test_room_round_trip_through_disk() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();

        let mut original = room("ROOM0001");
        original.add_participant(Seat::User("u1"), "Alice", Utc::now());
        original.add_participant(Seat::Guest("conn-7"), "Visitor", Utc::now());
        store.insert_room(&original).await.unwrap();

        let loaded = store.get_room("ROOM0001").await.unwrap().unwrap();
        assert_eq!(loaded, original);
        assert!(dir.path().join("rooms").join("ROOM0001.json").exists());
    }

    #[tokio::test]
    async fn test_insert_conflict_and_save_missing() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();

        store.insert_room(&room("ROOM0001")).await.unwrap();
        assert!(matches!(
            store.insert_room(&room("ROOM0001")).await,
            Err(StorageError::AlreadyExists(_))
        ));
        assert!(matches!(
            store.save_room(&room("ROOM0002")).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_canvas_persists_shapes() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();

        let mut canvas = Canvas::new("ROOM0001", "Room Canvas", Utc::now());
        store.insert_canvas(&canvas).await.unwrap();

        let draft = ShapeDraft::new(
            ShapeGeometry::Rectangle {
                dimensions: Dimensions::new(10.0, 20.0),
            },
            Point::new(1.0, 2.0),
        );
        canvas.add_shape(draft, "u1", Utc::now()).unwrap();
        store.save_canvas(&canvas).await.unwrap();

        let loaded = store.get_canvas("ROOM0001").await.unwrap().unwrap();
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.shapes.len(), 1);
    }

    #[tokio::test]
    async fn test_ids_are_sanitized() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();

        let path = store.record_path(ROOMS_DIR, "../escape");
        assert!(path.starts_with(dir.path().join("rooms")));
        assert!(store.get_room("../escape").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_messages_by_room() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();

        for i in 0..3 {
            let mut m = ChatMessage::new(None, "R1", "u1", "Alice", "hi", MessageType::Text, None);
            m.created_at = Utc::now() + Duration::seconds(i);
            store.insert_message(&m).await.unwrap();
        }
        let other = ChatMessage::new(None, "R2", "u1", "Alice", "yo", MessageType::Text, None);
        store.insert_message(&other).await.unwrap();

        assert_eq!(store.recent_messages("R1", 2).await.unwrap().len(), 2);
        store.delete_messages("R1").await.unwrap();
        assert!(store.recent_messages("R1", 10).await.unwrap().is_empty());
        assert!(store.get_message(&other.id).await.unwrap().is_some());
    }
}
