//! SketchRoom Core Library
//!
//! Room registry, canvas documents, presence and chat for the SketchRoom
//! collaborative whiteboard, independent of any transport.

pub mod canvas;
pub mod chat;
pub mod config;
pub mod error;
pub mod locks;
pub mod password;
pub mod presence;
pub mod registry;
pub mod room;
pub mod router;
pub mod shapes;
pub mod storage;
pub mod sync;

pub use canvas::{Canvas, CanvasSettings, CanvasSettingsPatch, CanvasSnapshot, HistoryAction};
pub use chat::{ChatChannel, ChatMessage, MessageDraft, MessageType, ReactionAction, Reactions};
pub use config::EngineConfig;
pub use error::{CoreError, CoreResult, ErrorKind};
pub use presence::{Binding, ConnectionId, PresenceTracker};
pub use registry::{CreateRoomOptions, JoinRequest, RoomRegistry, RoomUpdate};
pub use room::{Actor, Room, RoomSettings, RoomStatus, RoomView, Seat};
pub use router::BroadcastRouter;
pub use shapes::{Shape, ShapeDraft, ShapeGeometry, ShapeKind, ShapePatch};
pub use storage::{DocumentStore, FileStore, MemoryStore, StorageError};
pub use sync::{ClientEvent, ServerEvent};
