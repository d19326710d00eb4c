//! Wire events exchanged over a realtime connection.
//!
//! Every frame is one JSON object `{"event": "<name>", "data": {...}}`.
//! Canvas events use kebab-case names, chat events snake_case.

use crate::canvas::{CanvasSettings, CanvasSettingsPatch, CanvasSnapshot};
use crate::chat::{ChatMessage, MessageDraft, ReactionAction, Reactions};
use crate::shapes::{Shape, ShapeDraft, ShapeId, ShapePatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Intents sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    #[serde(rename = "join-room")]
    JoinRoom {
        room_id: String,
        /// Absent for guests.
        #[serde(default)]
        user_id: Option<String>,
        username: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
    #[serde(rename = "leave-room")]
    LeaveRoom,
    #[serde(rename = "add-shape")]
    AddShape { room_id: String, shape: ShapeDraft },
    #[serde(rename = "update-shape")]
    UpdateShape {
        room_id: String,
        shape_id: ShapeId,
        updates: ShapePatch,
    },
    #[serde(rename = "delete-shape")]
    DeleteShape { room_id: String, shape_id: ShapeId },
    #[serde(rename = "update-canvas-settings")]
    UpdateCanvasSettings {
        room_id: String,
        settings: CanvasSettingsPatch,
    },
    #[serde(rename = "cursor-move")]
    CursorMove { x: f64, y: f64 },
    #[serde(rename = "join_chat")]
    JoinChat {
        room_id: String,
        #[serde(default)]
        user_id: Option<String>,
        username: String,
    },
    #[serde(rename = "leave_chat")]
    LeaveChat,
    #[serde(rename = "chat_message")]
    SendMessage(MessageDraft),
    #[serde(rename = "message_reaction")]
    MessageReaction {
        message_id: String,
        emoji: String,
        action: ReactionAction,
    },
    #[serde(rename = "typing")]
    Typing { is_typing: bool },
}

/// Events delivered to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    #[serde(rename = "canvas-state")]
    CanvasState(CanvasSnapshot),
    #[serde(rename = "user-joined")]
    UserJoined {
        user_id: Option<String>,
        username: String,
        connection_id: String,
    },
    #[serde(rename = "user-left")]
    UserLeft {
        user_id: Option<String>,
        username: String,
        connection_id: String,
    },
    #[serde(rename = "shape-added")]
    ShapeAdded {
        shape: Shape,
        canvas_version: u64,
        added_by: String,
    },
    #[serde(rename = "shape-updated")]
    ShapeUpdated {
        shape_id: ShapeId,
        updates: ShapePatch,
        canvas_version: u64,
        updated_by: String,
    },
    #[serde(rename = "shape-deleted")]
    ShapeDeleted {
        shape_id: ShapeId,
        canvas_version: u64,
        deleted_by: String,
    },
    #[serde(rename = "canvas-settings-updated")]
    CanvasSettingsUpdated {
        settings: CanvasSettings,
        canvas_version: u64,
        updated_by: String,
    },
    #[serde(rename = "cursor-moved")]
    CursorMoved {
        user_id: Option<String>,
        username: String,
        x: f64,
        y: f64,
    },
    #[serde(rename = "chat_history")]
    ChatHistory { messages: Vec<ChatMessage> },
    #[serde(rename = "user_joined_chat")]
    UserJoinedChat {
        user_id: String,
        username: String,
        connection_id: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "user_left_chat")]
    UserLeftChat {
        user_id: String,
        username: String,
        connection_id: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "message_received")]
    MessageReceived(ChatMessage),
    #[serde(rename = "message_reaction_updated")]
    MessageReactionUpdated {
        message_id: String,
        reactions: Reactions,
    },
    #[serde(rename = "user_typing")]
    UserTyping {
        user_id: String,
        username: String,
        is_typing: bool,
    },
    #[serde(rename = "error")]
    Error { code: String, message: String },
}

impl ServerEvent {
    /// The wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::CanvasState(_) => "canvas-state",
            ServerEvent::UserJoined { .. } => "user-joined",
            ServerEvent::UserLeft { .. } => "user-left",
            ServerEvent::ShapeAdded { .. } => "shape-added",
            ServerEvent::ShapeUpdated { .. } => "shape-updated",
            ServerEvent::ShapeDeleted { .. } => "shape-deleted",
            ServerEvent::CanvasSettingsUpdated { .. } => "canvas-settings-updated",
            ServerEvent::CursorMoved { .. } => "cursor-moved",
            ServerEvent::ChatHistory { .. } => "chat_history",
            ServerEvent::UserJoinedChat { .. } => "user_joined_chat",
            ServerEvent::UserLeftChat { .. } => "user_left_chat",
            ServerEvent::MessageReceived(_) => "message_received",
            ServerEvent::MessageReactionUpdated { .. } => "message_reaction_updated",
            ServerEvent::UserTyping { .. } => "user_typing",
            ServerEvent::Error { .. } => "error",
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
