//! Chat messages, reactions and the chat broadcast channel.

use crate::error::{CoreError, CoreResult};
use crate::presence::{BroadcastGroups, ConnectionId, Connections};
use crate::registry::RoomRegistry;
use crate::storage::StorageError;
use crate::sync::ServerEvent;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    System,
    File,
    Emoji,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionAction {
    Add,
    Remove,
}

/// Emoji to the users who reacted with it. Keys never map to an empty set.
pub type Reactions = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    pub username: String,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub reactions: Reactions,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        id: Option<String>,
        room_id: &str,
        user_id: &str,
        username: &str,
        content: &str,
        message_type: MessageType,
        reply_to: Option<String>,
    ) -> Self {
        Self {
            id: id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
            username: username.to_string(),
            content: content.to_string(),
            message_type,
            reply_to,
            reactions: Reactions::new(),
            created_at: Utc::now(),
        }
    }

    /// Add or remove `user_id` under `emoji`. Returns `true` if the map
    /// changed. Re-adding is a no-op.
    pub fn apply_reaction(&mut self, emoji: &str, user_id: &str, action: ReactionAction) -> bool {
        match action {
            ReactionAction::Add => self
                .reactions
                .entry(emoji.to_string())
                .or_default()
                .insert(user_id.to_string()),
            ReactionAction::Remove => {
                let Some(users) = self.reactions.get_mut(emoji) else {
                    return false;
                };
                let removed = users.remove(user_id);
                if users.is_empty() {
                    self.reactions.remove(emoji);
                }
                removed
            }
        }
    }
}

/// A message as submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    /// Client-generated id; one is assigned when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub message: String,
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub reply_to: Option<String>,
}

/// A connection's membership in a chat group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMember {
    pub room_id: String,
    pub user_id: String,
    pub username: String,
}

/// Chat broadcast path, scoped by room id but independent of canvas
/// presence.
pub struct ChatChannel {
    registry: Arc<RoomRegistry>,
    connections: Arc<Connections>,
    groups: BroadcastGroups,
    members: DashMap<ConnectionId, ChatMember>,
}

impl ChatChannel {
    pub fn new(registry: Arc<RoomRegistry>, connections: Arc<Connections>) -> Self {
        Self {
            registry,
            connections,
            groups: BroadcastGroups::new(),
            members: DashMap::new(),
        }
    }

    pub fn member(&self, connection_id: &str) -> Option<ChatMember> {
        self.members.get(connection_id).map(|m| m.clone())
    }

    fn require_member(&self, connection_id: &str) -> CoreResult<ChatMember> {
        self.member(connection_id).ok_or(CoreError::NotBound)
    }

    fn broadcast(&self, room_id: &str, event: &ServerEvent, except: Option<&str>) -> usize {
        self.groups
            .broadcast(&self.connections, room_id, event, except)
    }

    /// Newest messages of a room, oldest first.
    pub async fn history(&self, room_id: &str, limit: usize) -> CoreResult<Vec<ChatMessage>> {
        self.registry.get_room(room_id).await?;
        Ok(self
            .registry
            .store()
            .recent_messages(room_id, limit)
            .await?)
    }

    /// Attach a connection to a room's chat group. Guests chat under their
    /// connection id.
    pub async fn join(
        &self,
        connection_id: &str,
        room_id: &str,
        user_id: Option<String>,
        username: &str,
    ) -> CoreResult<Vec<ChatMessage>> {
        let messages = self
            .history(room_id, self.registry.config().chat_history_limit)
            .await?;
        self.leave(connection_id);

        let member = ChatMember {
            room_id: room_id.to_string(),
            user_id: user_id.unwrap_or_else(|| connection_id.to_string()),
            username: username.trim().to_string(),
        };
        self.members
            .insert(connection_id.to_string(), member.clone());
        self.groups.attach(room_id, connection_id);

        self.connections.send(
            connection_id,
            ServerEvent::ChatHistory {
                messages: messages.clone(),
            },
        );
        self.broadcast(
            room_id,
            &ServerEvent::UserJoinedChat {
                user_id: member.user_id,
                username: member.username,
                connection_id: connection_id.to_string(),
                timestamp: Utc::now(),
            },
            Some(connection_id),
        );
        log::info!("Connection {} joined chat of room {}", connection_id, room_id);
        Ok(messages)
    }

    /// Detach from the chat group. No-op when not a member.
    pub fn leave(&self, connection_id: &str) {
        let Some((_, member)) = self.members.remove(connection_id) else {
            return;
        };
        self.groups.detach(&member.room_id, connection_id);
        self.broadcast(
            &member.room_id,
            &ServerEvent::UserLeftChat {
                user_id: member.user_id,
                username: member.username,
                connection_id: connection_id.to_string(),
                timestamp: Utc::now(),
            },
            None,
        );
        log::info!(
            "Connection {} left chat of room {}",
            connection_id,
            member.room_id
        );
    }

    /// Persist a message, then deliver it to the whole group, sender
    /// included.
    pub async fn send_message(
        &self,
        connection_id: &str,
        draft: MessageDraft,
    ) -> CoreResult<ChatMessage> {
        let member = self.require_member(connection_id)?;
        let content = draft.message.trim();
        if content.is_empty() {
            return Err(CoreError::Validation("message must not be empty".to_string()));
        }

        let room = self.registry.get_room(&member.room_id).await?;
        if !room.settings.allow_chat {
            return Err(CoreError::ChatDisabled);
        }

        let message = ChatMessage::new(
            draft.id,
            &member.room_id,
            &member.user_id,
            &member.username,
            content,
            draft.message_type,
            draft.reply_to,
        );
        self.registry
            .store()
            .insert_message(&message)
            .await
            .map_err(|e| match e {
                StorageError::AlreadyExists(id) => {
                    CoreError::Validation(format!("message id {} already used", id))
                }
                other => other.into(),
            })?;

        self.broadcast(
            &member.room_id,
            &ServerEvent::MessageReceived(message.clone()),
            None,
        );
        log::debug!(
            "Message {} sent in room {} by {}",
            message.id,
            member.room_id,
            member.username
        );
        Ok(message)
    }

    /// React on behalf of a chat member; the message must belong to the
    /// member's room.
    pub async fn react(
        &self,
        connection_id: &str,
        message_id: &str,
        emoji: &str,
        action: ReactionAction,
    ) -> CoreResult<Reactions> {
        let member = self.require_member(connection_id)?;
        self.react_as(&member.user_id, Some(&member.room_id), message_id, emoji, action)
            .await
    }

    /// Apply a reaction and broadcast the message's full reaction map to
    /// its room. With `room_id` set, the message must belong to that room.
    pub async fn react_as(
        &self,
        user_id: &str,
        room_id: Option<&str>,
        message_id: &str,
        emoji: &str,
        action: ReactionAction,
    ) -> CoreResult<Reactions> {
        if emoji.trim().is_empty() {
            return Err(CoreError::Validation("emoji must not be empty".to_string()));
        }
        let store = self.registry.store();
        let message_room = store
            .get_message(message_id)
            .await?
            .ok_or_else(|| CoreError::MessageNotFound(message_id.to_string()))?
            .room_id;
        if room_id.is_some_and(|room_id| room_id != message_room) {
            return Err(CoreError::UnauthorizedRoomAccess(message_room));
        }

        let _guard = self.registry.lock(&message_room).await;
        let mut message = store
            .get_message(message_id)
            .await?
            .ok_or_else(|| CoreError::MessageNotFound(message_id.to_string()))?;
        if message.apply_reaction(emoji, user_id, action) {
            store.save_message(&message).await?;
        }

        self.broadcast(
            &message.room_id,
            &ServerEvent::MessageReactionUpdated {
                message_id: message.id.clone(),
                reactions: message.reactions.clone(),
            },
            None,
        );
        Ok(message.reactions)
    }

    /// Relay a typing indicator to everyone else in the group.
    pub fn typing(&self, connection_id: &str, is_typing: bool) -> CoreResult<()> {
        let member = self.require_member(connection_id)?;
        self.broadcast(
            &member.room_id,
            &ServerEvent::UserTyping {
                user_id: member.user_id.clone(),
                username: member.username.clone(),
                is_typing,
            },
            Some(connection_id),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> ChatMessage {
        ChatMessage::new(None, "R1", "u1", "Alice", "hello", MessageType::Text, None)
    }

    #[test]
    fn test_reaction_add_is_idempotent() {
        let mut m = message();
        assert!(m.apply_reaction("👍", "u", ReactionAction::Add));
        assert!(!m.apply_reaction("👍", "u", ReactionAction::Add));
        assert_eq!(m.reactions["👍"].len(), 1);
    }

    #[test]
    fn test_reaction_remove_drops_empty_key() {
        let mut m = message();
        m.apply_reaction("👍", "u", ReactionAction::Add);
        m.apply_reaction("👍", "v", ReactionAction::Add);
        m.apply_reaction("👍", "u", ReactionAction::Remove);
        assert_eq!(m.reactions["👍"].len(), 1);
        m.apply_reaction("👍", "v", ReactionAction::Remove);
        assert!(!m.reactions.contains_key("👍"));
        assert!(!m.apply_reaction("🎉", "v", ReactionAction::Remove));
        assert!(m.reactions.is_empty());
    }

    #[test]
    fn test_blank_client_id_replaced() {
        let m = ChatMessage::new(Some("  ".into()), "R", "u", "A", "x", MessageType::Text, None);
        assert!(!m.id.trim().is_empty());
        let m = ChatMessage::new(Some("client-1".into()), "R", "u", "A", "x", MessageType::Text, None);
        assert_eq!(m.id, "client-1");
    }

    #[test]
    fn test_message_wire_shape() {
        let mut m = message();
        m.apply_reaction("👍", "u", ReactionAction::Add);
        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["roomId"], "R1");
        assert_eq!(value["reactions"]["👍"][0], "u");
        assert!(value.get("replyTo").is_none());
    }
}
