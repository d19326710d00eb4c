//! Routes client intents to the canvas, presence and chat paths and fans
//! the results out to the room.

use crate::canvas::{load_or_create, Canvas, CanvasSettingsPatch};
use crate::chat::{ChatChannel, ChatMessage, ReactionAction, Reactions};
use crate::error::{CoreError, CoreResult};
use crate::locks::RoomGuard;
use crate::presence::{Binding, ConnectionId, Connections, PresenceTracker};
use crate::registry::{JoinRequest, RoomRegistry};
use crate::room::{Actor, Room};
use crate::shapes::{Shape, ShapeDraft, ShapePatch};
use crate::sync::{ClientEvent, ServerEvent};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use uuid::Uuid;

/// A canvas mutation that has been persisted but not yet published.
///
/// The room lock is held until this is dropped, so the broadcast of one
/// mutation always precedes the next mutation of the same room.
struct Applied<T> {
    value: T,
    version: u64,
    _guard: RoomGuard,
}

/// Entry point for everything a connection sends.
pub struct BroadcastRouter {
    registry: Arc<RoomRegistry>,
    connections: Arc<Connections>,
    presence: PresenceTracker,
    chat: ChatChannel,
}

impl BroadcastRouter {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        let connections = Arc::new(Connections::new());
        Self {
            presence: PresenceTracker::new(registry.clone(), connections.clone()),
            chat: ChatChannel::new(registry.clone(), connections.clone()),
            registry,
            connections,
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn chat(&self) -> &ChatChannel {
        &self.chat
    }

    /// Register a new connection and return its id and outbound queue.
    pub fn connect(&self) -> (ConnectionId, UnboundedReceiver<ServerEvent>) {
        let connection_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.register(&connection_id, tx);
        log::debug!("Connection {} opened", connection_id);
        (connection_id, rx)
    }

    /// Tear down every binding of a closed connection.
    pub async fn disconnect(&self, connection_id: &str) {
        if let Err(e) = self.presence.unbind(connection_id).await {
            log::warn!("Unbind of {} failed: {}", connection_id, e);
        }
        self.chat.leave(connection_id);
        self.connections.deregister(connection_id);
        log::debug!("Connection {} closed", connection_id);
    }

    /// Handle one intent. Failures go back to the originator only as an
    /// `error` event.
    pub async fn handle(&self, connection_id: &str, event: ClientEvent) {
        if let Err(e) = self.dispatch(connection_id, event).await {
            log::warn!("Rejected intent from {}: {}", connection_id, e);
            self.send_error(connection_id, &e);
        }
    }

    /// Queue an event for one connection. False if it is gone.
    pub fn send(&self, connection_id: &str, event: ServerEvent) -> bool {
        self.connections.send(connection_id, event)
    }

    /// Tell a connection why its intent failed.
    pub fn send_error(&self, connection_id: &str, error: &CoreError) {
        self.send(connection_id, ServerEvent::error(error.code(), error.to_string()));
    }

    /// Apply one intent, returning its failure instead of reporting it.
    pub async fn dispatch(&self, connection_id: &str, event: ClientEvent) -> CoreResult<()> {
        match event {
            ClientEvent::JoinRoom {
                room_id,
                user_id,
                username,
                password,
            } => {
                let request = JoinRequest {
                    room_id,
                    name: username,
                    password,
                    user_id,
                    guest_key: None,
                };
                self.presence.bind(connection_id, &request).await?;
            }
            ClientEvent::LeaveRoom => self.presence.unbind(connection_id).await?,
            ClientEvent::AddShape { room_id, shape } => {
                self.add_shape(connection_id, &room_id, shape).await?;
            }
            ClientEvent::UpdateShape {
                room_id,
                shape_id,
                updates,
            } => {
                self.update_shape(connection_id, &room_id, &shape_id, updates)
                    .await?;
            }
            ClientEvent::DeleteShape { room_id, shape_id } => {
                self.delete_shape(connection_id, &room_id, &shape_id).await?;
            }
            ClientEvent::UpdateCanvasSettings { room_id, settings } => {
                self.update_settings(connection_id, &room_id, settings)
                    .await?;
            }
            ClientEvent::CursorMove { x, y } => self.presence.relay_cursor(connection_id, x, y),
            ClientEvent::JoinChat {
                room_id,
                user_id: _,
                username,
            } => {
                // Chat is open only to connections admitted to the room; the
                // binding's identity wins over the one in the payload.
                let binding = self.bound_to(connection_id, &room_id)?;
                self.chat
                    .join(connection_id, &room_id, binding.user_id, &username)
                    .await?;
            }
            ClientEvent::LeaveChat => self.chat.leave(connection_id),
            ClientEvent::SendMessage(draft) => {
                self.chat.send_message(connection_id, draft).await?;
            }
            ClientEvent::MessageReaction {
                message_id,
                emoji,
                action,
            } => {
                self.chat
                    .react(connection_id, &message_id, &emoji, action)
                    .await?;
            }
            ClientEvent::Typing { is_typing } => self.chat.typing(connection_id, is_typing)?,
        }
        Ok(())
    }

    /// Run `mutate` against the room's canvas under the room lock and
    /// persist the result. `admit` decides whether the actor may draw.
    async fn apply<T>(
        &self,
        room_id: &str,
        actor_id: &str,
        admit: impl FnOnce(&Room) -> CoreResult<()>,
        mutate: impl FnOnce(&mut Canvas, DateTime<Utc>) -> CoreResult<T>,
    ) -> CoreResult<Applied<T>> {
        let guard = self.registry.lock(room_id).await;
        let now = Utc::now();
        let room = self.registry.load_live(room_id, now).await?;
        if !room.settings.allow_drawing {
            return Err(CoreError::DrawingDisabled);
        }
        admit(&room)?;

        let store = self.registry.store();
        let mut canvas = load_or_create(store.as_ref(), &room, now).await?;
        let value = mutate(&mut canvas, now)?;
        store.save_canvas(&canvas).await?;
        log::debug!(
            "Canvas of room {} at version {} after change by {}",
            room_id,
            canvas.version,
            actor_id
        );

        if let Err(e) = self.registry.touch_activity_locked(room_id, now).await {
            log::warn!("Failed to record activity for room {}: {}", room_id, e);
        }
        Ok(Applied {
            value,
            version: canvas.version,
            _guard: guard,
        })
    }

    /// The binding of `connection_id`, which must be to `room_id`.
    fn bound_to(&self, connection_id: &str, room_id: &str) -> CoreResult<Binding> {
        self.presence
            .binding(connection_id)
            .filter(|binding| binding.room_id == room_id)
            .ok_or_else(|| CoreError::UnauthorizedRoomAccess(room_id.to_string()))
    }

    pub async fn add_shape(
        &self,
        connection_id: &str,
        room_id: &str,
        draft: ShapeDraft,
    ) -> CoreResult<(Shape, u64)> {
        let binding = self.bound_to(connection_id, room_id)?;
        let actor_id = binding.actor_id();
        let applied = self
            .apply(room_id, actor_id, |_| Ok(()), |canvas, now| {
                canvas.add_shape(draft, actor_id, now).cloned()
            })
            .await?;

        self.presence.broadcast(
            room_id,
            &ServerEvent::ShapeAdded {
                shape: applied.value.clone(),
                canvas_version: applied.version,
                added_by: binding.username.clone(),
            },
            Some(connection_id),
        );
        Ok((applied.value, applied.version))
    }

    pub async fn update_shape(
        &self,
        connection_id: &str,
        room_id: &str,
        shape_id: &str,
        updates: ShapePatch,
    ) -> CoreResult<(Shape, u64)> {
        let binding = self.bound_to(connection_id, room_id)?;
        let actor_id = binding.actor_id();
        let applied = self
            .apply(room_id, actor_id, |_| Ok(()), |canvas, now| {
                canvas.update_shape(shape_id, &updates, actor_id, now).cloned()
            })
            .await?;

        self.presence.broadcast(
            room_id,
            &ServerEvent::ShapeUpdated {
                shape_id: shape_id.to_string(),
                updates,
                canvas_version: applied.version,
                updated_by: binding.username.clone(),
            },
            Some(connection_id),
        );
        Ok((applied.value, applied.version))
    }

    pub async fn delete_shape(
        &self,
        connection_id: &str,
        room_id: &str,
        shape_id: &str,
    ) -> CoreResult<(Shape, u64)> {
        let binding = self.bound_to(connection_id, room_id)?;
        let actor_id = binding.actor_id();
        let applied = self
            .apply(room_id, actor_id, |_| Ok(()), |canvas, now| {
                canvas.remove_shape(shape_id, actor_id, now)
            })
            .await?;

        self.presence.broadcast(
            room_id,
            &ServerEvent::ShapeDeleted {
                shape_id: shape_id.to_string(),
                canvas_version: applied.version,
                deleted_by: binding.username.clone(),
            },
            Some(connection_id),
        );
        Ok((applied.value, applied.version))
    }

    pub async fn update_settings(
        &self,
        connection_id: &str,
        room_id: &str,
        patch: CanvasSettingsPatch,
    ) -> CoreResult<u64> {
        let binding = self.bound_to(connection_id, room_id)?;
        let actor_id = binding.actor_id();
        let applied = self
            .apply(room_id, actor_id, |_| Ok(()), |canvas, now| {
                canvas.update_settings(&patch, actor_id, now).cloned()
            })
            .await?;

        self.presence.broadcast(
            room_id,
            &ServerEvent::CanvasSettingsUpdated {
                settings: applied.value.clone(),
                canvas_version: applied.version,
                updated_by: binding.username.clone(),
            },
            Some(connection_id),
        );
        Ok(applied.version)
    }

    /// Add a shape on behalf of an identity outside any realtime
    /// connection. The actor must be an active participant unless the
    /// room admits guests. Every bound connection is notified.
    pub async fn add_shape_as(
        &self,
        actor: &Actor,
        room_id: &str,
        draft: ShapeDraft,
    ) -> CoreResult<(Shape, u64)> {
        let admit = |room: &Room| {
            if room.is_active_participant(&actor.user_id) || room.settings.allow_guests {
                Ok(())
            } else {
                Err(CoreError::UnauthorizedRoomAccess(room.room_id.clone()))
            }
        };
        let applied = self
            .apply(room_id, &actor.user_id, admit, |canvas, now| {
                canvas.add_shape(draft, &actor.user_id, now).cloned()
            })
            .await?;

        self.presence.broadcast(
            room_id,
            &ServerEvent::ShapeAdded {
                shape: applied.value.clone(),
                canvas_version: applied.version,
                added_by: actor.name.clone(),
            },
            None,
        );
        Ok((applied.value, applied.version))
    }

    /// The room's canvas, created on first access.
    pub async fn canvas(&self, room_id: &str) -> CoreResult<Canvas> {
        let _guard = self.registry.lock(room_id).await;
        let now = Utc::now();
        let room = self.registry.load_live(room_id, now).await?;
        load_or_create(self.registry.store().as_ref(), &room, now).await
    }

    pub async fn recent_messages(&self, room_id: &str, limit: usize) -> CoreResult<Vec<ChatMessage>> {
        self.chat.history(room_id, limit).await
    }

    /// React to a message outside any realtime connection.
    pub async fn react_as(
        &self,
        user_id: &str,
        message_id: &str,
        emoji: &str,
        action: ReactionAction,
    ) -> CoreResult<Reactions> {
        self.chat
            .react_as(user_id, None, message_id, emoji, action)
            .await
    }
}
