//! Connection registry, broadcast groups and room presence.

use crate::canvas::{load_or_create, CanvasSnapshot};
use crate::error::{CoreError, CoreResult};
use crate::registry::{JoinRequest, RoomRegistry};
use crate::room::Seat;
use crate::sync::ServerEvent;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

pub type ConnectionId = String;

/// Outbound queue of one connection.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Live connections and their outbound queues.
#[derive(Default)]
pub struct Connections {
    senders: DashMap<ConnectionId, EventSender>,
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connection_id: &str, sender: EventSender) {
        self.senders.insert(connection_id.to_string(), sender);
    }

    pub fn deregister(&self, connection_id: &str) {
        self.senders.remove(connection_id);
    }

    /// Queue an event. Returns `false` if the connection is gone; the
    /// event is then dropped.
    pub fn send(&self, connection_id: &str, event: ServerEvent) -> bool {
        match self.senders.get(connection_id) {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

/// Room id to the set of connections that receive its broadcasts.
#[derive(Default)]
pub struct BroadcastGroups {
    groups: DashMap<String, HashSet<ConnectionId>>,
}

impl BroadcastGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, room_id: &str, connection_id: &str) {
        self.groups
            .entry(room_id.to_string())
            .or_default()
            .insert(connection_id.to_string());
    }

    pub fn detach(&self, room_id: &str, connection_id: &str) {
        if let Some(mut members) = self.groups.get_mut(room_id) {
            members.remove(connection_id);
        }
        self.groups.remove_if(room_id, |_, members| members.is_empty());
    }

    pub fn members(&self, room_id: &str) -> Vec<ConnectionId> {
        self.groups
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Deliver `event` to every member of the group except `except`.
    /// Returns the number of connections that accepted it.
    pub fn broadcast(
        &self,
        connections: &Connections,
        room_id: &str,
        event: &ServerEvent,
        except: Option<&str>,
    ) -> usize {
        // Snapshot the members so no map shard is held while sending.
        self.members(room_id)
            .into_iter()
            .filter(|id| Some(id.as_str()) != except)
            .filter(|id| connections.send(id, event.clone()))
            .count()
    }
}

/// Association of one connection with one room and user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub connection_id: ConnectionId,
    pub room_id: String,
    /// Absent for guests.
    pub user_id: Option<String>,
    pub username: String,
}

impl Binding {
    /// Identity recorded on mutations: the user id, or the connection id
    /// for guests.
    pub fn actor_id(&self) -> &str {
        self.user_id.as_deref().unwrap_or(&self.connection_id)
    }

    /// The participant record this binding holds.
    pub fn seat(&self) -> Seat<'_> {
        match &self.user_id {
            Some(user_id) => Seat::User(user_id),
            None => Seat::Guest(&self.connection_id),
        }
    }
}

/// Tracks which connection is bound to which room.
///
/// A connection is either unbound or bound to exactly one room; binding
/// to another room first unbinds the current one.
pub struct PresenceTracker {
    registry: Arc<RoomRegistry>,
    connections: Arc<Connections>,
    groups: BroadcastGroups,
    bindings: DashMap<ConnectionId, Binding>,
}

impl PresenceTracker {
    pub fn new(registry: Arc<RoomRegistry>, connections: Arc<Connections>) -> Self {
        Self {
            registry,
            connections,
            groups: BroadcastGroups::new(),
            bindings: DashMap::new(),
        }
    }

    pub fn binding(&self, connection_id: &str) -> Option<Binding> {
        self.bindings.get(connection_id).map(|b| b.clone())
    }

    pub fn members(&self, room_id: &str) -> Vec<ConnectionId> {
        self.groups.members(room_id)
    }

    pub fn broadcast(&self, room_id: &str, event: &ServerEvent, except: Option<&str>) -> usize {
        self.groups
            .broadcast(&self.connections, room_id, event, except)
    }

    /// Join the room through the registry and attach the connection to
    /// its broadcast group.
    ///
    /// The joiner receives `canvas-state`; everyone else `user-joined`.
    pub async fn bind(
        &self,
        connection_id: &str,
        request: &JoinRequest,
    ) -> CoreResult<CanvasSnapshot> {
        if self.bindings.contains_key(connection_id) {
            self.unbind(connection_id).await?;
        }

        let mut request = request.clone();
        if request.user_id.is_none() {
            request.guest_key = Some(connection_id.to_string());
        }

        let _guard = self.registry.lock(&request.room_id).await;
        let now = Utc::now();
        let room = self.registry.join_room_locked(&request, now).await?;
        let canvas = load_or_create(self.registry.store().as_ref(), &room, now).await?;
        let snapshot = canvas.snapshot();

        let binding = Binding {
            connection_id: connection_id.to_string(),
            room_id: room.room_id.clone(),
            user_id: request.user_id.clone(),
            username: request.name.trim().to_string(),
        };
        self.bindings
            .insert(connection_id.to_string(), binding.clone());
        self.groups.attach(&binding.room_id, connection_id);

        self.connections
            .send(connection_id, ServerEvent::CanvasState(snapshot.clone()));
        self.broadcast(
            &binding.room_id,
            &ServerEvent::UserJoined {
                user_id: binding.user_id.clone(),
                username: binding.username.clone(),
                connection_id: connection_id.to_string(),
            },
            Some(connection_id),
        );
        log::info!(
            "Connection {} bound to room {} as {}",
            connection_id,
            binding.room_id,
            binding.username
        );
        Ok(snapshot)
    }

    /// Detach the connection from its room. No-op when unbound.
    ///
    /// The participant is marked inactive only when no other connection
    /// of the same user remains bound to the room.
    pub async fn unbind(&self, connection_id: &str) -> CoreResult<()> {
        let Some((_, binding)) = self.bindings.remove(connection_id) else {
            return Ok(());
        };

        self.groups.detach(&binding.room_id, connection_id);

        // Checked under the room lock so a concurrent bind of another tab
        // is either visible here or rejoins after the leave.
        let _guard = self.registry.lock(&binding.room_id).await;
        let still_present = binding.user_id.as_deref().is_some_and(|user_id| {
            self.bindings.iter().any(|other| {
                other.room_id == binding.room_id && other.user_id.as_deref() == Some(user_id)
            })
        });
        let left = if still_present {
            Ok(())
        } else {
            match self
                .registry
                .leave_room_locked(&binding.room_id, binding.seat())
                .await
            {
                Ok(_) => Ok(()),
                Err(CoreError::RoomNotFound(room_id)) => {
                    log::warn!(
                        "Room {} vanished before {} left",
                        room_id,
                        binding.actor_id()
                    );
                    Ok(())
                }
                Err(e) => Err(e),
            }
        };

        self.broadcast(
            &binding.room_id,
            &ServerEvent::UserLeft {
                user_id: binding.user_id.clone(),
                username: binding.username.clone(),
                connection_id: connection_id.to_string(),
            },
            None,
        );
        log::info!(
            "Connection {} unbound from room {}",
            connection_id,
            binding.room_id
        );
        left
    }

    /// Relay a cursor position to the rest of the group. Ignored when the
    /// connection is unbound.
    pub fn relay_cursor(&self, connection_id: &str, x: f64, y: f64) {
        let Some(binding) = self.binding(connection_id) else {
            return;
        };
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        let event = ServerEvent::CursorMoved {
            user_id: binding.user_id.clone(),
            username: binding.username.clone(),
            x,
            y,
        };
        let delivered = self.broadcast(&binding.room_id, &event, Some(connection_id));
        log::debug!(
            "Cursor of {} relayed to {} peers in room {}",
            connection_id,
            delivered,
            binding.room_id
        );
    }
}
