//! Room registry: creation, membership and lifecycle of rooms.

use crate::config::{EngineConfig, MAX_PARTICIPANTS_LIMIT};
use crate::error::{CoreError, CoreResult};
use crate::locks::{RoomGuard, RoomLocks};
use crate::password::{hash_password, verify_password};
use crate::room::{generate_room_code, Actor, Room, RoomSettingsPatch, RoomStatus, Seat};
use crate::storage::{DocumentStore, StorageError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

/// Produces candidate room codes of the requested length.
pub type CodeGenerator = Arc<dyn Fn(usize) -> String + Send + Sync>;

/// Optional fields accepted when creating a room.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomOptions {
    pub description: Option<String>,
    pub is_public: Option<bool>,
    /// Plaintext; only its hash is stored. Empty means no password.
    pub password: Option<String>,
    pub max_participants: Option<u32>,
    pub settings: Option<RoomSettingsPatch>,
}

/// A request to enter a room. `user_id` is absent for guests, whose seat
/// is keyed by `guest_key` instead.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub room_id: String,
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(skip)]
    pub guest_key: Option<String>,
}

impl JoinRequest {
    pub fn new(room_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            name: name.into(),
            password: None,
            user_id: None,
            guest_key: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_guest_key(mut self, key: impl Into<String>) -> Self {
        self.guest_key = Some(key.into());
        self
    }

    /// The participant record this request occupies, if any.
    pub fn seat(&self) -> Option<Seat<'_>> {
        match (&self.user_id, &self.guest_key) {
            (Some(user_id), _) => Some(Seat::User(user_id)),
            (None, Some(key)) => Some(Seat::Guest(key)),
            (None, None) => None,
        }
    }
}

/// Creator-only changes to a room.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub max_participants: Option<u32>,
    pub settings: Option<RoomSettingsPatch>,
}

fn validate_name(name: &str) -> CoreResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("name must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

/// Admission rules, checked in order: status, capacity, password, guests.
fn admit(room: &Room, request: &JoinRequest) -> CoreResult<()> {
    if room.status != RoomStatus::Active {
        return Err(CoreError::RoomInactive(room.room_id.clone()));
    }
    let new_seat = request.seat().is_none_or(|seat| room.takes_new_seat(seat));
    if new_seat && room.current_participants >= room.max_participants {
        return Err(CoreError::RoomFull(room.room_id.clone()));
    }
    if let Some(hash) = &room.password_hash {
        let password = match request.password.as_deref() {
            Some(pw) if !pw.is_empty() => pw,
            _ => return Err(CoreError::PasswordRequired),
        };
        if !verify_password(password, hash)? {
            return Err(CoreError::InvalidPassword);
        }
    }
    if request.user_id.is_none() && !room.settings.allow_guests {
        return Err(CoreError::GuestsNotAllowed);
    }
    Ok(())
}

fn validate_capacity(max: u32) -> CoreResult<u32> {
    if !(1..=MAX_PARTICIPANTS_LIMIT).contains(&max) {
        return Err(CoreError::Validation(format!(
            "maxParticipants must be between 1 and {}",
            MAX_PARTICIPANTS_LIMIT
        )));
    }
    Ok(max)
}

/// Authoritative owner of room records.
///
/// Every read-modify-write of a room happens under that room's lock from
/// [`RoomRegistry::lock`]. Methods suffixed `_locked` expect the caller
/// to already hold it.
pub struct RoomRegistry {
    store: Arc<dyn DocumentStore>,
    config: EngineConfig,
    locks: RoomLocks,
    generate_code: CodeGenerator,
}

impl RoomRegistry {
    pub fn new(store: Arc<dyn DocumentStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            locks: RoomLocks::new(),
            generate_code: Arc::new(generate_room_code),
        }
    }

    /// Replace the room code source.
    pub fn with_code_generator(mut self, generate: CodeGenerator) -> Self {
        self.generate_code = generate;
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Serialize with every other mutation of `room_id`.
    pub async fn lock(&self, room_id: &str) -> RoomGuard {
        self.locks.acquire(room_id).await
    }

    /// Create a room owned by `creator`, who becomes its first participant.
    pub async fn create_room(
        &self,
        name: &str,
        creator: &Actor,
        opts: CreateRoomOptions,
    ) -> CoreResult<Room> {
        let name = validate_name(name)?;
        let max = validate_capacity(
            opts.max_participants
                .unwrap_or(self.config.default_max_participants),
        )?;
        let password_hash = match opts.password.as_deref() {
            Some(pw) if !pw.is_empty() => Some(hash_password(pw)?),
            _ => None,
        };

        let now = Utc::now();
        let mut room = Room::new(
            String::new(),
            name,
            creator.user_id.clone(),
            max,
            now,
            self.config.room_ttl,
        );
        room.description = opts.description.unwrap_or_default();
        room.is_public = opts.is_public.unwrap_or(true);
        room.password_hash = password_hash;
        if let Some(patch) = &opts.settings {
            patch.apply(&mut room.settings);
        }
        room.add_participant(Seat::User(&creator.user_id), &creator.name, now);

        for attempt in 1..=self.config.max_room_id_attempts {
            room.room_id = (self.generate_code)(self.config.room_code_length);
            match self.store.insert_room(&room).await {
                Ok(()) => {
                    log::info!(
                        "Room {} created by {} ({})",
                        room.room_id,
                        creator.user_id,
                        room.name
                    );
                    return Ok(room);
                }
                Err(StorageError::AlreadyExists(_)) => {
                    log::warn!("Room code {} collided (attempt {})", room.room_id, attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(CoreError::RoomIdExhausted(self.config.max_room_id_attempts))
    }

    /// Load a room that exists and has not expired.
    pub async fn load_live(&self, room_id: &str, now: DateTime<Utc>) -> CoreResult<Room> {
        match self.store.get_room(room_id).await? {
            Some(room) if !room.is_expired(now) => Ok(room),
            _ => Err(CoreError::RoomNotFound(room_id.to_string())),
        }
    }

    pub async fn get_room(&self, room_id: &str) -> CoreResult<Room> {
        self.load_live(room_id, Utc::now()).await
    }

    /// Admit a participant, or reactivate a returning one.
    pub async fn join_room(&self, request: &JoinRequest) -> CoreResult<Room> {
        let _guard = self.lock(&request.room_id).await;
        self.join_room_locked(request, Utc::now()).await
    }

    pub(crate) async fn join_room_locked(
        &self,
        request: &JoinRequest,
        now: DateTime<Utc>,
    ) -> CoreResult<Room> {
        let name = validate_name(&request.name)?;
        let mut room = self.load_live(&request.room_id, now).await?;
        admit(&room, request)?;
        let seat = request.seat().ok_or_else(|| {
            CoreError::Validation("a guest seat needs a connection key".to_string())
        })?;

        let reactivated = room.add_participant(seat, &name, now);
        self.store.save_room(&room).await?;
        log::info!(
            "{} {} room {} ({}/{})",
            name,
            if reactivated { "rejoined" } else { "joined" },
            room.room_id,
            room.current_participants,
            room.max_participants
        );
        Ok(room)
    }

    /// Run the admission rules without taking a seat.
    pub async fn check_admission(&self, request: &JoinRequest) -> CoreResult<Room> {
        validate_name(&request.name)?;
        let room = self.load_live(&request.room_id, Utc::now()).await?;
        admit(&room, request)?;
        Ok(room)
    }

    /// Mark a participant inactive. Leaving twice is a no-op.
    pub async fn leave_room(&self, room_id: &str, seat: Seat<'_>) -> CoreResult<Room> {
        let _guard = self.lock(room_id).await;
        self.leave_room_locked(room_id, seat).await
    }

    pub(crate) async fn leave_room_locked(&self, room_id: &str, seat: Seat<'_>) -> CoreResult<Room> {
        let mut room = self.load_live(room_id, Utc::now()).await?;
        if room.remove_participant(seat) {
            self.store.save_room(&room).await?;
            log::info!(
                "{:?} left room {} ({}/{})",
                seat,
                room_id,
                room.current_participants,
                room.max_participants
            );
        }
        Ok(room)
    }

    pub async fn touch_activity(&self, room_id: &str) -> CoreResult<()> {
        let _guard = self.lock(room_id).await;
        self.touch_activity_locked(room_id, Utc::now()).await
    }

    pub(crate) async fn touch_activity_locked(
        &self,
        room_id: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        let mut room = self.load_live(room_id, now).await?;
        room.touch(now);
        self.store.save_room(&room).await?;
        Ok(())
    }

    /// Apply a creator-only update.
    pub async fn update_room(
        &self,
        room_id: &str,
        actor_id: &str,
        update: RoomUpdate,
    ) -> CoreResult<Room> {
        let _guard = self.lock(room_id).await;
        let now = Utc::now();
        let mut room = self.load_live(room_id, now).await?;
        if room.created_by != actor_id {
            return Err(CoreError::NotRoomCreator);
        }

        if let Some(name) = &update.name {
            room.name = validate_name(name)?;
        }
        if let Some(max) = update.max_participants {
            room.max_participants = validate_capacity(max)?;
        }
        if let Some(description) = update.description {
            room.description = description;
        }
        if let Some(patch) = &update.settings {
            patch.apply(&mut room.settings);
        }
        room.touch(now);
        self.store.save_room(&room).await?;
        log::info!("Room {} updated by {}", room_id, actor_id);
        Ok(room)
    }

    /// Soft delete: the record stays but rejects new joins.
    pub async fn end_room(&self, room_id: &str, actor_id: &str) -> CoreResult<Room> {
        let _guard = self.lock(room_id).await;
        let now = Utc::now();
        let mut room = self.load_live(room_id, now).await?;
        if room.created_by != actor_id {
            return Err(CoreError::NotRoomCreator);
        }

        room.status = RoomStatus::Ended;
        room.touch(now);
        self.store.save_room(&room).await?;
        log::info!("Room {} ended by {}", room_id, actor_id);
        Ok(room)
    }

    /// Physically delete rooms past `expiresAt` with their canvas and
    /// messages. Returns how many rooms were removed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> CoreResult<usize> {
        let expired: Vec<String> = self
            .store
            .list_rooms()
            .await?
            .into_iter()
            .filter(|room| room.is_expired(now))
            .map(|room| room.room_id)
            .collect();

        for room_id in &expired {
            let _guard = self.lock(room_id).await;
            self.store.delete_canvas(room_id).await?;
            self.store.delete_messages(room_id).await?;
            self.store.delete_room(room_id).await?;
        }

        if !expired.is_empty() {
            log::info!("Purged {} expired rooms", expired.len());
        }
        Ok(expired.len())
    }
}
