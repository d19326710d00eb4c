//! Room records: metadata, participants and lifecycle.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Characters room codes are drawn from.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Sample a room code of `len` characters from [`ROOM_CODE_ALPHABET`].
pub fn generate_room_code(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// The identity acting on a room, as supplied by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: String,
    pub name: String,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
        }
    }
}

/// Identifies one participant record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seat<'a> {
    /// An authenticated user; rejoining reuses the record.
    User(&'a str),
    /// A guest, keyed by the connection that seated it.
    Guest(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    #[default]
    Active,
    Paused,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Absent for guests.
    pub user_id: Option<String>,
    /// Connection that seated a guest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_key: Option<String>,
    pub name: String,
    pub joined_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomSettings {
    pub allow_guests: bool,
    pub allow_drawing: bool,
    pub allow_chat: bool,
    pub auto_save: bool,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            allow_guests: true,
            allow_drawing: true,
            allow_chat: true,
            auto_save: true,
        }
    }
}

/// Partial settings update; absent flags are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_guests: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_drawing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_chat: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_save: Option<bool>,
}

impl RoomSettingsPatch {
    pub fn apply(&self, settings: &mut RoomSettings) {
        if let Some(v) = self.allow_guests {
            settings.allow_guests = v;
        }
        if let Some(v) = self.allow_drawing {
            settings.allow_drawing = v;
        }
        if let Some(v) = self.allow_chat {
            settings.allow_chat = v;
        }
        if let Some(v) = self.auto_save {
            settings.auto_save = v;
        }
    }
}

/// A named, access-controlled collaboration space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_by: String,
    pub is_public: bool,
    /// Argon2 PHC string; never the plaintext.
    pub password_hash: Option<String>,
    pub max_participants: u32,
    pub participants: Vec<Participant>,
    /// Always the number of active participants.
    pub current_participants: u32,
    pub settings: RoomSettings,
    pub status: RoomStatus,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Room {
    pub fn new(
        room_id: String,
        name: String,
        created_by: String,
        max_participants: u32,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            room_id,
            name,
            description: String::new(),
            created_by,
            is_public: true,
            password_hash: None,
            max_participants,
            participants: Vec::new(),
            current_participants: 0,
            settings: RoomSettings::default(),
            status: RoomStatus::Active,
            last_activity: now,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    fn find_seat(&self, seat: Seat<'_>) -> Option<usize> {
        self.participants.iter().position(|p| match seat {
            Seat::User(id) => p.user_id.as_deref() == Some(id),
            Seat::Guest(key) => p.user_id.is_none() && p.guest_key.as_deref() == Some(key),
        })
    }

    fn recount(&mut self) {
        self.current_participants =
            self.participants.iter().filter(|p| p.is_active).count() as u32;
    }

    /// Whether admitting `seat` would add an active participant.
    ///
    /// Re-joining while already active does not take a new seat.
    pub fn takes_new_seat(&self, seat: Seat<'_>) -> bool {
        match self.find_seat(seat) {
            Some(index) => !self.participants[index].is_active,
            None => true,
        }
    }

    /// Add or reactivate a participant. Returns `true` when an existing
    /// record was reactivated.
    pub fn add_participant(&mut self, seat: Seat<'_>, name: &str, now: DateTime<Utc>) -> bool {
        let reactivated = match self.find_seat(seat) {
            Some(index) => {
                let participant = &mut self.participants[index];
                participant.is_active = true;
                participant.joined_at = now;
                true
            }
            None => {
                let (user_id, guest_key) = match seat {
                    Seat::User(id) => (Some(id.to_string()), None),
                    Seat::Guest(key) => (None, Some(key.to_string())),
                };
                self.participants.push(Participant {
                    user_id,
                    guest_key,
                    name: name.to_string(),
                    joined_at: now,
                    is_active: true,
                });
                false
            }
        };
        self.recount();
        self.touch(now);
        reactivated
    }

    /// Mark a participant inactive. Returns `true` if anything changed.
    /// A user's record stays, inactive, for reuse on rejoin. A guest's
    /// record is dropped.
    pub fn remove_participant(&mut self, seat: Seat<'_>) -> bool {
        let changed = match (seat, self.find_seat(seat)) {
            (Seat::Guest(_), Some(index)) => {
                self.participants.remove(index);
                true
            }
            (Seat::User(_), Some(index)) if self.participants[index].is_active => {
                self.participants[index].is_active = false;
                true
            }
            _ => false,
        };
        self.recount();
        changed
    }

    pub fn is_active_participant(&self, user_id: &str) -> bool {
        self.find_seat(Seat::User(user_id))
            .is_some_and(|index| self.participants[index].is_active)
    }

    pub fn active_participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| p.is_active)
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn requires_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Public view of the room, without the password hash.
    pub fn view(&self) -> RoomView {
        RoomView {
            room_id: self.room_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            created_by: self.created_by.clone(),
            is_public: self.is_public,
            requires_password: self.requires_password(),
            max_participants: self.max_participants,
            current_participants: self.current_participants,
            participants: self.active_participants().cloned().collect(),
            settings: self.settings.clone(),
            status: self.status,
            last_activity: self.last_activity,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

/// What clients are allowed to see of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub room_id: String,
    pub name: String,
    pub description: String,
    pub created_by: String,
    pub is_public: bool,
    pub requires_password: bool,
    pub max_participants: u32,
    pub current_participants: u32,
    /// Active participants only.
    pub participants: Vec<Participant>,
    pub settings: RoomSettings,
    pub status: RoomStatus,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
