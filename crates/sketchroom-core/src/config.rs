//! Engine tuning knobs.

use chrono::Duration;

/// Default room lifetime, counted from creation.
pub const DEFAULT_ROOM_TTL_HOURS: i64 = 24;

/// Length of generated room codes.
pub const ROOM_CODE_LENGTH: usize = 8;

/// Collision retries before room creation gives up.
pub const MAX_ROOM_ID_ATTEMPTS: usize = 10;

pub const DEFAULT_MAX_PARTICIPANTS: u32 = 50;

/// Upper bound accepted for `maxParticipants`.
pub const MAX_PARTICIPANTS_LIMIT: u32 = 100;

/// Messages replayed to a connection joining the chat.
pub const CHAT_HISTORY_LIMIT: usize = 50;

/// Configuration for the room registry and the channels built on it.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub room_ttl: Duration,
    pub room_code_length: usize,
    pub max_room_id_attempts: usize,
    pub default_max_participants: u32,
    pub chat_history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            room_ttl: Duration::hours(DEFAULT_ROOM_TTL_HOURS),
            room_code_length: ROOM_CODE_LENGTH,
            max_room_id_attempts: MAX_ROOM_ID_ATTEMPTS,
            default_max_participants: DEFAULT_MAX_PARTICIPANTS,
            chat_history_limit: CHAT_HISTORY_LIMIT,
        }
    }
}
