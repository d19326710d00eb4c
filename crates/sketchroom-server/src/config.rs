use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;
use sketchroom_core::config::MAX_PARTICIPANTS_LIMIT;
use sketchroom_core::EngineConfig;

/// A malformed environment variable.
#[derive(Debug, thiserror::Error)]
#[error("{name} must be {expected}, got {value:?}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3030`).
    pub port: u16,
    /// Frontend origin; also the base of shareable room links.
    pub frontend_url: String,
    /// Room lifetime from creation (default: 24h).
    pub room_ttl_hours: i64,
    /// Period of the expired-room purge (default: 300s).
    pub expiry_sweep_secs: u64,
    /// JSON file store location. In-memory storage when unset.
    pub storage_dir: Option<PathBuf>,
    /// Capacity of rooms created without `maxParticipants` (default: 50).
    pub default_max_participants: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3030,
            frontend_url: "http://localhost:3001".to_string(),
            room_ttl_hours: 24,
            expiry_sweep_secs: 300,
            storage_dir: None,
            default_max_participants: 50,
        }
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError {
            name,
            value,
            expected,
        }),
        None => Ok(default),
    }
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `HOST`                     | `0.0.0.0`               |
    /// | `PORT`                     | `3030`                  |
    /// | `FRONTEND_URL`             | `http://localhost:3001` |
    /// | `ROOM_TTL_HOURS`           | `24`                    |
    /// | `EXPIRY_SWEEP_SECS`        | `300`                   |
    /// | `STORAGE_DIR`              | unset (in-memory)       |
    /// | `DEFAULT_MAX_PARTICIPANTS` | `50`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let room_ttl_hours = parse(&lookup, "ROOM_TTL_HOURS", defaults.room_ttl_hours, "a positive integer")?;
        if room_ttl_hours <= 0 {
            return Err(ConfigError {
                name: "ROOM_TTL_HOURS",
                value: room_ttl_hours.to_string(),
                expected: "a positive integer",
            });
        }

        let expiry_sweep_secs = parse(&lookup, "EXPIRY_SWEEP_SECS", defaults.expiry_sweep_secs, "a positive integer")?;
        if expiry_sweep_secs == 0 {
            return Err(ConfigError {
                name: "EXPIRY_SWEEP_SECS",
                value: "0".to_string(),
                expected: "a positive integer",
            });
        }

        let default_max_participants = parse(
            &lookup,
            "DEFAULT_MAX_PARTICIPANTS",
            defaults.default_max_participants,
            "an integer between 1 and 100",
        )?;
        if !(1..=MAX_PARTICIPANTS_LIMIT).contains(&default_max_participants) {
            return Err(ConfigError {
                name: "DEFAULT_MAX_PARTICIPANTS",
                value: default_max_participants.to_string(),
                expected: "an integer between 1 and 100",
            });
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "PORT", defaults.port, "a valid port number")?,
            frontend_url: lookup("FRONTEND_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.frontend_url),
            room_ttl_hours,
            expiry_sweep_secs,
            storage_dir: lookup("STORAGE_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            default_max_participants,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Link a user can follow to open a room in the frontend.
    pub fn shareable_link(&self, room_id: &str) -> String {
        format!("{}/room/{}", self.frontend_url, room_id)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            room_ttl: Duration::hours(self.room_ttl_hours),
            default_max_participants: self.default_max_participants,
            ..EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:3030");
        assert_eq!(config.room_ttl_hours, 24);
        assert!(config.storage_dir.is_none());
        assert_eq!(config.shareable_link("ABCD1234"), "http://localhost:3001/room/ABCD1234");
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("PORT", "8080"),
            ("FRONTEND_URL", "https://sketch.example/"),
            ("ROOM_TTL_HOURS", "2"),
            ("STORAGE_DIR", "/var/lib/sketchroom"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.shareable_link("R"), "https://sketch.example/room/R");
        assert_eq!(config.engine_config().room_ttl, Duration::hours(2));
        assert_eq!(config.storage_dir, Some(PathBuf::from("/var/lib/sketchroom")));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = load(&[("PORT", "not-a-port")]).unwrap_err();
        assert_eq!(err.name, "PORT");
        assert!(load(&[("ROOM_TTL_HOURS", "0")]).is_err());
        assert!(load(&[("DEFAULT_MAX_PARTICIPANTS", "500")]).is_err());
    }
}
