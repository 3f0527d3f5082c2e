//! Configuration loading and management.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server identity and listen address.
    #[serde(default)]
    pub server: ServerConfig,
    /// Durable snapshot storage.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Matchmaking policy.
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Report/ban policy.
    #[serde(default)]
    pub moderation: ModerationConfig,
    /// Flood protection.
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name shown in the welcome banner.
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Address the line gateway listens on.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Seconds a new connection gets to complete the HELLO handshake.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            listen: default_listen(),
            handshake_timeout: default_handshake_timeout(),
        }
    }
}

fn default_server_name() -> String {
    "duetd.local".to_string()
}

fn default_listen() -> SocketAddr {
    "127.0.0.1:7464".parse().expect("static listen address")
}

fn default_handshake_timeout() -> u64 {
    30
}

/// Snapshot storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path of the JSON state snapshot.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("duetd-state.json")
}

/// How waiting users are bucketed and paired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairingMode {
    /// Gender buckets; a seeker is paired from the opposite bucket.
    Preference,
    /// Single pool, first come first served regardless of profile.
    Fifo,
}

/// Which profile fields must be set before matchmaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequiredProfile {
    /// Only gender must be set.
    Gender,
    /// Gender, age, and country must all be set.
    Full,
}

/// Matchmaking policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    /// Queue partitioning and compatibility policy.
    #[serde(default = "default_pairing_mode")]
    pub pairing: PairingMode,
    /// Profile completeness required before `/find`.
    #[serde(default = "default_required_profile")]
    pub required_profile: RequiredProfile,
    /// Whether a skipped partner is put back into the queue automatically.
    #[serde(default)]
    pub requeue_skipped: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            pairing: default_pairing_mode(),
            required_profile: default_required_profile(),
            requeue_skipped: false,
        }
    }
}

fn default_pairing_mode() -> PairingMode {
    PairingMode::Preference
}

fn default_required_profile() -> RequiredProfile {
    RequiredProfile::Gender
}

/// Report/ban policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ModerationConfig {
    /// Reports required to trigger a ban.
    #[serde(default = "default_ban_threshold")]
    pub ban_threshold: u32,
    /// Ban duration in seconds.
    #[serde(default = "default_ban_duration")]
    pub ban_duration_secs: i64,
    /// Reset the report count to zero when a ban is applied.
    #[serde(default = "default_reset_on_ban")]
    pub reset_on_ban: bool,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            ban_threshold: default_ban_threshold(),
            ban_duration_secs: default_ban_duration(),
            reset_on_ban: default_reset_on_ban(),
        }
    }
}

fn default_ban_threshold() -> u32 {
    10
}

fn default_ban_duration() -> i64 {
    24 * 60 * 60
}

fn default_reset_on_ban() -> bool {
    true
}

/// Rate limit configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Messages per second allowed per user.
    #[serde(default = "default_message_rate")]
    pub message_rate_per_second: u32,
    /// Connection burst allowed per IP.
    #[serde(default = "default_connection_burst")]
    pub connection_burst_per_ip: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            message_rate_per_second: default_message_rate(),
            connection_burst_per_ip: default_connection_burst(),
        }
    }
}

fn default_message_rate() -> u32 {
    5
}

fn default_connection_burst() -> u32 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_policy_constants() {
        let config = Config::default();
        assert_eq!(config.moderation.ban_threshold, 10);
        assert_eq!(config.moderation.ban_duration_secs, 86_400);
        assert!(config.moderation.reset_on_ban);
        assert_eq!(config.matching.pairing, PairingMode::Preference);
        assert!(!config.matching.requeue_skipped);
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [server]
            name = "test.duetd"
            listen = "127.0.0.1:0"

            [matching]
            pairing = "fifo"
            required_profile = "full"

            [moderation]
            ban_threshold = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.server.name, "test.duetd");
        assert_eq!(config.matching.pairing, PairingMode::Fifo);
        assert_eq!(config.matching.required_profile, RequiredProfile::Full);
        assert_eq!(config.moderation.ban_threshold, 3);
        // Unspecified sections fall back to defaults.
        assert_eq!(config.moderation.ban_duration_secs, 86_400);
        assert_eq!(config.storage.path, PathBuf::from("duetd-state.json"));
    }

    #[test]
    fn empty_toml_is_fully_defaulted() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.name, "duetd.local");
        assert_eq!(config.rate_limits.message_rate_per_second, 5);
    }
}
