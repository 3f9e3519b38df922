use serde::{Deserialize, Serialize};
use std::path::Path;

// =============================================================================
// Unified config (figment-deserialized from defaults / scoutchat.toml / env)
// =============================================================================
//
// Two equivalent ways to configure:
//
//   scoutchat.toml:  [relay]
//                    max_connections = 64
//
//   env var:         SCOUTCHAT_RELAY__MAX_CONNECTIONS=64   (double underscore
//                    = nesting; single underscore stays within field names)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub relay: RelayFileConfig,
}

/// Bind address tunables (lives under `[server]` in scoutchat.toml).
/// CLI flags override both fields; `None` falls back to 127.0.0.1:4000.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

/// Relay policy tunables (lives under `[relay]` in scoutchat.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayFileConfig {
    /// Registry capacity; connections beyond this are refused at upgrade.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Sustained sendMessage rate allowed per connection (0 disables the guard).
    #[serde(default = "default_message_rate_per_sec")]
    pub message_rate_per_sec: f64,
    /// Burst allowance on top of the sustained rate.
    #[serde(default = "default_message_burst")]
    pub message_burst: u32,
    /// When true, typing events are not echoed back to the typist.
    #[serde(default)]
    pub typing_excludes_sender: bool,
    /// Per-connection outbound channel capacity; a full channel drops events.
    #[serde(default = "default_send_channel_capacity")]
    pub send_channel_capacity: usize,
}

impl Default for RelayFileConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            message_rate_per_sec: default_message_rate_per_sec(),
            message_burst: default_message_burst(),
            typing_excludes_sender: false,
            send_channel_capacity: default_send_channel_capacity(),
        }
    }
}

fn default_max_connections() -> usize {
    256
}
fn default_message_rate_per_sec() -> f64 {
    10.0
}
fn default_message_burst() -> u32 {
    20
}
fn default_send_channel_capacity() -> usize {
    100
}

/// Build a figment that layers: defaults → scoutchat.toml → SCOUTCHAT_* env.
pub fn load_config(config_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_dir.join("scoutchat.toml")))
        .merge(Env::prefixed("SCOUTCHAT_").split("__"))
}

// =============================================================================
// Runtime config (derived from FileConfig, used throughout the relay)
// =============================================================================

/// Relay policy configuration (runtime view).
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub max_connections: usize,
    pub message_rate_per_sec: f64,
    pub message_burst: u32,
    pub typing_excludes_sender: bool,
    pub send_channel_capacity: usize,
}

impl RelayConfig {
    pub fn from_file(fc: &RelayFileConfig) -> Self {
        Self {
            max_connections: fc.max_connections,
            message_rate_per_sec: fc.message_rate_per_sec,
            message_burst: fc.message_burst,
            typing_excludes_sender: fc.typing_excludes_sender,
            send_channel_capacity: fc.send_channel_capacity,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::from_file(&RelayFileConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── defaults ────────────────────────────────────────────────────────

    #[test]
    fn test_relay_file_config_defaults() {
        let d = RelayFileConfig::default();
        assert_eq!(d.max_connections, 256);
        assert_eq!(d.message_rate_per_sec, 10.0);
        assert_eq!(d.message_burst, 20);
        assert!(!d.typing_excludes_sender);
        assert_eq!(d.send_channel_capacity, 100);
    }

    #[test]
    fn test_server_file_config_defaults() {
        let d = ServerFileConfig::default();
        assert!(d.host.is_none());
        assert!(d.port.is_none());
    }

    // ── load_config ─────────────────────────────────────────────────────

    #[test]
    fn test_load_config_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let fc: FileConfig = load_config(tmp.path()).extract().unwrap();
        assert!(fc.server.host.is_none());
        assert_eq!(fc.relay.max_connections, 256);
    }

    #[test]
    fn test_load_config_toml_sets_values() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("scoutchat.toml"),
            "[server]\nhost = \"0.0.0.0\"\nport = 8080\n\n[relay]\nmax_connections = 32\ntyping_excludes_sender = true\n",
        )
        .unwrap();
        let fc: FileConfig = load_config(tmp.path()).extract().unwrap();
        assert_eq!(fc.server.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(fc.server.port, Some(8080));
        assert_eq!(fc.relay.max_connections, 32);
        assert!(fc.relay.typing_excludes_sender);
        // Untouched fields keep their defaults.
        assert_eq!(fc.relay.message_burst, 20);
    }

    #[test]
    fn test_load_config_missing_file_is_fine() {
        let tmp = tempfile::tempdir().unwrap();
        // No scoutchat.toml in the directory; defaults apply.
        let fc: FileConfig = load_config(tmp.path()).extract().unwrap();
        assert_eq!(fc.relay.send_channel_capacity, 100);
    }

    // ── RelayConfig::from_file ──────────────────────────────────────────

    #[test]
    fn test_relay_config_from_file() {
        let fc = RelayFileConfig {
            max_connections: 8,
            message_rate_per_sec: 2.5,
            message_burst: 5,
            typing_excludes_sender: true,
            send_channel_capacity: 16,
        };
        let rc = RelayConfig::from_file(&fc);
        assert_eq!(rc.max_connections, 8);
        assert_eq!(rc.message_rate_per_sec, 2.5);
        assert_eq!(rc.message_burst, 5);
        assert!(rc.typing_excludes_sender);
        assert_eq!(rc.send_channel_capacity, 16);
    }
}
