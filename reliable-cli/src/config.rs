//! Configuration file support for the command-line tools

use reliable_protocol::{SessionConfig, Tick};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Protocol parameters shared by client and server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Packets in flight / reorder depth
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Retransmission timeout in ticks
    #[serde(default = "default_timeout")]
    pub retransmission_timeout: Tick,
    /// Wall-clock length of one tick
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

fn default_window_size() -> usize {
    8
}

fn default_timeout() -> Tick {
    5
}

fn default_tick_interval() -> u64 {
    40
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            window_size: default_window_size(),
            retransmission_timeout: default_timeout(),
            tick_interval_ms: default_tick_interval(),
        }
    }
}

impl SessionSettings {
    /// Validated protocol configuration
    pub fn session_config(&self) -> Result<SessionConfig, ConfigFileError> {
        Ok(SessionConfig::new(
            self.window_size,
            self.retransmission_timeout,
        )?)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server to talk to
    pub peer: SocketAddr,
    /// Optional local bind address
    pub bind: Option<SocketAddr>,
    /// Bytes of stdout buffering before delivery pushes back
    #[serde(default = "default_buffer_size")]
    pub output_buffer: usize,
    /// Statistics interval in seconds (0 disables)
    #[serde(default)]
    pub stats_interval_secs: u64,
    /// Stay open until the peer has echoed every byte sent
    #[serde(default = "default_await_reply")]
    pub await_reply: bool,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub listen: SocketAddr,
    /// Bytes each peer's echo pipe may hold
    #[serde(default = "default_buffer_size")]
    pub echo_buffer: usize,
    /// Statistics interval in seconds (0 disables)
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
    /// Drop a peer silent for this many seconds (0 keeps it forever)
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_buffer_size() -> usize {
    64 * 1024
}

fn default_stats_interval() -> u64 {
    1
}

fn default_await_reply() -> bool {
    true
}

fn default_idle_timeout() -> u64 {
    30
}

/// Combined configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionSettings,
    pub client: Option<ClientConfig>,
    pub server: Option<ServerConfig>,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigFileError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigFileError> {
        let config: Config = toml::from_str(contents)?;
        config.session.session_config()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigFileError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Example configuration covering both modes
    pub fn example() -> Self {
        Config {
            session: SessionSettings::default(),
            client: Some(ClientConfig {
                peer: SocketAddr::from(([127, 0, 0, 1], 9000)),
                bind: None,
                output_buffer: default_buffer_size(),
                stats_interval_secs: 0,
                await_reply: default_await_reply(),
            }),
            server: Some(ServerConfig {
                listen: SocketAddr::from(([0, 0, 0, 0], 9000)),
                echo_buffer: default_buffer_size(),
                stats_interval_secs: default_stats_interval(),
                idle_timeout_secs: default_idle_timeout(),
            }),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid session settings: {0}")]
    Session(#[from] reliable_protocol::ConfigError),
}

impl ClientConfig {
    /// Get statistics interval as Duration
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }
}

impl ServerConfig {
    /// Get statistics interval as Duration
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }

    /// Idle timeout in whole ticks of length `tick`, at least one
    pub fn idle_limit_ticks(&self, tick: Duration) -> Tick {
        if self.idle_timeout_secs == 0 {
            return 0;
        }
        let tick_ms = tick.as_millis().max(1);
        let ticks = u128::from(self.idle_timeout_secs) * 1000 / tick_ms;
        Tick::try_from(ticks).unwrap_or(Tick::MAX).max(1)
    }
}
