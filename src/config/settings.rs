//! Configuration structures for cmdlog

use crate::store::ring::DEFAULT_CAPACITY;
use crate::{CmdLogError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server settings
    pub server: ServerSettings,
    /// Storage configuration
    pub storage: StorageSettings,
    /// Command framing configuration
    pub framing: FramingSettings,
    /// Heartbeat configuration
    pub heartbeat: HeartbeatSettings,
}

/// Core server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to bind the listener to
    pub bind_address: String,
    /// TCP port to listen on (0 picks a free port)
    pub port: u16,
    /// Buffer size for socket reads and replay chunks
    pub buffer_size: usize,
}

/// Which storage backend holds the history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Fixed-capacity in-memory ring
    Ring,
    /// Unbounded plain file
    File,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Ring => write!(f, "ring"),
            BackendKind::File => write!(f, "file"),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Active backend
    pub backend: BackendKind,
    /// Number of retained commands (ring backend only)
    pub capacity: usize,
    /// Backing file location (file backend only)
    pub file_path: PathBuf,
}

/// Command framing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FramingSettings {
    /// Share one pending-command accumulator across all connections.
    ///
    /// Partial commands from different connections are then spliced together
    /// in arrival order. Off by default: each connection frames on its own.
    pub shared_accumulator: bool,
}

/// Heartbeat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatSettings {
    /// Enable the heartbeat task
    pub enabled: bool,
    /// Ticker period in milliseconds
    pub period_ms: u64,
    /// Number of ticks between timestamp records
    pub ticks_per_stamp: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 9000,
            buffer_size: 1024,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Ring,
            capacity: DEFAULT_CAPACITY,
            file_path: PathBuf::from("/var/tmp/cmdlogdata"),
        }
    }
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            period_ms: 1000,
            ticks_per_stamp: 10,
        }
    }
}

impl HeartbeatSettings {
    /// Ticker period
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CmdLogError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ServerConfig = toml::from_str(&content)
            .map_err(|e| CmdLogError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// `bind_address:port` as accepted by the listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_address.is_empty() {
            return Err(CmdLogError::Config("Bind address cannot be empty".to_string()));
        }
        if self.server.buffer_size == 0 {
            return Err(CmdLogError::Config("Buffer size must be at least 1".to_string()));
        }
        if self.storage.backend == BackendKind::Ring && self.storage.capacity == 0 {
            return Err(CmdLogError::Config("Ring capacity must be at least 1".to_string()));
        }
        if self.storage.backend == BackendKind::File
            && self.storage.file_path.as_os_str().is_empty()
        {
            return Err(CmdLogError::Config("File path cannot be empty".to_string()));
        }
        if self.heartbeat.enabled {
            if self.heartbeat.period_ms == 0 {
                return Err(CmdLogError::Config(
                    "Heartbeat period must be at least 1ms".to_string(),
                ));
            }
            if self.heartbeat.ticks_per_stamp == 0 {
                return Err(CmdLogError::Config(
                    "Heartbeat ticks_per_stamp must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.backend, BackendKind::Ring);
        assert_eq!(config.storage.capacity, 10);
        assert!(!config.framing.shared_accumulator);
        assert_eq!(config.heartbeat.ticks_per_stamp, 10);
        assert_eq!(config.listen_address(), "0.0.0.0:9000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial_sections() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("server.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 9100

[storage]
backend = "file"
file_path = "/tmp/cmdlog-test-data"

[heartbeat]
enabled = false
"#,
        )
        .unwrap();

        let config = ServerConfig::from_file(&path).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.storage.backend, BackendKind::File);
        assert_eq!(config.storage.file_path, PathBuf::from("/tmp/cmdlog-test-data"));
        assert!(!config.heartbeat.enabled);
    }

    #[test]
    fn test_from_file_rejects_bad_backend() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("server.toml");
        std::fs::write(&path, "[storage]\nbackend = \"tape\"\n").unwrap();

        assert!(matches!(
            ServerConfig::from_file(&path),
            Err(CmdLogError::Config(_))
        ));
    }

    #[test]
    fn test_validation() {
        let mut config = ServerConfig::default();
        config.storage.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.server.buffer_size = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.heartbeat.ticks_per_stamp = 0;
        assert!(config.validate().is_err());
        config.heartbeat.enabled = false;
        assert!(config.validate().is_ok());

        let mut config = ServerConfig::default();
        config.storage.backend = BackendKind::File;
        config.storage.file_path = PathBuf::new();
        assert!(config.validate().is_err());
    }
}
