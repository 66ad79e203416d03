//! Configuration management for cmdlog

pub mod settings;

pub use settings::{
    BackendKind, FramingSettings, HeartbeatSettings, ServerConfig, ServerSettings,
    StorageSettings,
};
