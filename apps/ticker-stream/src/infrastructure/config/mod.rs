//! Configuration Module
//!
//! Configuration loading for the ticker stream service.

mod settings;

pub use settings::{
    ChannelSettings, ConfigError, ConnectionSettings, FeedConfig, ReconnectSettings,
    ServerSettings, StreamSettings,
};
