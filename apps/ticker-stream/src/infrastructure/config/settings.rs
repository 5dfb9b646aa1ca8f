//! Feed Configuration Settings
//!
//! Configuration types for the ticker stream, loaded from environment
//! variables. Every numeric setting falls back to its default when unset or
//! unparseable; only the feed URL is validated strictly.

use std::time::Duration;

use crate::infrastructure::feed::{Credential, FeedEndpoint};

/// Upstream feed location and access.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// WebSocket URL of the market feed.
    pub ws_url: String,
    /// Access token attached to the connect URL.
    pub api_token: Option<Credential>,
    /// Base URL of the upstream HTTP API (health probe).
    pub api_base_url: String,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8080/ws".to_string(),
            api_token: None,
            api_base_url: "http://localhost:8080".to_string(),
        }
    }
}

/// Reconnection backoff settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectSettings {
    /// Initial reconnection delay.
    pub delay_initial: Duration,
    /// Maximum reconnection delay.
    pub delay_max: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
    /// Jitter fraction.
    pub jitter: f64,
    /// Maximum consecutive attempts before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            delay_initial: Duration::from_millis(500),
            delay_max: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
            max_attempts: 0, // Unlimited
        }
    }
}

/// Live connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Bound on the TCP connect plus WebSocket handshake.
    pub connect_timeout: Duration,
    /// Drop the connection after this long without a frame (`None` = never).
    pub idle_timeout: Option<Duration>,
    /// Bound on sending the close frame at shutdown.
    pub close_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            idle_timeout: None,
            close_timeout: Duration::from_secs(2),
        }
    }
}

/// Queue and broadcast channel capacities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSettings {
    /// Capacity of the decode → dispatch queue.
    pub event_queue_capacity: usize,
    /// Capacity of the ticker update broadcast channel.
    pub ticker_updates_capacity: usize,
    /// Capacity of the order acknowledgement broadcast channel.
    pub order_acks_capacity: usize,
    /// Capacity of the diagnostics broadcast channel.
    pub diagnostics_capacity: usize,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            event_queue_capacity: 4_096,
            ticker_updates_capacity: 10_000,
            order_acks_capacity: 1_000,
            diagnostics_capacity: 1_000,
        }
    }
}

/// Local server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Health check HTTP port.
    pub health_port: u16,
    /// Timeout for the upstream health probe.
    pub probe_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            health_port: 8082,
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Complete ticker stream configuration.
#[derive(Debug, Clone, Default)]
pub struct FeedConfig {
    /// Upstream feed.
    pub stream: StreamSettings,
    /// Reconnection backoff.
    pub reconnect: ReconnectSettings,
    /// Live connection behaviour.
    pub connection: ConnectionSettings,
    /// Queue capacities.
    pub channels: ChannelSettings,
    /// Local servers.
    pub server: ServerSettings,
}

impl FeedConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed URL is empty or not a `ws`/`wss` URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed URL is empty or not a `ws`/`wss` URL.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let stream_defaults = StreamSettings::default();
        let ws_url = env.string("FEED_WS_URL").unwrap_or(stream_defaults.ws_url);
        if ws_url.trim().is_empty() {
            return Err(ConfigError::EmptyValue("FEED_WS_URL".to_string()));
        }
        FeedEndpoint::new(&ws_url, None).map_err(|e| ConfigError::InvalidUrl {
            key: "FEED_WS_URL".to_string(),
            reason: e.to_string(),
        })?;

        let stream = StreamSettings {
            ws_url,
            api_token: Credential::from_optional(env.string("FEED_API_TOKEN")),
            api_base_url: env
                .string("FEED_API_BASE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(stream_defaults.api_base_url),
        };

        let reconnect_defaults = ReconnectSettings::default();
        let reconnect = ReconnectSettings {
            delay_initial: env.duration_millis(
                "FEED_RECONNECT_DELAY_INITIAL_MS",
                reconnect_defaults.delay_initial,
            ),
            delay_max: env.duration_secs(
                "FEED_RECONNECT_DELAY_MAX_SECS",
                reconnect_defaults.delay_max,
            ),
            multiplier: env.parse("FEED_RECONNECT_MULTIPLIER", reconnect_defaults.multiplier),
            jitter: env.parse("FEED_RECONNECT_JITTER", reconnect_defaults.jitter),
            max_attempts: env.parse(
                "FEED_MAX_RECONNECT_ATTEMPTS",
                reconnect_defaults.max_attempts,
            ),
        };

        let connection_defaults = ConnectionSettings::default();
        let connection = ConnectionSettings {
            connect_timeout: Some(env.duration_secs(
                "FEED_CONNECT_TIMEOUT_SECS",
                connection_defaults.connect_timeout,
            ))
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(connection_defaults.connect_timeout),
            idle_timeout: Some(env.duration_secs("FEED_IDLE_TIMEOUT_SECS", Duration::ZERO))
                .filter(|timeout| !timeout.is_zero()),
            close_timeout: connection_defaults.close_timeout,
        };

        let channel_defaults = ChannelSettings::default();
        let channels = ChannelSettings {
            event_queue_capacity: env
                .parse(
                    "FEED_EVENT_QUEUE_CAPACITY",
                    channel_defaults.event_queue_capacity,
                )
                .max(1),
            ticker_updates_capacity: env
                .parse(
                    "FEED_TICKER_UPDATES_CAPACITY",
                    channel_defaults.ticker_updates_capacity,
                )
                .max(1),
            order_acks_capacity: env
                .parse("FEED_ORDER_ACKS_CAPACITY", channel_defaults.order_acks_capacity)
                .max(1),
            diagnostics_capacity: env
                .parse(
                    "FEED_DIAGNOSTICS_CAPACITY",
                    channel_defaults.diagnostics_capacity,
                )
                .max(1),
        };

        let server_defaults = ServerSettings::default();
        let server = ServerSettings {
            health_port: env.parse("FEED_HEALTH_PORT", server_defaults.health_port),
            probe_timeout: env.duration_secs(
                "FEED_PROBE_TIMEOUT_SECS",
                server_defaults.probe_timeout,
            ),
        };

        Ok(Self {
            stream,
            reconnect,
            connection,
            channels,
            server,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable is not a usable URL.
    #[error("environment variable {key} is not a valid feed URL: {reason}")]
    InvalidUrl {
        /// Variable name.
        key: String,
        /// Why it was rejected.
        reason: String,
    },
}

struct Env<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.string(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Duration {
        self.string(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Duration {
        self.string(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }
}
