//! Feed Connection Status
//!
//! Lifecycle states of the feed connection and the transitions between them.
//!
//! ```text
//! Disconnected ──start──► Connecting ──handshake ok──► Connected
//!      ▲                      │                            │
//!      └──── handshake fail ──┘◄── close / error / idle ───┘
//!      │
//!      └── reconnect delay elapsed ──► Connecting
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection status of the market feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No transport, either idle or waiting to reconnect.
    #[default]
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Handshake complete; frames are flowing.
    Connected,
}

impl ConnectionStatus {
    /// Whether `next` is a legal successor of this state.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Disconnected, Self::Connecting)
                | (Self::Connecting, Self::Connected | Self::Disconnected)
                | (Self::Connected, Self::Disconnected)
        )
    }

    /// Whether the feed is live.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Lowercase name, used in logs, metrics and JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    /// State before the transition.
    pub previous: ConnectionStatus,
    /// State after the transition.
    pub current: ConnectionStatus,
    /// When the transition happened.
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionStatus::{Connected, Connecting, Disconnected};

    #[test]
    fn legal_transitions() {
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connecting.can_transition_to(Disconnected));
        assert!(Connected.can_transition_to(Disconnected));
    }

    #[test]
    fn illegal_transitions() {
        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Connected.can_transition_to(Connecting));
        assert!(!Connected.can_transition_to(Connected));
        assert!(!Disconnected.can_transition_to(Disconnected));
    }

    #[test]
    fn default_is_disconnected() {
        assert_eq!(ConnectionStatus::default(), Disconnected);
        assert!(!Disconnected.is_connected());
        assert!(Connected.is_connected());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Connecting).unwrap(), "\"connecting\"");
        assert_eq!(Connected.to_string(), "connected");
    }
}
