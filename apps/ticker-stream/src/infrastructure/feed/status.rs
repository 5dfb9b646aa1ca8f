//! Connection Status Board
//!
//! Publishes the connection manager's status. Observers either read the
//! current value, wait on a `watch` receiver, or follow every transition
//! through a `broadcast` receiver.
//!
//! # Ownership
//!
//! Only one session writes at a time. A session [`claim`](StatusBoard::claim)s
//! the board when it starts and tags every write with the returned epoch.
//! Writes from a superseded session (one still tearing down after `stop`
//! while a new `start` is already running) are discarded.

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};

use crate::domain::connection::{ConnectionStatus, StatusChange};
use crate::infrastructure::metrics;

const CHANGES_CAPACITY: usize = 64;

/// Owner of the current [`ConnectionStatus`].
#[derive(Debug)]
pub struct StatusBoard {
    current: watch::Sender<ConnectionStatus>,
    changes: broadcast::Sender<StatusChange>,
    epoch: Mutex<u64>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    /// Create a board in the `Disconnected` state.
    #[must_use]
    pub fn new() -> Self {
        let (current, _) = watch::channel(ConnectionStatus::Disconnected);
        let (changes, _) = broadcast::channel(CHANGES_CAPACITY);
        Self {
            current,
            changes,
            epoch: Mutex::new(0),
        }
    }

    /// Hand the board to a new session and return its epoch.
    ///
    /// The status drops to `Disconnected` if the previous owner left it
    /// anywhere else.
    pub fn claim(&self) -> u64 {
        let mut epoch = self.epoch.lock();
        *epoch += 1;
        self.apply(ConnectionStatus::Disconnected);
        *epoch
    }

    /// Move to `next` on behalf of session `epoch`.
    ///
    /// Same-state transitions and writes from a superseded session are
    /// ignored. Returns the recorded change, if any.
    pub fn transition(&self, epoch: u64, next: ConnectionStatus) -> Option<StatusChange> {
        let owner = self.epoch.lock();
        if *owner != epoch {
            tracing::debug!(
                epoch,
                owner = *owner,
                status = %next,
                "Ignoring status from superseded session"
            );
            return None;
        }
        self.apply(next)
    }

    fn apply(&self, next: ConnectionStatus) -> Option<StatusChange> {
        let mut previous = next;
        let changed = self.current.send_if_modified(|status| {
            if *status == next {
                return false;
            }
            previous = *status;
            *status = next;
            true
        });
        if !changed {
            return None;
        }

        if !previous.can_transition_to(next) {
            tracing::warn!(from = %previous, to = %next, "Unexpected status transition");
        }
        tracing::info!(from = %previous, to = %next, "Feed connection status changed");
        metrics::set_connection_status(next);

        let change = StatusChange {
            previous,
            current: next,
            at: Utc::now(),
        };
        let _ = self.changes.send(change);
        Some(change)
    }

    /// Current status.
    #[must_use]
    pub fn current(&self) -> ConnectionStatus {
        *self.current.borrow()
    }

    /// Receiver that always holds the latest status.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.current.subscribe()
    }

    /// Receiver of every subsequent transition.
    #[must_use]
    pub fn changes(&self) -> broadcast::Receiver<StatusChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionStatus::{Connected, Connecting, Disconnected};

    #[test]
    fn starts_disconnected() {
        assert_eq!(StatusBoard::new().current(), Disconnected);
    }

    #[test]
    fn same_state_is_ignored() {
        let board = StatusBoard::new();
        let epoch = board.claim();
        assert!(board.transition(epoch, Disconnected).is_none());
        assert!(board.transition(epoch, Connecting).is_some());
        assert!(board.transition(epoch, Connecting).is_none());
    }

    #[tokio::test]
    async fn changes_are_broadcast_in_order() {
        let board = StatusBoard::new();
        let mut changes = board.changes();
        let epoch = board.claim();

        board.transition(epoch, Connecting);
        board.transition(epoch, Connected);
        board.transition(epoch, Disconnected);

        let seen: Vec<_> = [
            changes.recv().await.unwrap(),
            changes.recv().await.unwrap(),
            changes.recv().await.unwrap(),
        ]
        .iter()
        .map(|c| (c.previous, c.current))
        .collect();
        assert_eq!(
            seen,
            vec![
                (Disconnected, Connecting),
                (Connecting, Connected),
                (Connected, Disconnected),
            ]
        );
    }

    #[tokio::test]
    async fn watch_sees_latest() {
        let board = StatusBoard::new();
        let mut rx = board.watch();
        let epoch = board.claim();
        board.transition(epoch, Connecting);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Connecting);
    }

    #[test]
    fn superseded_session_cannot_overwrite_status() {
        let board = StatusBoard::new();
        let old = board.claim();
        board.transition(old, Connecting);
        board.transition(old, Connected);

        let new = board.claim();
        assert_eq!(board.current(), Disconnected);
        board.transition(new, Connecting);
        board.transition(new, Connected);

        assert!(board.transition(old, Disconnected).is_none());
        assert_eq!(board.current(), Connected);
    }

    #[test]
    fn claim_resets_to_disconnected() {
        let board = StatusBoard::new();
        let epoch = board.claim();
        board.transition(epoch, Connecting);

        let next = board.claim();
        assert!(next > epoch);
        assert_eq!(board.current(), Disconnected);
    }
}
