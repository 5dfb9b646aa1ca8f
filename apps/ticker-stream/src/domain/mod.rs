//! Domain Layer - Feed events and aggregate market state.
//!
//! Pure types and transitions with no I/O. Everything here is
//! deterministic and serializable.

/// Wire event types (ticks, order acknowledgements) and decode errors.
pub mod events;

/// Per-symbol aggregate state and validation warnings.
pub mod ticker;

/// Connection lifecycle states.
pub mod connection;
