//! Market Feed Adapter
//!
//! WebSocket client for the upstream market feed:
//!
//! - **codec**: JSON payload → [`StreamEvent`](crate::domain::events::StreamEvent)
//! - **endpoint**: URL validation and token attachment
//! - **reconnect**: Backoff schedule between attempts
//! - **status**: Connection status publication
//! - **client**: Connection lifecycle and frame ingestion

pub mod client;
pub mod codec;
pub mod endpoint;
pub mod reconnect;
pub mod status;

pub use client::{FeedClient, FeedClientConfig, FeedClientError};
pub use codec::decode;
pub use endpoint::{Credential, EndpointError, FeedEndpoint};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use status::StatusBoard;
