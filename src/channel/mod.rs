//!
//! Duplex event channel streaming graph pages and address history to the
//! visualization client.

/// Request handling
pub mod handlers;
/// WebSocket listener
pub mod server;
pub mod types;

pub use handlers::ChannelService;
pub use types::*;
