//! Request handlers for sync operations.

mod bootstrap;
mod fetch_patch;
mod patch_broadcast;
mod storeid;
mod websocket;

pub use bootstrap::*;
pub use fetch_patch::*;
pub use patch_broadcast::*;
pub use storeid::*;
pub use websocket::handle_websocket_connection;
