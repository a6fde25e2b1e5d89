//! WebSocket surface: packet protocol, connection handlers and the
//! translation of game outcomes into notifications

pub mod dispatch;
pub mod handler;
pub mod protocol;

pub use handler::{play_handler, watch_handler};
