//! Grid battle game server
//!
//! Players fight on a shared tile map over a WebSocket request/reply
//! protocol, while spectators receive batched notifications of everything
//! their player perceives.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod notify;
pub mod util;
pub mod ws;
