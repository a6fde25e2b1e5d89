//! Application wiring

mod state;

pub use state::{AppState, SessionRegistry, SetupError};
