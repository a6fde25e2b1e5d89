//! Application state shared across routes

use std::fs;
use std::sync::Arc;

use dashmap::DashMap;
use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::game::{Battle, CharacterKind, GameMap, Terrain, UserId};
use crate::notify::Distributor;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub battle: Arc<Battle>,
    pub distributor: Arc<Distributor>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    /// Build the map, spawn the roster and create one mailbox per user
    pub fn new(config: Config) -> Result<Self, SetupError> {
        let config = Arc::new(config);

        let seed = config.map_seed.unwrap_or_else(|| rand::thread_rng().gen());
        let map = match &config.map_file {
            Some(path) => {
                let raw = fs::read_to_string(path)?;
                let rows: Vec<Vec<Terrain>> = serde_json::from_str(&raw)?;
                GameMap::from_terrain(rows, seed)?
            }
            None => GameMap::new(config.map_width, config.map_height, seed),
        };
        info!(
            width = map.width(),
            height = map.height(),
            seed,
            "Map created"
        );

        let battle = Arc::new(Battle::new(map));
        for &user_id in &config.roster {
            battle.spawn_player(user_id, CharacterKind::default())?;
        }

        let distributor = Arc::new(Distributor::new(config.roster.clone()));

        Ok(Self {
            config,
            battle,
            distributor,
            sessions: Arc::new(SessionRegistry::new()),
        })
    }
}

/// At most one play connection per user
pub struct SessionRegistry {
    sessions: DashMap<UserId, Uuid>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Claim the play slot of `user_id`. Returns the session id, or `None`
    /// when another connection holds it.
    pub fn open(&self, user_id: UserId) -> Option<Uuid> {
        use dashmap::mapref::entry::Entry;

        match self.sessions.entry(user_id) {
            Entry::Occupied(_) => {
                warn!(user_id, "Multiple play connections for same user");
                None
            }
            Entry::Vacant(slot) => {
                let session_id = Uuid::new_v4();
                slot.insert(session_id);
                Some(session_id)
            }
        }
    }

    /// Release the slot if `session_id` still owns it
    pub fn close(&self, user_id: UserId, session_id: Uuid) {
        self.sessions.remove_if(&user_id, |_, held| *held == session_id);
    }

    pub fn active(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Failures while preparing a round
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Failed to read map file: {0}")]
    MapFile(#[from] std::io::Error),

    #[error("Failed to parse map file: {0}")]
    MapFormat(#[from] serde_json::Error),

    #[error("Invalid map: {0}")]
    Map(#[from] crate::game::MapError),

    #[error("Failed to spawn roster: {0}")]
    Spawn(#[from] crate::game::ActionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_session_is_refused_until_the_first_closes() {
        let sessions = SessionRegistry::new();
        let first = sessions.open(7).unwrap();
        assert!(sessions.open(7).is_none());

        sessions.close(7, Uuid::new_v4());
        assert_eq!(sessions.active(), 1);

        sessions.close(7, first);
        assert!(sessions.open(7).is_some());
    }
}
