//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::{
    Action, ActionError, Angle, Direction, PlayerView, RelativeLocation, Terrain, ViewCell,
};

/// Reply text for frames that are not valid JSON packets
pub const STATUS_INVALID_JSON: &str = "Invalid JSON format";

/// Reply text when a user opens a second play connection
pub const STATUS_CONNECTION_OPEN: &str =
    "Connection already open - Please close any previous connections before initializing a new one.";

/// Packet sent by a playing client: `{"type": verb, "obj": {...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct ClientPacket {
    #[serde(rename = "type")]
    pub verb: String,
    #[serde(default)]
    pub obj: Option<PacketObj>,
}

/// Union of every verb's parameters; each verb reads the fields it needs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PacketObj {
    pub angle: Option<String>,
    pub direction: Option<String>,
    pub distance: Option<i32>,
}

impl ClientPacket {
    /// Validate the packet into an action
    pub fn into_action(self) -> Result<Action, ActionError> {
        let obj = self.obj.unwrap_or_default();
        let action = match self.verb.as_str() {
            "rotate" => {
                let angle = required(obj.angle, "angle")?;
                Action::Rotate(angle.parse::<Angle>().map_err(|_| invalid_value(&angle, "angle"))?)
            }
            "move" => {
                let direction = required(obj.direction, "direction")?;
                Action::Move(
                    direction
                        .parse::<Direction>()
                        .map_err(|_| invalid_value(&direction, "direction"))?,
                )
            }
            "radar" => Action::Radar,
            "scout" => Action::Scout {
                distance: required(obj.distance, "distance")?,
            },
            "environment" => Action::Environment,
            "watch" => Action::Watch,
            "attack" => Action::Attack,
            "defend" => Action::Defend,
            "undefend" => Action::Undefend,
            "health" => Action::Health,
            other => {
                return Err(ActionError::Validation(format!(
                    "Unknown packet type '{}'",
                    other
                )))
            }
        };
        Ok(action)
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ActionError> {
    value.ok_or_else(|| ActionError::Validation(format!("'.obj.{}' missing", field)))
}

fn invalid_value(value: &str, field: &str) -> ActionError {
    ActionError::Validation(format!(
        "'{}' is not a valid value for '.obj.{}'",
        value, field
    ))
}

/// Reply to every client packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerReply {
    #[serde(rename = "type")]
    pub verb: String,
    pub error: Option<String>,
    pub obj: Option<serde_json::Value>,
}

impl ServerReply {
    pub fn ok(verb: &str, obj: Option<serde_json::Value>) -> Self {
        Self {
            verb: verb.to_string(),
            error: None,
            obj,
        }
    }

    pub fn error(verb: &str, message: impl Into<String>) -> Self {
        Self {
            verb: verb.to_string(),
            error: Some(message.into()),
            obj: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CounterResponse {
    pub counter: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentResponse {
    pub environment_matrix: Vec<Vec<Terrain>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WatchResponse {
    pub health_matrix: Vec<Vec<i32>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttackResponse {
    pub health: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub value: i32,
}

/// Payload of `game` notifications. Every variant names the acting or
/// affected player by render id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GameEvent {
    Rotate {
        grid: String,
        angle: Angle,
        loc: RelativeLocation,
    },
    Move {
        grid: String,
        direction: Direction,
        #[serde(rename = "playerinfo")]
        player_info: PlayerView,
        loc: RelativeLocation,
        #[serde(rename = "newline")]
        new_line: Vec<ViewCell>,
    },
    Radar {
        grid: String,
    },
    Scout {
        grid: String,
        distance: i32,
    },
    Environment {
        grid: String,
    },
    Watch {
        grid: String,
    },
    Attack {
        grid: String,
        loc: RelativeLocation,
    },
    Health {
        grid: String,
        value: i32,
    },
    Death {
        grid: String,
    },
    Spawn {
        grid: String,
        #[serde(rename = "playerinfo")]
        player_info: PlayerView,
    },
    SelfSpawn {
        grid: String,
        loc: RelativeLocation,
        #[serde(rename = "playermapentity")]
        viewport: Vec<Vec<ViewCell>>,
    },
    Defend {
        grid: String,
    },
    Undefend {
        grid: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(json: &str) -> ClientPacket {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_verbs_with_parameters() {
        assert_eq!(
            packet(r#"{"type":"rotate","obj":{"angle":"left"}}"#).into_action(),
            Ok(Action::Rotate(Angle::Left))
        );
        assert_eq!(
            packet(r#"{"type":"scout","obj":{"distance":3}}"#).into_action(),
            Ok(Action::Scout { distance: 3 })
        );
        assert_eq!(
            packet(r#"{"type":"attack","obj":{}}"#).into_action(),
            Ok(Action::Attack)
        );
        assert_eq!(packet(r#"{"type":"radar"}"#).into_action(), Ok(Action::Radar));
    }

    #[test]
    fn reports_missing_and_invalid_parameters() {
        assert_eq!(
            packet(r#"{"type":"move","obj":{}}"#).into_action(),
            Err(ActionError::Validation("'.obj.direction' missing".into()))
        );
        let err = packet(r#"{"type":"move","obj":{"direction":"up"}}"#)
            .into_action()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid packet. 'up' is not a valid value for '.obj.direction'"
        );
        assert!(packet(r#"{"type":"fly"}"#).into_action().is_err());
    }

    #[test]
    fn game_events_are_tagged_by_type() {
        let event = GameEvent::SelfSpawn {
            grid: "2".into(),
            loc: crate::game::Location::new(0, 0).to_relative(),
            viewport: vec![],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "selfspawn");
        assert_eq!(json["loc"]["isabs"], false);
        assert!(json["playermapentity"].is_array());
    }

    #[test]
    fn replies_carry_error_or_object() {
        let ok = serde_json::to_value(ServerReply::ok("radar", Some(serde_json::json!({"counter": 2})))).unwrap();
        assert_eq!(ok["error"], serde_json::Value::Null);
        assert_eq!(ok["obj"]["counter"], 2);

        let err = serde_json::to_value(ServerReply::error("defend", "Player is already defending")).unwrap();
        assert_eq!(err["obj"], serde_json::Value::Null);
        assert_eq!(err["type"], "defend");
    }
}
