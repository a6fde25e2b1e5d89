//! Turns resolved actions into client replies and observer notifications

use std::sync::Arc;

use tracing::debug;

use crate::game::{
    ActionOutcome, AttackOutcome, AttackReport, LocatedGroup, Player, PlayerView, UserId, ViewCell,
};
use crate::notify::{kind, Distributor};

use super::protocol::{
    AttackResponse, CounterResponse, EnvironmentResponse, GameEvent, HealthResponse,
    WatchResponse,
};

/// Push the notifications of `outcome` and build the reply object for the
/// acting client
pub fn dispatch(
    distributor: &Arc<Distributor>,
    player: &Player,
    outcome: ActionOutcome,
) -> Result<Option<serde_json::Value>, serde_json::Error> {
    let grid = player.render_id().to_string();

    let reply = match outcome {
        ActionOutcome::Rotated {
            angle, observers, ..
        } => {
            for obs in &observers {
                distributor.push(
                    obs.user_id,
                    kind::GAME,
                    &GameEvent::Rotate {
                        grid: grid.clone(),
                        angle,
                        loc: obs.relative,
                    },
                );
            }
            None
        }
        ActionOutcome::Moved {
            direction,
            view,
            new_line,
            observers,
        } => {
            for obs in &observers {
                distributor.push(
                    obs.user_id,
                    kind::GAME,
                    &GameEvent::Move {
                        grid: grid.clone(),
                        direction,
                        player_info: PlayerView {
                            location: obs.relative.location(),
                            ..view.clone()
                        },
                        loc: obs.relative,
                        new_line: new_line.clone(),
                    },
                );
            }
            None
        }
        ActionOutcome::Radar { count, observers } => {
            distributor.push_group(observers.iter(), kind::GAME, &GameEvent::Radar { grid });
            Some(serde_json::to_value(CounterResponse { counter: count })?)
        }
        ActionOutcome::Scout {
            count,
            distance,
            observers,
        } => {
            distributor.push_group(
                observers.iter(),
                kind::GAME,
                &GameEvent::Scout { grid, distance },
            );
            Some(serde_json::to_value(CounterResponse { counter: count })?)
        }
        ActionOutcome::Environment { terrain, observers } => {
            distributor.push_group(
                observers.iter(),
                kind::GAME,
                &GameEvent::Environment { grid },
            );
            Some(serde_json::to_value(EnvironmentResponse {
                environment_matrix: terrain,
            })?)
        }
        ActionOutcome::Watch { health, observers } => {
            distributor.push_group(observers.iter(), kind::GAME, &GameEvent::Watch { grid });
            Some(serde_json::to_value(WatchResponse {
                health_matrix: health,
            })?)
        }
        ActionOutcome::Attack(report) => {
            let health = report.health;
            dispatch_attack(distributor, &grid, report);
            Some(serde_json::to_value(AttackResponse { health })?)
        }
        ActionOutcome::Defended { observers } => {
            distributor.push_group(observers.iter(), kind::GAME, &GameEvent::Defend { grid });
            None
        }
        ActionOutcome::Undefended { observers } => {
            distributor.push_group(observers.iter(), kind::GAME, &GameEvent::Undefend { grid });
            None
        }
        ActionOutcome::Health { value, observers } => {
            distributor.push_group(
                observers.iter(),
                kind::GAME,
                &GameEvent::Health {
                    grid,
                    value,
                },
            );
            Some(serde_json::to_value(HealthResponse { value })?)
        }
    };

    Ok(reply)
}

/// Hit, death and spawn go out in the order they happened; the attack
/// animation follows. The scoreboard broadcast runs on its own task.
fn dispatch_attack(distributor: &Arc<Distributor>, attacker: &str, report: AttackReport) {
    for outcome in report.outcomes {
        match outcome {
            AttackOutcome::Hit {
                render_id,
                health,
                observers,
                ..
            } => distributor.push_group(
                observers.iter(),
                kind::GAME,
                &GameEvent::Health {
                    grid: render_id,
                    value: health,
                },
            ),
            AttackOutcome::Death {
                render_id,
                observers,
                ..
            } => distributor.push_group(
                observers.iter(),
                kind::GAME,
                &GameEvent::Death { grid: render_id },
            ),
            AttackOutcome::Respawn {
                target,
                view,
                viewport,
                observers,
            } => dispatch_respawn(distributor, target, view, viewport, &observers),
        }
    }

    for obs in &report.observers {
        distributor.push(
            obs.user_id,
            kind::GAME,
            &GameEvent::Attack {
                grid: attacker.to_string(),
                loc: obs.relative,
            },
        );
    }

    if let Some(stats) = report.stats_changed {
        let distributor = Arc::clone(distributor);
        tokio::spawn(async move {
            debug!(players = stats.len(), "Broadcasting changed stats");
            distributor.push_broadcast(kind::STATS, &stats);
        });
    }
}

fn dispatch_respawn(
    distributor: &Distributor,
    target: UserId,
    view: PlayerView,
    viewport: Vec<Vec<ViewCell>>,
    observers: &LocatedGroup,
) {
    for obs in observers {
        let event = if obs.user_id == target {
            GameEvent::SelfSpawn {
                grid: view.grid.clone(),
                loc: obs.relative,
                viewport: viewport.clone(),
            }
        } else {
            GameEvent::Spawn {
                grid: view.grid.clone(),
                player_info: PlayerView {
                    location: obs.relative.location(),
                    ..view.clone()
                },
            }
        };
        distributor.push(obs.user_id, kind::GAME, &event);
    }
}
