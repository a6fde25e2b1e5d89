use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use grid_battle_server::game::{
    ActionError, ActionOutcome, Angle, AttackOutcome, Battle, CharacterKind, Direction, GameMap,
    Location, UserId,
};

fn battle_with(players: &[(UserId, Location)]) -> Battle {
    let battle = Battle::new(GameMap::new(11, 11, 7));
    for &(id, loc) in players {
        battle
            .spawn_player_at(id, CharacterKind::Thug, loc)
            .unwrap();
    }
    battle
}

fn location_of(battle: &Battle, user_id: UserId) -> Location {
    battle.map().lock().state(user_id).unwrap().location
}

#[test]
fn concurrent_moves_keep_one_player_per_cell() {
    let battle = Arc::new(Battle::new(GameMap::new(11, 11, 3)));
    for id in 1..=12 {
        battle.spawn_player(id, CharacterKind::Ninja).unwrap();
    }

    let workers: Vec<_> = (1..=12u32)
        .map(|id| {
            let battle = Arc::clone(&battle);
            thread::spawn(move || {
                let player = battle.player(id).unwrap();
                let mut rng = ChaCha8Rng::seed_from_u64(id as u64);
                for _ in 0..500 {
                    let dir = Direction::ALL[rng.gen_range(0..4)];
                    let _ = battle.move_to(&player, dir);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert!(battle.is_consistent());
    let cells: HashSet<Location> = (1..=12).map(|id| location_of(&battle, id)).collect();
    assert_eq!(cells.len(), 12);
}

#[test]
fn move_into_a_neighbour_never_changes_locations() {
    let center = Location::new(5, 5);
    let battle = battle_with(&[
        (1, center),
        (2, center.step(Direction::North)),
        (3, center.step(Direction::East)),
        (4, center.step(Direction::South)),
        (5, center.step(Direction::West)),
    ]);
    let me = battle.player(1).unwrap();

    for dir in Direction::ALL {
        assert_eq!(battle.move_to(&me, dir), Err(ActionError::AlreadyOccupied));
    }
    assert_eq!(location_of(&battle, 1), center);
    assert_eq!(location_of(&battle, 2), Location::new(5, 4));
    assert!(battle.is_consistent());
}

#[test]
fn ten_hits_kill_and_respawn_the_target() {
    let battle = battle_with(&[(1, Location::new(5, 5)), (2, Location::new(5, 4))]);
    let actor = battle.player(1).unwrap();
    let death_cell = Location::new(5, 4);

    for expected in (10..=90).rev().step_by(10) {
        let report = battle.attack(&actor).unwrap();
        assert_eq!(report.health, expected);
        assert!(!report.is_lethal());
        assert!(matches!(report.outcomes[..], [AttackOutcome::Hit { .. }]));
    }

    let report = battle.attack(&actor).unwrap();
    assert_eq!(report.health, 0);
    match &report.outcomes[..] {
        [AttackOutcome::Hit { .. }, AttackOutcome::Death { target: 2, .. }, AttackOutcome::Respawn { target: 2, .. }] => {}
        other => panic!("unexpected outcomes {:?}", other),
    }

    let respawned = location_of(&battle, 2);
    assert_ne!(respawned, death_cell);
    assert_ne!(respawned, Location::new(5, 5));
    assert_eq!(battle.map().lock().occupant(death_cell), None);
    assert_eq!(battle.player(2).unwrap().health().snapshot(), 100);
    assert!(battle.is_consistent());
}

#[test]
fn reported_health_never_rises_nor_goes_negative() {
    let battle = battle_with(&[(1, Location::new(3, 3)), (2, Location::new(3, 2))]);
    let actor = battle.player(1).unwrap();
    battle
        .player(2)
        .unwrap()
        .health()
        .lock()
        .take_damage(95, false);

    let mut last = i32::MAX;
    let mut hits = 0;
    while let Ok(report) = battle.attack(&actor) {
        assert!(report.health >= 0);
        assert!(report.health <= last);
        last = report.health;
        hits += 1;
        if report.is_lethal() {
            break;
        }
    }
    assert_eq!(hits, 1);
    assert_eq!(last, 0);
}

#[test]
fn observers_see_each_other_at_negated_offsets() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);

    for _ in 0..50 {
        let a = Location::new(rng.gen_range(0..11), rng.gen_range(0..11));
        let b = Location::new(rng.gen_range(0..11), rng.gen_range(0..11));
        if a == b || (a.x - b.x).abs() > 5 || (a.y - b.y).abs() > 5 {
            continue;
        }
        let battle = battle_with(&[(1, a), (2, b)]);

        let seen_by = |mover: UserId, observer: UserId| {
            let player = battle.player(mover).unwrap();
            let ActionOutcome::Rotated { observers, .. } =
                battle.rotate(&player, Angle::Left).unwrap()
            else {
                panic!("expected rotation");
            };
            observers.get(observer).unwrap().relative.location()
        };

        let b_sees_a = seen_by(1, 2);
        let a_sees_b = seen_by(2, 1);
        assert_eq!(a_sees_b, Location::new(-b_sees_a.x, -b_sees_a.y));
    }
}

#[test]
fn second_defend_leaves_state_untouched() {
    let battle = battle_with(&[(1, Location::new(5, 5))]);
    let me = battle.player(1).unwrap();

    battle.defend(&me).unwrap();
    let before = battle.map().lock().state(1).cloned();
    assert_eq!(battle.defend(&me), Err(ActionError::AlreadyDefending));
    assert_eq!(battle.map().lock().state(1).cloned(), before);
}

#[test]
fn scout_counts_only_players_within_distance() {
    let battle = battle_with(&[
        (1, Location::new(2, 5)),
        (2, Location::new(3, 5)),
        (3, Location::new(7, 5)),
    ]);
    let me = battle.player(1).unwrap();
    battle.rotate(&me, Angle::Right).unwrap();

    let ActionOutcome::Scout { count, distance, .. } = battle.scout(&me, 3).unwrap() else {
        panic!("expected scout");
    };
    assert_eq!(count, 1);
    assert_eq!(distance, 3);
}

#[test]
fn spawning_a_placed_user_twice_keeps_the_map_consistent() {
    let battle = battle_with(&[(1, Location::new(4, 4))]);

    let again = battle.spawn_player_at(1, CharacterKind::Knight, Location::new(8, 8));
    assert_eq!(again.err(), Some(ActionError::AlreadyOccupied));
    assert_eq!(location_of(&battle, 1), Location::new(4, 4));
    assert_eq!(battle.map().lock().occupant(Location::new(8, 8)), None);
    assert_eq!(battle.player(1).unwrap().character(), CharacterKind::Thug);
    assert!(battle.is_consistent());
}
