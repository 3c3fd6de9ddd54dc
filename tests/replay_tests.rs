//! Host/guest replay determinism tests.
//!
//! A host battle runs to completion with the full reference catalog; a
//! guest built from the same roster and handlers replays the wire log and
//! must end in exactly the same state, without ever rolling.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use battle_sync::battle::{Battle, BattleEvent, NullPresenter, Presenter, SideState, VisualCue};
use battle_sync::catalog::{
    standard_handlers, BountyCharm, CriticalStrike, FrostBolt, Guardian, IronSkin, MendingSprite,
    PhoenixFeather, SupplyChain, ThornMail, VenomFang, WarDrum,
};
use battle_sync::combatant::Combatant;
use battle_sync::core::{AbsoluteSide, BattleConfig, CombatantKey, DesyncError, LocalSide, Position, SideMap};
use battle_sync::net::{HandlerActivated, MessageLog, Payload, UpdateMessage};
use battle_sync::triggers::HandlerOutcome;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Both sides carry every catalog card somewhere.
fn roster() -> SideMap<SideState> {
    let host = SideState::new()
        .with_hero(
            Position::Left,
            Combatant::new("Ayla", 120, 18)
                .with_ability(CriticalStrike::CARD, 2)
                .with_equipment(VenomFang::CARD)
                .with_equipment(VenomFang::CARD)
                .with_equipment(BountyCharm::CARD),
        )
        .with_creature(Position::Left, Combatant::new(MendingSprite::CARD, 25, 8))
        .with_hero(
            Position::Center,
            Combatant::new("Bram", 140, 12)
                .with_ability(Guardian::CARD, 1)
                .with_ability(IronSkin::CARD, 1)
                .with_equipment(WarDrum::CARD),
        )
        .with_hero(
            Position::Right,
            Combatant::new("Cora", 90, 16)
                .with_spell(FrostBolt::CARD)
                .with_equipment(SupplyChain::CARD),
        );
    let guest = SideState::new()
        .with_hero(
            Position::Left,
            Combatant::new("Cid", 130, 15)
                .with_equipment(ThornMail::CARD)
                .with_equipment(PhoenixFeather::CARD),
        )
        .with_creature(Position::Left, Combatant::new("Wolf", 40, 10))
        .with_creature(Position::Left, Combatant::new("Imp", 20, 6))
        .with_hero(
            Position::Center,
            Combatant::new("Dara", 110, 17)
                .with_ability(Guardian::CARD, 1)
                .with_ability(CriticalStrike::CARD, 1)
                .with_equipment(BountyCharm::CARD)
                .with_equipment(BountyCharm::CARD),
        )
        .with_hero(
            Position::Right,
            Combatant::new("Eli", 100, 14)
                .with_spell(FrostBolt::CARD)
                .with_equipment(WarDrum::CARD)
                .with_equipment(PhoenixFeather::CARD),
        );

    let mut sides = SideMap::default();
    sides[AbsoluteSide::Host] = host;
    sides[AbsoluteSide::Guest] = guest;
    sides
}

fn recorder(battle: &mut Battle) -> Arc<Mutex<Vec<BattleEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    battle.subscribe(Box::new(move |event: &BattleEvent| {
        sink.lock().unwrap().push(event.clone());
    }));
    events
}

fn play(seed: u64) -> (Battle, MessageLog) {
    init_tracing();
    let log = MessageLog::new();
    let mut host = Battle::host(BattleConfig::new(seed), roster(), Box::new(log.clone()));
    host.register_all(standard_handlers()).unwrap();
    host.run(&mut NullPresenter).unwrap();
    (host, log)
}

fn mirror(seed: u64) -> Battle {
    let mut guest = Battle::guest(BattleConfig::new(seed), roster());
    guest.register_all(standard_handlers()).unwrap();
    guest
}

#[test]
fn test_guest_replays_host_exactly() {
    for seed in [1, 7, 42, 1337, 9001] {
        let log = MessageLog::new();
        let mut host = Battle::host(BattleConfig::new(seed), roster(), Box::new(log.clone()));
        host.register_all(standard_handlers()).unwrap();
        let host_events = recorder(&mut host);
        let outcome = host.run(&mut NullPresenter).unwrap();

        let mut guest = mirror(seed);
        let guest_events = recorder(&mut guest);
        let skipped = guest.apply_updates(&log.messages());

        assert!(skipped.is_empty(), "seed {seed}: {skipped:?}");
        assert_eq!(guest.state(), host.state(), "seed {seed}");
        assert_eq!(guest.outcome(), Some(outcome), "seed {seed}");
        assert_eq!(guest.rewards(AbsoluteSide::Host), host.rewards(AbsoluteSide::Host));
        assert_eq!(*guest_events.lock().unwrap(), *host_events.lock().unwrap());
        assert!(!guest.checkpoint_recommended());
        assert!(guest.rng_state().is_none());
    }
}

fn bounty_duel() -> SideMap<SideState> {
    let mut sides = SideMap::default();
    sides[AbsoluteSide::Host] = SideState::new().with_hero(
        Position::Left,
        Combatant::new("Ayla", 100, 50).with_equipment(BountyCharm::CARD),
    );
    sides[AbsoluteSide::Guest] = SideState::new().with_hero(Position::Left, Combatant::new("Cid", 40, 10));
    sides
}

#[test]
fn test_declined_roll_never_reaches_the_wire() {
    init_tracing();
    let ayla = CombatantKey::hero(AbsoluteSide::Host, Position::Left);

    // one copy activates 20% of the time, so some early seed declines
    for seed in 0..64 {
        let log = MessageLog::new();
        let mut host = Battle::host(BattleConfig::new(seed), bounty_duel(), Box::new(log.clone()));
        host.register(Box::new(BountyCharm::new())).unwrap();

        let turn = host.resolve_actor_turn(ayla).unwrap();
        assert!(turn.target_died);
        let declined = turn
            .outcomes
            .iter()
            .any(|o| matches!(o, HandlerOutcome::Declined { handler } if handler == BountyCharm::ID));
        if !declined {
            continue;
        }

        assert!(log.of_kind(HandlerActivated::KIND).is_empty());
        assert!(turn.messages.iter().all(|m| m.kind != HandlerActivated::KIND));
        assert!(host.rewards(AbsoluteSide::Host).is_empty());

        let mut guest = Battle::guest(BattleConfig::new(seed), bounty_duel());
        guest.register(Box::new(BountyCharm::new())).unwrap();
        assert!(guest.apply_updates(&log.messages()).is_empty());
        assert_eq!(guest.state(), host.state());
        assert!(guest.rewards(AbsoluteSide::Host).is_empty());
        return;
    }
    panic!("no seed in 0..64 declined the bounty roll");
}

#[test]
fn test_same_seed_same_wire() {
    let (_, first) = play(99);
    let (_, second) = play(99);

    let strip = |log: &MessageLog| {
        log.messages()
            .into_iter()
            .map(|m| (m.kind, m.payload, m.seq))
            .collect::<Vec<_>>()
    };
    assert_eq!(strip(&first), strip(&second));
}

#[test]
fn test_sequence_numbers_are_contiguous() {
    let (_, log) = play(5);
    let seqs: Vec<u64> = log.messages().iter().map(|m| m.seq).collect();
    let expected: Vec<u64> = (0..seqs.len() as u64).collect();
    assert_eq!(seqs, expected);
    assert_eq!(log.of_kind("battle_ended").len(), 1);
    assert_eq!(log.messages().last().unwrap().kind, "battle_ended");
}

#[test]
fn test_duplicates_are_ignored() {
    let (host, log) = play(3);
    let mut guest = mirror(3);

    for message in log.messages() {
        guest.on_update(&message).unwrap();
        guest.on_update(&message).unwrap();
    }
    assert_eq!(guest.state(), host.state());
    assert!(!guest.checkpoint_recommended());
}

#[test]
fn test_json_wire_round_trip() {
    let (host, log) = play(11);
    let mut guest = mirror(11);

    for message in log.messages() {
        let json = message.to_json().unwrap();
        guest.on_update(&UpdateMessage::from_json(&json).unwrap()).unwrap();
    }
    assert_eq!(guest.state(), host.state());
}

#[test]
fn test_lost_update_recovers_through_checkpoint() {
    let (host, log) = play(21);
    let messages = log.messages();
    let mut guest = mirror(21);

    let dropped = messages.len() / 2;
    let faults: Vec<_> = messages
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != dropped)
        .filter_map(|(_, m)| guest.on_update(m).err())
        .collect();

    assert!(faults.iter().any(|f| matches!(f, DesyncError::OutOfOrder { .. })));
    assert!(guest.checkpoint_recommended());

    // reconnection flow: the host's snapshot replaces the mirror
    let json = host.export_battle_state().unwrap();
    let mut restored = mirror(21);
    restored.import_battle_state(&json).unwrap();
    assert_eq!(restored.state(), host.state());
    assert!(restored.is_over());
}

#[test]
fn test_mpsc_transport() {
    init_tracing();
    let (tx, rx) = mpsc::channel::<UpdateMessage>();
    let mut host = Battle::host(BattleConfig::new(8), roster(), Box::new(tx));
    host.register_all(standard_handlers()).unwrap();
    host.run(&mut NullPresenter).unwrap();

    let mut guest = mirror(8);
    for message in rx.try_iter() {
        guest.on_update(&message).unwrap();
    }
    assert_eq!(guest.state(), host.state());
}

#[derive(Default)]
struct Screen {
    cues: Vec<VisualCue>,
}

impl Presenter for Screen {
    fn play_effect(&mut self, cue: &VisualCue) {
        self.cues.push(cue.clone());
    }
}

#[test]
fn test_both_screens_show_own_troops_as_player() {
    init_tracing();
    let log = MessageLog::new();
    let mut host = Battle::host(BattleConfig::new(17), roster(), Box::new(log.clone()));
    host.register_all(standard_handlers()).unwrap();
    let mut host_screen = Screen::default();
    host.run(&mut host_screen).unwrap();

    let mut guest = mirror(17);
    let mut guest_screen = Screen::default();
    for message in log.messages() {
        guest.on_update_presented(&message, &mut guest_screen).unwrap();
    }

    assert!(!host_screen.cues.is_empty());
    assert_eq!(host_screen.cues.len(), guest_screen.cues.len());
    for (mine, theirs) in host_screen.cues.iter().zip(&guest_screen.cues) {
        assert_eq!(mine.effect, theirs.effect);
        assert_eq!(mine.target, theirs.target);
        assert_eq!(mine.amount, theirs.amount);
        if let Some(target) = mine.target {
            assert_eq!(mine.target_side, Some(target.side.to_local(AbsoluteSide::Host)));
            assert_eq!(theirs.target_side, Some(target.side.to_local(AbsoluteSide::Guest)));
            assert_ne!(mine.target_side, theirs.target_side);
        }
    }
}

#[test]
fn test_each_client_sees_itself_as_player() {
    let winner = AbsoluteSide::Host;
    assert_eq!(winner.to_local(AbsoluteSide::Host), LocalSide::Player);
    assert_eq!(winner.to_local(AbsoluteSide::Guest), LocalSide::Opponent);
    assert_eq!(LocalSide::Opponent.to_absolute(AbsoluteSide::Guest), winner);
}

#[test]
fn test_end_is_idempotent() {
    let (mut host, log) = play(4);
    let before = log.len();

    assert!(host.end().is_empty());
    assert!(host.end().is_empty());
    assert_eq!(log.len(), before);
}
