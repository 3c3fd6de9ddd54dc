//! Combat pipeline integration tests.
//!
//! These tests drive single turns on a host battle and check both the
//! resulting state and the updates that went out on the wire.

use battle_sync::battle::{Battle, BattleState, SideState};
use battle_sync::catalog::{Guardian, MendingSprite, PhoenixFeather, ThornMail};
use battle_sync::combatant::Combatant;
use battle_sync::core::{
    AbsoluteSide, BattleConfig, BattleError, BattleRng, CombatantKey, HandlerError, Position, SideMap,
};
use battle_sync::net::{AttackResolved, CombatantDied, DamageRedirected, HandlerActivated, MessageLog, Payload};
use battle_sync::triggers::{
    Activation, Control, DeathPriority, EffectContext, EffectHandler, HandlerOrigin, HandlerOutcome,
    HandlerSummary, TriggerKind,
};
use tracing_subscriber::EnvFilter;

const AYLA: CombatantKey = CombatantKey::hero(AbsoluteSide::Host, Position::Left);
const CID: CombatantKey = CombatantKey::hero(AbsoluteSide::Guest, Position::Left);
const DARA: CombatantKey = CombatantKey::hero(AbsoluteSide::Guest, Position::Center);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn wounded(mut combatant: Combatant, hp: u32) -> Combatant {
    combatant.apply_hp(hp);
    combatant
}

fn roster(host: SideState, guest: SideState) -> SideMap<SideState> {
    let mut sides = SideMap::default();
    sides[AbsoluteSide::Host] = host;
    sides[AbsoluteSide::Guest] = guest;
    sides
}

fn duel(attack: u32, defender: Combatant) -> SideMap<SideState> {
    roster(
        SideState::new().with_hero(Position::Left, Combatant::new("Ayla", 100, attack)),
        SideState::new().with_hero(Position::Left, defender),
    )
}

fn host(roster: SideMap<SideState>) -> (Battle, MessageLog) {
    init_tracing();
    let log = MessageLog::new();
    let battle = Battle::host(BattleConfig::new(42), roster, Box::new(log.clone()));
    (battle, log)
}

/// Hero A (attack 50) attacks hero B (100 HP, no shield), no handlers.
#[test]
fn test_plain_attack_sends_one_attack_update() {
    let (mut battle, log) = host(duel(50, Combatant::new("Cid", 100, 10)));

    let turn = battle.resolve_actor_turn(AYLA).unwrap();

    let cid = battle.state().get(CID).unwrap();
    assert_eq!(cid.current_hp, 50);
    assert!(cid.alive);
    assert_eq!(turn.target, Some(CID));
    assert!(!turn.target_died);

    let attacks = log.of_kind(AttackResolved::KIND);
    assert_eq!(attacks.len(), 1);
    assert_eq!(attacks[0].payload["newHp"], 50);
    assert_eq!(attacks[0].payload["target"]["side"], "guest");
}

#[test]
fn test_shield_absorbs_before_hp() {
    let (mut battle, log) = host(duel(50, Combatant::new("Cid", 100, 10).with_shield(30)));
    battle.resolve_actor_turn(AYLA).unwrap();

    let update = log.of_kind(AttackResolved::KIND)[0].decode::<AttackResolved>().unwrap();
    assert_eq!(update.absorbed, 30);
    assert_eq!(update.new_shield, 0);
    assert_eq!(update.new_hp, 80);
}

#[test]
fn test_kill_sends_death_with_killer() {
    let (mut battle, log) = host(duel(50, Combatant::new("Cid", 40, 10)));
    let turn = battle.resolve_actor_turn(AYLA).unwrap();

    assert!(turn.target_died);
    let died = log.of_kind(CombatantDied::KIND)[0].decode::<CombatantDied>().unwrap();
    assert_eq!(died.key, CID);
    assert_eq!(died.killer, Some(AYLA));
    assert!(!battle.state().get(CID).unwrap().alive);
}

#[test]
fn test_guardian_takes_the_blow() {
    let guest = SideState::new()
        .with_hero(Position::Left, wounded(Combatant::new("Cid", 100, 10), 10))
        .with_hero(Position::Center, Combatant::new("Dara", 100, 10).with_ability(Guardian::CARD, 1));
    let (mut battle, log) = host(roster(
        SideState::new().with_hero(Position::Left, Combatant::new("Ayla", 100, 30)),
        guest,
    ));
    battle.register(Box::new(Guardian::new())).unwrap();

    let turn = battle.resolve_actor_turn(AYLA).unwrap();

    assert_eq!(turn.target, Some(CID));
    assert_eq!(turn.struck, Some(DARA));
    assert!(!turn.target_died);
    assert_eq!(battle.state().get(CID).unwrap().current_hp, 10);
    assert_eq!(battle.state().get(DARA).unwrap().current_hp, 70);

    let kinds: Vec<_> = log.messages().into_iter().map(|m| m.kind).collect();
    assert_eq!(
        kinds,
        vec!["turn_started", "attack_resolved", "handler_activated", "damage_redirected"]
    );
    let redirect = log.of_kind(DamageRedirected::KIND)[0].decode::<DamageRedirected>().unwrap();
    assert_eq!((redirect.from, redirect.to, redirect.from_hp), (CID, DARA, 10));
}

#[test]
fn test_rescue_runs_before_revival() {
    let guest = SideState::new()
        .with_hero(
            Position::Left,
            wounded(Combatant::new("Cid", 100, 10).with_equipment(PhoenixFeather::CARD), 10),
        )
        .with_hero(Position::Center, Combatant::new("Dara", 100, 10).with_ability(Guardian::CARD, 1));
    let (mut battle, _log) = host(roster(
        SideState::new().with_hero(Position::Left, Combatant::new("Ayla", 100, 30)),
        guest,
    ));
    // registered revival first on purpose
    battle.register(Box::new(PhoenixFeather::new())).unwrap();
    battle.register(Box::new(Guardian::new())).unwrap();

    let turn = battle.resolve_actor_turn(AYLA).unwrap();

    assert_eq!(turn.activated().collect::<Vec<_>>(), vec![Guardian::ID]);
    assert!(!battle.state().get(CID).unwrap().has_flag(PhoenixFeather::SPENT));
}

#[test]
fn test_rescuer_dies_without_second_rescue() {
    let guest = SideState::new()
        .with_hero(Position::Left, wounded(Combatant::new("Cid", 100, 10), 10))
        .with_hero(Position::Center, wounded(Combatant::new("Dara", 100, 10).with_ability(Guardian::CARD, 1), 5))
        .with_hero(Position::Right, wounded(Combatant::new("Eli", 100, 10).with_ability(Guardian::CARD, 1), 5));
    let (mut battle, log) = host(roster(
        SideState::new().with_hero(Position::Left, Combatant::new("Ayla", 100, 30)),
        guest,
    ));
    battle.register(Box::new(Guardian::new())).unwrap();

    let turn = battle.resolve_actor_turn(AYLA).unwrap();

    // whichever guardian stepped in died; the other was not consulted
    let rescuer = turn.struck.unwrap();
    assert_ne!(rescuer, CID);
    assert!(!battle.state().is_alive(rescuer));
    assert!(battle.state().is_alive(CID));
    assert_eq!(log.of_kind(HandlerActivated::KIND).len(), 1);
    assert_eq!(log.of_kind(CombatantDied::KIND).len(), 1);
}

/// Always throws Dara in front of the blow, whoever is dying.
struct Bodyguard;

impl EffectHandler for Bodyguard {
    fn id(&self) -> &str {
        "bodyguard"
    }

    fn origin(&self) -> HandlerOrigin {
        HandlerOrigin::Ability
    }

    fn triggers(&self) -> &[TriggerKind] {
        &[TriggerKind::WouldDie]
    }

    fn death_priority(&self) -> DeathPriority {
        DeathPriority::Rescue
    }

    fn evaluate(
        &self,
        _state: &BattleState,
        ctx: &EffectContext,
        _rng: &mut BattleRng,
    ) -> Result<Option<Activation>, HandlerError> {
        Ok(Some(Activation::new(Some(DARA), ctx.target)))
    }

    fn apply(&mut self, _state: &mut BattleState, activation: Activation) -> Result<HandlerSummary, HandlerError> {
        Ok(HandlerSummary::from_activation("bodyguard", &activation).with_control(Control::Redirect { to: DARA }))
    }

    fn replay(&mut self, _state: &mut BattleState, _summary: &HandlerSummary) -> Result<(), HandlerError> {
        Ok(())
    }
}

#[test]
fn test_redirected_damage_falls_through_to_revival() {
    let guest = SideState::new()
        .with_hero(Position::Left, wounded(Combatant::new("Cid", 100, 10), 10))
        .with_hero(
            Position::Center,
            wounded(Combatant::new("Dara", 100, 10).with_equipment(PhoenixFeather::CARD), 5),
        );
    let (mut battle, log) = host(roster(
        SideState::new().with_hero(Position::Left, Combatant::new("Ayla", 100, 30)),
        guest,
    ));
    battle.register(Box::new(Bodyguard)).unwrap();
    battle.register(Box::new(PhoenixFeather::new())).unwrap();

    let turn = battle.resolve_actor_turn(AYLA).unwrap();

    assert_eq!(turn.struck, Some(DARA));
    assert_eq!(turn.activated().collect::<Vec<_>>(), vec!["bodyguard", PhoenixFeather::ID]);

    let dara = battle.state().get(DARA).unwrap();
    assert!(dara.alive);
    assert!(dara.has_flag(PhoenixFeather::SPENT));
    assert_eq!(dara.current_hp, 50);
    assert_eq!(battle.state().get(CID).unwrap().current_hp, 10);

    let kinds: Vec<_> = log.messages().into_iter().map(|m| m.kind).collect();
    assert_eq!(
        kinds,
        vec![
            "turn_started",
            "attack_resolved",
            "handler_activated",
            "damage_redirected",
            "handler_activated",
        ]
    );
    assert!(log.of_kind(CombatantDied::KIND).is_empty());
}

#[test]
fn test_phoenix_feather_revives_once() {
    let (mut battle, log) = host(duel(
        50,
        wounded(Combatant::new("Cid", 100, 10).with_equipment(PhoenixFeather::CARD), 30),
    ));
    battle.register(Box::new(PhoenixFeather::new())).unwrap();

    let first = battle.resolve_actor_turn(AYLA).unwrap();
    assert!(!first.target_died);
    assert_eq!(battle.state().get(CID).unwrap().current_hp, 50);
    assert!(log.of_kind(CombatantDied::KIND).is_empty());

    let second = battle.resolve_actor_turn(AYLA).unwrap();
    assert!(second.target_died);
    assert_eq!(log.of_kind(CombatantDied::KIND).len(), 1);
}

#[test]
fn test_thorn_mail_reflects_after_the_hit() {
    let (mut battle, log) = host(duel(
        50,
        Combatant::new("Cid", 100, 10).with_equipment(ThornMail::CARD),
    ));
    battle.register(Box::new(ThornMail::new())).unwrap();

    battle.resolve_actor_turn(AYLA).unwrap();

    assert_eq!(battle.state().get(AYLA).unwrap().current_hp, 95);
    let kinds: Vec<_> = log.messages().into_iter().map(|m| m.kind).collect();
    assert_eq!(kinds, vec!["turn_started", "attack_resolved", "handler_activated"]);
}

#[test]
fn test_creature_action_replaces_attack() {
    let host_side = SideState::new()
        .with_hero(Position::Left, wounded(Combatant::new("Ayla", 100, 10), 60))
        .with_creature(Position::Left, Combatant::new(MendingSprite::CARD, 20, 15));
    let (mut battle, log) = host(roster(
        host_side,
        SideState::new().with_hero(Position::Left, Combatant::new("Cid", 100, 10)),
    ));
    battle.register(Box::new(MendingSprite::new())).unwrap();

    let turn = battle.resolve_actor_turn(AYLA.creature(0)).unwrap();

    assert!(turn.action_replaced);
    assert_eq!(battle.state().get(AYLA).unwrap().current_hp, 75);
    assert_eq!(battle.state().get(CID).unwrap().current_hp, 100);
    assert!(log.of_kind(AttackResolved::KIND).is_empty());
}

/// Mutates the attacker, then fails.
struct Saboteur {
    panic: bool,
}

impl EffectHandler for Saboteur {
    fn id(&self) -> &str {
        if self.panic {
            "panicking_saboteur"
        } else {
            "saboteur"
        }
    }

    fn origin(&self) -> HandlerOrigin {
        HandlerOrigin::Equipment
    }

    fn triggers(&self) -> &[TriggerKind] {
        &[TriggerKind::PreDamage]
    }

    fn evaluate(
        &self,
        _state: &BattleState,
        ctx: &EffectContext,
        _rng: &mut BattleRng,
    ) -> Result<Option<Activation>, HandlerError> {
        Ok(Some(Activation::new(ctx.actor, ctx.target)))
    }

    fn apply(&mut self, state: &mut BattleState, activation: Activation) -> Result<HandlerSummary, HandlerError> {
        if let Some(actor) = activation.source.and_then(|k| state.get_mut(k)) {
            actor.apply_hp(1);
        }
        if self.panic {
            panic!("saboteur exploded");
        }
        Err(HandlerError::Failed("sabotage".into()))
    }

    fn replay(&mut self, _state: &mut BattleState, _summary: &HandlerSummary) -> Result<(), HandlerError> {
        Ok(())
    }
}

#[test]
fn test_failing_handlers_are_rolled_back() {
    let (mut battle, log) = host(duel(50, Combatant::new("Cid", 100, 10)));
    battle.register(Box::new(Saboteur { panic: false })).unwrap();
    battle.register(Box::new(Saboteur { panic: true })).unwrap();

    let turn = battle.resolve_actor_turn(AYLA).unwrap();

    let faulted = turn
        .outcomes
        .iter()
        .filter(|o| matches!(o, HandlerOutcome::Faulted { .. }))
        .count();
    assert_eq!(faulted, 2);
    assert_eq!(battle.state().get(AYLA).unwrap().current_hp, 100);
    assert_eq!(battle.state().get(CID).unwrap().current_hp, 50);
    assert!(log.of_kind(HandlerActivated::KIND).is_empty());
}

#[test]
fn test_guest_cannot_resolve_turns() {
    init_tracing();
    let mut guest = Battle::guest(BattleConfig::new(1), duel(50, Combatant::new("Cid", 100, 10)));
    assert!(matches!(
        guest.resolve_actor_turn(AYLA),
        Err(BattleError::NotAuthoritative)
    ));
    assert!(matches!(guest.start(), Err(BattleError::NotAuthoritative)));
}
