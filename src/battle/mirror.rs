//! Guest-side replay.
//!
//! The guest applies host updates strictly in sequence order. It never
//! rolls: handler activations are replayed from their summaries and every
//! vital arrives as an absolute value.
//!
//! An update that cannot be applied (unknown kind, bad payload, missing
//! combatant, unknown handler) is skipped as a whole, logged, and the
//! battle is flagged checkpoint-recommended for the reconnection flow.

use tracing::{debug, warn};

use crate::combatant::Combatant;
use crate::core::{CombatantKey, DesyncError};
use crate::net::{
    AttackResolved, BattleEnded, BattleStarted, CombatantDied, DamageRedirected, HandlerActivated,
    Payload, RoundEnded, RoundStarted, StatusTicked, TurnSkipped, TurnStarted, UpdateMessage,
};
use crate::triggers::{Control, TriggerKind};

use super::observer::BattleEvent;
use super::presenter::{Presenter, VisualCue};
use super::{Battle, BattleOutcome, BattlePhase};

impl Battle {
    /// Guest only. Apply one update from the host.
    ///
    /// - duplicates (a sequence number already applied) are ignored
    /// - after a gap the message is still applied, the battle is flagged
    ///   checkpoint-recommended and `OutOfOrder` is returned
    /// - a message that cannot be applied leaves the mirror untouched
    pub fn on_update(&mut self, message: &UpdateMessage) -> Result<(), DesyncError> {
        if self.is_host() {
            return Err(DesyncError::NotMirror);
        }
        if self.is_over() {
            debug!(kind = %message.kind, "battle over, update ignored");
            return Ok(());
        }

        let expected = self.replicator.next_seq();
        if message.seq < expected {
            debug!(seq = message.seq, expected, "duplicate update ignored");
            return Ok(());
        }
        self.replicator.acknowledge(message.seq);

        if let Err(err) = self.apply_update(message) {
            warn!(kind = %message.kind, seq = message.seq, %err, "update skipped");
            self.checkpoint_recommended = true;
            return Err(err);
        }
        debug!(kind = %message.kind, seq = message.seq, "update applied");

        if message.seq > expected {
            warn!(seq = message.seq, expected, "sequence gap");
            self.checkpoint_recommended = true;
            return Err(DesyncError::OutOfOrder {
                expected,
                got: message.seq,
            });
        }
        Ok(())
    }

    /// Guest only. Apply one update, then hand its cue to `presenter` and
    /// take the speed-scaled pause.
    ///
    /// Cues are built for the guest's own role, so its troops render as
    /// `Player`. Nothing is presented for duplicates, updates after the end
    /// or updates that were skipped; a gap still presents the applied
    /// message before `OutOfOrder` is returned.
    pub fn on_update_presented(
        &mut self,
        message: &UpdateMessage,
        presenter: &mut dyn Presenter,
    ) -> Result<(), DesyncError> {
        let fresh = !self.is_host() && !self.is_over() && message.seq >= self.replicator.next_seq();
        let result = self.on_update(message);
        let applied = fresh && matches!(result, Ok(()) | Err(DesyncError::OutOfOrder { .. }));

        if applied {
            if let Some(cue) = VisualCue::from_message(message, self.role()) {
                presenter.play_effect(&cue);
                let delay = presenter.speed_scaled_delay(self.config.base_action_delay_ms);
                presenter.pause(delay);
            }
        }
        result
    }

    /// Apply every message in order, returning the ones that were skipped.
    pub fn apply_updates<'a>(
        &mut self,
        messages: impl IntoIterator<Item = &'a UpdateMessage>,
    ) -> Vec<(u64, DesyncError)> {
        messages
            .into_iter()
            .filter_map(|m| self.on_update(m).err().map(|e| (m.seq, e)))
            .collect()
    }

    /// Forget a previous checkpoint recommendation (after a restore).
    pub fn clear_checkpoint_recommendation(&mut self) {
        self.checkpoint_recommended = false;
    }

    fn apply_update(&mut self, message: &UpdateMessage) -> Result<(), DesyncError> {
        match message.kind.as_str() {
            BattleStarted::KIND => {
                message.decode::<BattleStarted>()?;
                self.phase = BattlePhase::Running;
            }
            RoundStarted::KIND => {
                let p = message.decode::<RoundStarted>()?;
                self.state.round = p.round;
                self.registry.reset_round();
            }
            TurnStarted::KIND => {
                let p = message.decode::<TurnStarted>()?;
                self.require(p.actor)?;
                self.state.round = p.round;
                self.state.current_turn = p.turn;
            }
            TurnSkipped::KIND => {
                let p = message.decode::<TurnSkipped>()?;
                self.state.round = p.round;
                self.state.current_turn = p.turn;
            }
            AttackResolved::KIND => {
                let p = message.decode::<AttackResolved>()?;
                let target = self.require_mut(p.target)?;
                target.apply_shield(p.new_shield);
                target.apply_hp(p.new_hp);
            }
            HandlerActivated::KIND => {
                let p = message.decode::<HandlerActivated>()?;
                self.registry.replay(&p.summary, &mut self.state)?;

                if p.trigger == TriggerKind::WouldDie && p.summary.control == Control::PreventDeath {
                    if let Some(key) = p.summary.target {
                        self.notify(BattleEvent::CombatantRevived {
                            key,
                            handler: p.summary.handler,
                        });
                    }
                }
            }
            DamageRedirected::KIND => {
                let p = message.decode::<DamageRedirected>()?;
                self.require(p.from)?;
                self.require(p.to)?;

                let from = self.require_mut(p.from)?;
                from.apply_shield(p.from_shield);
                from.apply_hp(p.from_hp);
                let to = self.require_mut(p.to)?;
                to.apply_shield(p.new_shield);
                to.apply_hp(p.new_hp);
            }
            CombatantDied::KIND => {
                let p = message.decode::<CombatantDied>()?;
                self.require_mut(p.key)?.finalize_death();
                self.notify(BattleEvent::CombatantDied {
                    key: p.key,
                    killer: p.killer,
                });
            }
            StatusTicked::KIND => {
                let p = message.decode::<StatusTicked>()?;
                let combatant = self.require_mut(p.key)?;
                combatant.statuses.set(p.status, p.remaining);
                combatant.apply_hp(p.new_hp);
            }
            RoundEnded::KIND => {
                let p = message.decode::<RoundEnded>()?;
                self.notify(BattleEvent::RoundEnded { round: p.round });
            }
            BattleEnded::KIND => {
                let p = message.decode::<BattleEnded>()?;
                self.state.round = p.round;
                self.conclude(BattleOutcome {
                    winner: p.winner,
                    reason: p.reason,
                    round: p.round,
                });
            }
            other => return Err(DesyncError::UnknownKind(other.to_string())),
        }
        Ok(())
    }

    fn require(&self, key: CombatantKey) -> Result<(), DesyncError> {
        self.state
            .get(key)
            .map(|_| ())
            .ok_or(DesyncError::MissingCombatant(key))
    }

    fn require_mut(&mut self, key: CombatantKey) -> Result<&mut Combatant, DesyncError> {
        self.state.get_mut(key).ok_or(DesyncError::MissingCombatant(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::SideState;
    use crate::combatant::StatusKind;
    use crate::core::{AbsoluteSide, BattleConfig, LocalSide, Position, SideMap};
    use crate::net::{MessageLog, SkipReason};
    use crate::triggers::HandlerSummary;

    fn roster() -> SideMap<SideState> {
        SideMap::new(|side| match side {
            AbsoluteSide::Host => SideState::new().with_hero(Position::Left, Combatant::new("Ayla", 100, 50)),
            AbsoluteSide::Guest => SideState::new().with_hero(Position::Left, Combatant::new("Cid", 100, 10)),
        })
    }

    const CID: CombatantKey = CombatantKey::hero(AbsoluteSide::Guest, Position::Left);

    fn attack(seq: u64, new_hp: u32, target: CombatantKey) -> UpdateMessage {
        UpdateMessage::encode(
            &AttackResolved {
                attacker: CombatantKey::hero(AbsoluteSide::Host, Position::Left),
                target,
                damage: 100 - new_hp,
                absorbed: 0,
                new_hp,
                new_shield: 0,
            },
            seq,
        )
        .unwrap()
    }

    #[test]
    fn test_host_rejects_updates() {
        let mut host = Battle::host(BattleConfig::new(1), roster(), Box::new(MessageLog::new()));
        assert_eq!(host.on_update(&attack(0, 50, CID)), Err(DesyncError::NotMirror));
    }

    #[test]
    fn test_attack_sets_absolute_hp() {
        let mut guest = Battle::guest(BattleConfig::new(1), roster());
        guest.on_update(&attack(0, 50, CID)).unwrap();
        assert_eq!(guest.state().get(CID).unwrap().current_hp, 50);

        // a replayed duplicate changes nothing
        guest.on_update(&attack(0, 50, CID)).unwrap();
        assert_eq!(guest.state().get(CID).unwrap().current_hp, 50);
        assert!(!guest.checkpoint_recommended());
    }

    #[test]
    fn test_missing_combatant_is_skipped() {
        let mut guest = Battle::guest(BattleConfig::new(1), roster());
        let ghost = CombatantKey::hero(AbsoluteSide::Guest, Position::Right);

        let err = guest.on_update(&attack(0, 50, ghost)).unwrap_err();
        assert_eq!(err, DesyncError::MissingCombatant(ghost));
        assert!(guest.checkpoint_recommended());

        // the next message still applies
        guest.on_update(&attack(1, 70, CID)).unwrap();
        assert_eq!(guest.state().get(CID).unwrap().current_hp, 70);
    }

    #[test]
    fn test_unknown_kind() {
        let mut guest = Battle::guest(BattleConfig::new(1), roster());
        let msg = UpdateMessage::new("weather_changed", serde_json::json!({}), 0);
        assert_eq!(
            guest.on_update(&msg),
            Err(DesyncError::UnknownKind("weather_changed".into()))
        );
        assert!(guest.checkpoint_recommended());
        guest.clear_checkpoint_recommendation();
        assert!(!guest.checkpoint_recommended());
    }

    #[test]
    fn test_unknown_handler() {
        let mut guest = Battle::guest(BattleConfig::new(1), roster());
        let msg = UpdateMessage::encode(
            &HandlerActivated {
                trigger: TriggerKind::OnKill,
                summary: HandlerSummary {
                    handler: "mystery".into(),
                    source: None,
                    target: None,
                    data: serde_json::Value::Null,
                    control: Control::Continue,
                },
            },
            0,
        )
        .unwrap();
        assert_eq!(
            guest.on_update(&msg),
            Err(DesyncError::UnknownHandler("mystery".into()))
        );
    }

    #[test]
    fn test_gap_applies_and_flags() {
        let mut guest = Battle::guest(BattleConfig::new(1), roster());
        let err = guest.on_update(&attack(3, 20, CID)).unwrap_err();

        assert_eq!(err, DesyncError::OutOfOrder { expected: 0, got: 3 });
        assert_eq!(guest.state().get(CID).unwrap().current_hp, 20);
        assert!(guest.checkpoint_recommended());
    }

    #[test]
    fn test_redirect_checks_both_sides_first() {
        let mut guest = Battle::guest(BattleConfig::new(1), roster());
        let ghost = CombatantKey::hero(AbsoluteSide::Guest, Position::Right);
        let msg = UpdateMessage::encode(
            &DamageRedirected {
                from: CID,
                to: ghost,
                damage: 30,
                from_hp: 1,
                from_shield: 0,
                new_hp: 0,
                new_shield: 0,
            },
            0,
        )
        .unwrap();

        assert!(guest.on_update(&msg).is_err());
        assert_eq!(guest.state().get(CID).unwrap().current_hp, 100);
    }

    #[test]
    fn test_status_and_death() {
        let mut guest = Battle::guest(BattleConfig::new(1), roster());
        guest.state.get_mut(CID).unwrap().statuses.add(StatusKind::Freeze, 2);

        let tick = UpdateMessage::encode(
            &StatusTicked {
                key: CID,
                status: StatusKind::Freeze,
                damage: 0,
                remaining: 1,
                new_hp: 100,
            },
            0,
        )
        .unwrap();
        let skipped = UpdateMessage::encode(
            &TurnSkipped {
                round: 2,
                turn: 7,
                actor: CID,
                reason: SkipReason::Disabled,
            },
            1,
        )
        .unwrap();
        let died = UpdateMessage::encode(&CombatantDied { key: CID, killer: None }, 2).unwrap();

        let skipped_updates = guest.apply_updates([&tick, &skipped, &died]);
        assert!(skipped_updates.is_empty());

        let cid = guest.state().get(CID).unwrap();
        assert!(!cid.alive);
        assert_eq!(cid.statuses.stacks(StatusKind::Freeze), 0);
        assert_eq!(guest.state().current_turn, 7);
    }

    #[derive(Default)]
    struct Recorder {
        cues: Vec<VisualCue>,
        pauses: usize,
    }

    impl Presenter for Recorder {
        fn play_effect(&mut self, cue: &VisualCue) {
            self.cues.push(cue.clone());
        }

        fn pause(&mut self, _delay: std::time::Duration) {
            self.pauses += 1;
        }
    }

    #[test]
    fn test_presented_updates_use_guest_perspective() {
        let mut guest = Battle::guest(BattleConfig::new(1), roster());
        let mut recorder = Recorder::default();

        guest.on_update_presented(&attack(0, 50, CID), &mut recorder).unwrap();
        // duplicate: applied once, presented once
        guest.on_update_presented(&attack(0, 50, CID), &mut recorder).unwrap();

        assert_eq!(recorder.cues.len(), 1);
        assert_eq!(recorder.pauses, 1);
        let cue = &recorder.cues[0];
        assert_eq!(cue.target, Some(CID));
        assert_eq!(cue.target_side, Some(LocalSide::Player));
        assert_eq!(cue.source_side, Some(LocalSide::Opponent));
    }

    #[test]
    fn test_skipped_update_is_not_presented() {
        let mut guest = Battle::guest(BattleConfig::new(1), roster());
        let mut recorder = Recorder::default();
        let ghost = CombatantKey::hero(AbsoluteSide::Guest, Position::Right);

        assert!(guest.on_update_presented(&attack(0, 50, ghost), &mut recorder).is_err());
        assert!(recorder.cues.is_empty());

        // a gap still presents what was applied
        let err = guest.on_update_presented(&attack(3, 60, CID), &mut recorder).unwrap_err();
        assert!(matches!(err, DesyncError::OutOfOrder { expected: 1, got: 3 }));
        assert_eq!(recorder.cues.len(), 1);
    }
}
