//! Turn/round scheduler.
//!
//! Each round:
//!
//! 1. increment the round, send `round_started`, reset per-round handler
//!    trackers, run round-start handlers
//! 2. fix the actor order: for each position left to right, host then
//!    guest, each hero followed by its creatures
//! 3. one turn per living actor, in that order (actors that died earlier in
//!    the round are passed over)
//! 4. end-of-round status tick, then defeat and round-cap checks
//!
//! [`Battle::step`] advances exactly one of these units so the caller can
//! interleave presentation; [`Battle::run`] loops to the end.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::{BattleError, CombatantKey};
use crate::net::{EndReason, RoundEnded, RoundStarted, UpdateMessage};
use crate::triggers::{EffectContext, TriggerKind};

use super::observer::BattleEvent;
use super::pipeline::TurnResult;
use super::presenter::{Presenter, VisualCue};
use super::state::BattleState;
use super::{Battle, BattleOutcome, BattlePhase};

/// Actor order and position within the current round.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Scheduler {
    order: Vec<CombatantKey>,
    cursor: usize,
    in_round: bool,
}

impl Scheduler {
    /// Fix the actor order for a new round.
    pub fn begin_round(&mut self, state: &BattleState) {
        self.order = state.turn_order();
        self.cursor = 0;
        self.in_round = true;
    }

    /// Next living actor this round, or `None` when the round is done.
    pub fn next_actor(&mut self, state: &BattleState) -> Option<CombatantKey> {
        while let Some(&key) = self.order.get(self.cursor) {
            self.cursor += 1;
            if state.is_alive(key) {
                return Some(key);
            }
            debug!(%key, "dead actor passed over");
        }
        None
    }

    /// Close the current round.
    pub fn finish_round(&mut self) {
        self.order.clear();
        self.cursor = 0;
        self.in_round = false;
    }

    /// Is a round in progress?
    #[must_use]
    pub fn in_round(&self) -> bool {
        self.in_round
    }

    /// Actors that have not yet been reached this round.
    #[must_use]
    pub fn remaining(&self) -> &[CombatantKey] {
        self.order.get(self.cursor..).unwrap_or(&[])
    }
}

/// What one call to [`Battle::step`] did.
#[derive(Clone, Debug, PartialEq)]
pub enum StepKind {
    /// The battle started.
    Started,
    /// A round began.
    RoundStarted(u32),
    /// One actor took (or skipped) its turn.
    Turn(Box<TurnResult>),
    /// The round's end-of-round tick ran.
    RoundEnded(u32),
}

/// One scheduler step and every update it sent.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub kind: StepKind,
    pub messages: Vec<UpdateMessage>,
}

impl Battle {
    /// Host only. Advance by one unit: start, round start, one turn, or
    /// round end. Starts the battle if needed.
    pub fn step(&mut self) -> Result<Step, BattleError> {
        self.ensure_host()?;
        match self.phase {
            BattlePhase::Ended => return Err(BattleError::BattleOver),
            BattlePhase::Setup => {
                let messages = self.start()?;
                return Ok(Step {
                    kind: StepKind::Started,
                    messages,
                });
            }
            BattlePhase::Running => {}
        }

        let kind = if !self.scheduler.in_round() {
            self.begin_round()?;
            StepKind::RoundStarted(self.state.round)
        } else if let Some(actor) = self.scheduler.next_actor(&self.state) {
            let turn = self.resolve_actor_turn(actor)?;
            self.check_defeat();
            StepKind::Turn(Box::new(turn))
        } else {
            self.end_round()?;
            StepKind::RoundEnded(self.state.round)
        };

        let mut messages = match &kind {
            StepKind::Turn(turn) => turn.messages.clone(),
            _ => Vec::new(),
        };
        messages.extend(self.replicator.take_sent());

        Ok(Step { kind, messages })
    }

    /// Host only. Run to the end, handing cues and pauses to `presenter`
    /// after each step.
    ///
    /// With `max_rounds == 0` a battle in which nobody can deal damage never
    /// ends; callers wanting a guarantee should keep a round cap.
    pub fn run(&mut self, presenter: &mut dyn Presenter) -> Result<BattleOutcome, BattleError> {
        loop {
            let step = self.step()?;
            for message in &step.messages {
                if let Some(cue) = VisualCue::from_message(message, self.role()) {
                    presenter.play_effect(&cue);
                }
            }
            let delay = presenter.speed_scaled_delay(self.config.base_action_delay_ms);
            presenter.pause(delay);

            if let Some(outcome) = self.outcome {
                return Ok(outcome);
            }
        }
    }

    fn begin_round(&mut self) -> Result<(), BattleError> {
        self.state.round += 1;
        let round = self.state.round;
        info!(round, "round started");

        self.replicator.send(&RoundStarted { round });
        self.registry.reset_round();

        let mut ctx = EffectContext::new(TriggerKind::OnRoundStart, round);
        self.fire(&mut ctx)?;

        self.scheduler.begin_round(&self.state);
        Ok(())
    }

    fn end_round(&mut self) -> Result<(), BattleError> {
        let round = self.state.round;
        self.tick_statuses()?;
        self.scheduler.finish_round();
        self.replicator.send(&RoundEnded { round });
        self.notify(BattleEvent::RoundEnded { round });

        if !self.check_defeat() && self.config.round_cap_reached(round) {
            info!(round, "round cap reached");
            self.finish(None, EndReason::RoundCap);
        }
        Ok(())
    }
}
