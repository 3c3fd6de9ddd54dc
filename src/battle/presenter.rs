//! Presentation contract.
//!
//! The core never waits on animations. After each step it hands the
//! rendering collaborator one [`VisualCue`] per message (fire and forget)
//! and then awaits a speed-scaled pause. The pause is cosmetic: state has
//! already changed and its length never feeds back into game logic.
//!
//! Cues are built for one client: every combatant they name also carries
//! its [`LocalSide`] as seen by that client's role, so "your troops" are
//! always the `Player` side on screen.

use std::time::Duration;

use crate::core::{AbsoluteSide, BattleConfig, CombatantKey, LocalSide};
use crate::net::{
    AttackResolved, CombatantDied, DamageRedirected, HandlerActivated, StatusTicked, UpdateMessage,
};

/// A visual effect to play.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisualCue {
    /// Message kind, or the handler id for handler activations.
    pub effect: String,
    pub source: Option<CombatantKey>,
    pub target: Option<CombatantKey>,
    /// `source.side` as seen by the rendering client.
    pub source_side: Option<LocalSide>,
    /// `target.side` as seen by the rendering client.
    pub target_side: Option<LocalSide>,
    pub amount: Option<u32>,
}

impl VisualCue {
    /// Derive the cue a client playing `role` renders for a message.
    /// Bookkeeping messages have none.
    #[must_use]
    pub fn from_message(message: &UpdateMessage, role: AbsoluteSide) -> Option<Self> {
        let local = |key: Option<CombatantKey>| key.map(|k| k.side.to_local(role));
        let cue = |effect: &str, source: Option<CombatantKey>, target: Option<CombatantKey>, amount| VisualCue {
            effect: effect.to_string(),
            source,
            target,
            source_side: local(source),
            target_side: local(target),
            amount,
        };

        if let Ok(p) = message.decode::<AttackResolved>() {
            return Some(cue("attack", Some(p.attacker), Some(p.target), Some(p.damage)));
        }
        if let Ok(p) = message.decode::<HandlerActivated>() {
            return Some(cue(&p.summary.handler, p.summary.source, p.summary.target, None));
        }
        if let Ok(p) = message.decode::<DamageRedirected>() {
            return Some(cue("redirect", Some(p.from), Some(p.to), Some(p.damage)));
        }
        if let Ok(p) = message.decode::<CombatantDied>() {
            return Some(cue("death", p.killer, Some(p.key), None));
        }
        if let Ok(p) = message.decode::<StatusTicked>() {
            return Some(cue(&p.status.to_string(), None, Some(p.key), Some(p.damage)));
        }
        None
    }
}

/// The rendering collaborator.
pub trait Presenter {
    /// Start playing a cue. Must not block.
    fn play_effect(&mut self, cue: &VisualCue);

    /// The pause to take after a step whose nominal length is `base_ms`.
    fn speed_scaled_delay(&self, base_ms: u64) -> Duration {
        Duration::from_millis(base_ms)
    }

    /// Wait out a pause.
    fn pause(&mut self, delay: Duration) {
        let _ = delay;
    }
}

/// Renders nothing and never waits. Used by headless hosts and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn play_effect(&mut self, _cue: &VisualCue) {}

    fn speed_scaled_delay(&self, _base_ms: u64) -> Duration {
        Duration::ZERO
    }
}

/// Sleeps the calling thread for each pause, scaled by playback speed.
#[derive(Clone, Copy, Debug)]
pub struct PacedPresenter {
    speed: f64,
}

impl PacedPresenter {
    /// Create with an explicit speed multiplier.
    #[must_use]
    pub fn new(speed: f64) -> Self {
        Self { speed }
    }

    /// Use the configured playback speed.
    #[must_use]
    pub fn from_config(config: &BattleConfig) -> Self {
        Self::new(config.speed)
    }
}

impl Presenter for PacedPresenter {
    fn play_effect(&mut self, _cue: &VisualCue) {}

    fn speed_scaled_delay(&self, base_ms: u64) -> Duration {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(base_ms as f64 / 1000.0 / self.speed)
    }

    fn pause(&mut self, delay: Duration) {
        std::thread::sleep(delay);
    }
}
