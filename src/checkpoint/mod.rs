//! Checkpoints: full battle snapshots for resumption after a disconnect.
//!
//! A [`Checkpoint`] maps component ids to JSON state:
//!
//! | Component        | Contents                                       |
//! |------------------|------------------------------------------------|
//! | `battle`         | rosters, round and turn counters, phase, result |
//! | `scheduler`      | actor order and cursor of the current round    |
//! | `rng`            | randomness source position (host only)         |
//! | `replication`    | next sequence number                           |
//! | `handler:<id>`   | each handler's per-battle bookkeeping          |
//!
//! Checkpoints are taken between turns. Import is idempotent, and a missing
//! component means "no prior state": battle-level components keep their
//! current value, handlers are reset through `import_state(None)`.

use im::OrdMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::battle::{Battle, BattleOutcome, BattlePhase, BattleState, Scheduler};
use crate::core::{BattleError, BattleRng, BattleRngState};
use crate::net::ReplicationState;

/// Current checkpoint format version.
pub const CHECKPOINT_VERSION: u32 = 1;

const HANDLER_PREFIX: &str = "handler:";

/// A value stored under a fixed component id.
pub trait Component: Serialize + DeserializeOwned {
    const ID: &'static str;
}

/// The `battle` component.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BattleSnapshot {
    pub state: BattleState,
    pub phase: BattlePhase,
    pub outcome: Option<BattleOutcome>,
}

impl Component for BattleSnapshot {
    const ID: &'static str = "battle";
}

impl Component for Scheduler {
    const ID: &'static str = "scheduler";
}

impl Component for BattleRngState {
    const ID: &'static str = "rng";
}

impl Component for ReplicationState {
    const ID: &'static str = "replication";
}

/// Serializable snapshot `{ component id → state }`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Checkpoint {
    pub version: u32,
    pub components: OrdMap<String, Value>,
}

impl Checkpoint {
    /// Create an empty checkpoint.
    pub fn new() -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            components: OrdMap::new(),
        }
    }

    /// Store a typed component.
    pub fn insert<C: Component>(&mut self, component: &C) -> Result<(), BattleError> {
        let value = serde_json::to_value(component).map_err(BattleError::Checkpoint)?;
        self.components.insert(C::ID.to_string(), value);
        Ok(())
    }

    /// Read a typed component; `None` when absent.
    pub fn get<C: Component>(&self) -> Result<Option<C>, BattleError> {
        self.components
            .get(C::ID)
            .map(|v| serde_json::from_value(v.clone()).map_err(BattleError::Checkpoint))
            .transpose()
    }

    /// Store raw handler bookkeeping.
    pub fn insert_handler(&mut self, id: &str, state: Value) {
        self.components.insert(format!("{HANDLER_PREFIX}{id}"), state);
    }

    /// Raw handler bookkeeping; `None` when absent.
    #[must_use]
    pub fn handler(&self, id: &str) -> Option<&Value> {
        self.components.get(&format!("{HANDLER_PREFIX}{id}"))
    }

    /// Component ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> Result<String, BattleError> {
        serde_json::to_string(self).map_err(BattleError::Checkpoint)
    }

    /// Decode from JSON.
    pub fn from_json(json: &str) -> Result<Self, BattleError> {
        serde_json::from_str(json).map_err(BattleError::Checkpoint)
    }
}

impl Battle {
    /// Snapshot every stateful component. Take it between turns.
    pub fn export_checkpoint(&self) -> Result<Checkpoint, BattleError> {
        let mut checkpoint = Checkpoint::new();

        checkpoint.insert(&BattleSnapshot {
            state: self.state.clone(),
            phase: self.phase,
            outcome: self.outcome,
        })?;
        checkpoint.insert(&self.scheduler)?;
        checkpoint.insert(&self.replicator.state())?;
        if let Some(rng) = &self.rng {
            checkpoint.insert(&rng.state())?;
        }
        for (id, state) in self.registry.export_states() {
            checkpoint.insert_handler(&id, state);
        }

        debug!(components = checkpoint.components.len(), "checkpoint exported");
        Ok(checkpoint)
    }

    /// Restore from a checkpoint. Missing components are treated as "no
    /// prior state". Decoding happens before anything is changed, so a
    /// malformed checkpoint leaves the battle untouched.
    pub fn import_checkpoint(&mut self, checkpoint: &Checkpoint) -> Result<(), BattleError> {
        let snapshot = checkpoint.get::<BattleSnapshot>()?;
        let scheduler = checkpoint.get::<Scheduler>()?;
        let replication = checkpoint.get::<ReplicationState>()?;
        let rng = checkpoint.get::<BattleRngState>()?;

        if let Some(snapshot) = snapshot {
            self.state = snapshot.state;
            self.phase = snapshot.phase;
            self.outcome = snapshot.outcome;

            let clamped = self.state.clamp_vitals();
            if clamped > 0 {
                warn!(clamped, "checkpoint carried hp above max, clamped");
            }
        }
        if let Some(scheduler) = scheduler {
            self.scheduler = scheduler;
        }
        if let Some(replication) = replication {
            self.replicator.restore(replication);
        }
        if let (Some(state), Some(current)) = (rng, self.rng.as_mut()) {
            *current = BattleRng::from_state(&state);
        }

        let ids: Vec<String> = self.registry.ids().map(str::to_string).collect();
        for id in ids {
            self.registry.import_state(&id, checkpoint.handler(&id));
        }

        self.checkpoint_recommended = false;
        info!(
            round = self.state.round,
            turn = self.state.current_turn,
            "checkpoint imported"
        );
        Ok(())
    }

    /// Export as a JSON document for the reconnection flow.
    pub fn export_battle_state(&self) -> Result<String, BattleError> {
        self.export_checkpoint()?.to_json()
    }

    /// Import a JSON document produced by [`Battle::export_battle_state`].
    pub fn import_battle_state(&mut self, json: &str) -> Result<(), BattleError> {
        let checkpoint = Checkpoint::from_json(json)?;
        self.import_checkpoint(&checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::{SideState, Step};
    use crate::combatant::Combatant;
    use crate::core::{AbsoluteSide, BattleConfig, CombatantKey, Position, SideMap};
    use crate::net::MessageLog;

    fn roster() -> SideMap<SideState> {
        SideMap::new(|side| match side {
            AbsoluteSide::Host => SideState::new().with_hero(Position::Left, Combatant::new("Ayla", 100, 20)),
            AbsoluteSide::Guest => SideState::new().with_hero(Position::Left, Combatant::new("Cid", 100, 15)),
        })
    }

    #[test]
    fn test_component_ids() {
        let battle = Battle::host(BattleConfig::new(1), roster(), Box::new(MessageLog::new()));
        let checkpoint = battle.export_checkpoint().unwrap();
        let ids: Vec<_> = checkpoint.ids().collect();
        assert_eq!(ids, vec!["battle", "replication", "rng", "scheduler"]);
    }

    #[test]
    fn test_guest_checkpoint_has_no_rng() {
        let battle = Battle::guest(BattleConfig::new(1), roster());
        let checkpoint = battle.export_checkpoint().unwrap();
        assert!(checkpoint.get::<BattleRngState>().unwrap().is_none());
    }

    #[test]
    fn test_empty_checkpoint_changes_nothing() {
        let mut battle = Battle::host(BattleConfig::new(1), roster(), Box::new(MessageLog::new()));
        for _ in 0..4 {
            battle.step().unwrap();
        }
        let before = battle.state().clone();

        battle.import_checkpoint(&Checkpoint::new()).unwrap();
        assert_eq!(battle.state(), &before);
    }

    #[test]
    fn test_malformed_component_leaves_battle_untouched() {
        let mut battle = Battle::host(BattleConfig::new(1), roster(), Box::new(MessageLog::new()));
        let before = battle.state().clone();

        let mut checkpoint = Checkpoint::new();
        checkpoint.components.insert("battle".into(), serde_json::json!({"state": 5}));
        assert!(matches!(
            battle.import_checkpoint(&checkpoint),
            Err(BattleError::Checkpoint(_))
        ));
        assert_eq!(battle.state(), &before);
    }

    #[test]
    fn test_json_round_trip_restores_mid_round() {
        let mut battle = Battle::host(BattleConfig::new(9), roster(), Box::new(MessageLog::new()));
        for _ in 0..3 {
            battle.step().unwrap();
        }
        let json = battle.export_battle_state().unwrap();

        let mut restored = Battle::host(BattleConfig::new(9), roster(), Box::new(MessageLog::new()));
        restored.import_battle_state(&json).unwrap();
        restored.import_battle_state(&json).unwrap();

        assert_eq!(restored.state(), battle.state());
        assert_eq!(restored.rng_state(), battle.rng_state());
        assert_eq!(restored.phase(), BattlePhase::Running);

        let cid = CombatantKey::hero(AbsoluteSide::Guest, Position::Left);
        assert_eq!(restored.state().get(cid).unwrap().current_hp, 80);

        // both continue identically
        let wire = |step: Step| {
            step.messages
                .into_iter()
                .map(|m| (m.kind, m.payload, m.seq))
                .collect::<Vec<_>>()
        };
        assert_eq!(wire(battle.step().unwrap()), wire(restored.step().unwrap()));
        assert_eq!(battle.state(), restored.state());
    }

    #[test]
    fn test_import_clamps_hp_to_max() {
        let cid = CombatantKey::hero(AbsoluteSide::Guest, Position::Left);
        let mut source = Battle::host(BattleConfig::new(2), roster(), Box::new(MessageLog::new()));
        source.state.get_mut(cid).unwrap().current_hp = 500;
        let checkpoint = source.export_checkpoint().unwrap();

        let mut restored = Battle::host(BattleConfig::new(2), roster(), Box::new(MessageLog::new()));
        restored.import_checkpoint(&checkpoint).unwrap();

        let c = restored.state().get(cid).unwrap();
        assert_eq!(c.current_hp, c.max_hp);
        assert_eq!(c.clone().heal(10), 0);
    }

    #[test]
    fn test_partial_battle_fields_default() {
        let mut checkpoint = Checkpoint::new();
        checkpoint
            .components
            .insert("scheduler".into(), serde_json::json!({"cursor": 1}));
        let scheduler = checkpoint.get::<Scheduler>().unwrap().unwrap();
        assert!(!scheduler.in_round());
    }
}
