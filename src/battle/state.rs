//! Battle state: both rosters plus the round/turn counters.
//!
//! ## Layout
//!
//! Each side has three hero slots (left, center, right). A slot holds a
//! hero and the hero's ordered creature list. Creatures stay in the list
//! after death so their index remains a valid [`CombatantKey`].
//!
//! ## Targeting
//!
//! An attacker standing in column `p` looks at enemy columns in
//! `p.facing_order()`. Within a column the first alive creature is hit
//! first, then the hero. Columns with nothing alive are passed over.
//!
//! Uses `im` vectors so snapshots taken before every handler `apply` are
//! O(1).

use im::Vector;
use serde::{Deserialize, Serialize};

use crate::combatant::Combatant;
use crate::core::{AbsoluteSide, CombatantKey, Position, SideMap};

/// A hero with the creatures it brought into battle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroSlot {
    pub hero: Combatant,
    #[serde(default)]
    pub creatures: Vector<Combatant>,
}

impl HeroSlot {
    /// Create a slot with no creatures.
    pub fn new(hero: Combatant) -> Self {
        Self {
            hero,
            creatures: Vector::new(),
        }
    }

    /// Append a creature (builder pattern).
    #[must_use]
    pub fn with_creature(mut self, creature: Combatant) -> Self {
        self.creatures.push_back(creature);
        self
    }
}

/// One side's formation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideState {
    slots: [Option<HeroSlot>; 3],
}

impl SideState {
    /// Create an empty formation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a hero (builder pattern). Replaces any hero already there.
    #[must_use]
    pub fn with_hero(mut self, position: Position, hero: Combatant) -> Self {
        self.slots[position.index()] = Some(HeroSlot::new(hero));
        self
    }

    /// Place a full slot (builder pattern).
    #[must_use]
    pub fn with_slot(mut self, position: Position, slot: HeroSlot) -> Self {
        self.slots[position.index()] = Some(slot);
        self
    }

    /// Append a creature to the hero at `position` (builder pattern).
    /// Ignored when that slot has no hero.
    #[must_use]
    pub fn with_creature(mut self, position: Position, creature: Combatant) -> Self {
        if let Some(slot) = self.slots[position.index()].as_mut() {
            slot.creatures.push_back(creature);
        }
        self
    }

    /// The slot at `position`, if occupied.
    #[must_use]
    pub fn slot(&self, position: Position) -> Option<&HeroSlot> {
        self.slots[position.index()].as_ref()
    }

    /// Mutable slot at `position`, if occupied.
    pub fn slot_mut(&mut self, position: Position) -> Option<&mut HeroSlot> {
        self.slots[position.index()].as_mut()
    }

    /// Occupied slots in position order.
    pub fn slots(&self) -> impl Iterator<Item = (Position, &HeroSlot)> {
        Position::ALL
            .into_iter()
            .filter_map(|p| self.slot(p).map(|slot| (p, slot)))
    }
}

/// Complete mutable battle state.
///
/// This is the only thing handlers mutate, and the only thing the guest
/// mirror has to reproduce.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BattleState {
    pub sides: SideMap<SideState>,
    /// Current round (0 before the first round starts).
    pub round: u32,
    /// Turns taken so far in the whole battle.
    pub current_turn: u32,
}

impl BattleState {
    /// Create a state from both formations.
    pub fn new(sides: SideMap<SideState>) -> Self {
        Self {
            sides,
            round: 0,
            current_turn: 0,
        }
    }

    // === Lookup ===

    /// Look up a combatant.
    #[must_use]
    pub fn get(&self, key: CombatantKey) -> Option<&Combatant> {
        let slot = self.sides[key.side].slot(key.position)?;
        match key.creature {
            None => Some(&slot.hero),
            Some(index) => slot.creatures.get(index),
        }
    }

    /// Look up a combatant mutably.
    pub fn get_mut(&mut self, key: CombatantKey) -> Option<&mut Combatant> {
        let slot = self.sides[key.side].slot_mut(key.position)?;
        match key.creature {
            None => Some(&mut slot.hero),
            Some(index) => slot.creatures.get_mut(index),
        }
    }

    /// Does `key` name a living combatant?
    #[must_use]
    pub fn is_alive(&self, key: CombatantKey) -> bool {
        self.get(key).is_some_and(Combatant::is_alive)
    }

    /// Every key on one side: per position, the hero then its creatures.
    pub fn keys(&self, side: AbsoluteSide) -> impl Iterator<Item = CombatantKey> + '_ {
        self.sides[side].slots().flat_map(move |(position, slot)| {
            let hero = CombatantKey::hero(side, position);
            std::iter::once(hero).chain((0..slot.creatures.len()).map(move |i| hero.creature(i)))
        })
    }

    /// Every key in scheduling order: for each position, host then guest,
    /// each hero followed by its creatures.
    #[must_use]
    pub fn turn_order(&self) -> Vec<CombatantKey> {
        let mut order = Vec::new();
        for position in Position::ALL {
            for side in AbsoluteSide::ALL {
                if let Some(slot) = self.sides[side].slot(position) {
                    let hero = CombatantKey::hero(side, position);
                    order.push(hero);
                    order.extend((0..slot.creatures.len()).map(|i| hero.creature(i)));
                }
            }
        }
        order
    }

    /// Living combatants on one side.
    pub fn alive_keys(&self, side: AbsoluteSide) -> impl Iterator<Item = CombatantKey> + '_ {
        self.keys(side).filter(move |&k| self.is_alive(k))
    }

    // === Targeting ===

    /// Default target for `attacker`: see the module docs.
    #[must_use]
    pub fn select_target(&self, attacker: CombatantKey) -> Option<CombatantKey> {
        let enemy = attacker.side.opposite();
        attacker
            .position
            .facing_order()
            .into_iter()
            .find_map(|position| self.column_target(enemy, position))
    }

    fn column_target(&self, side: AbsoluteSide, position: Position) -> Option<CombatantKey> {
        let slot = self.sides[side].slot(position)?;
        let hero = CombatantKey::hero(side, position);

        slot.creatures
            .iter()
            .position(Combatant::is_alive)
            .map(|i| hero.creature(i))
            .or_else(|| slot.hero.is_alive().then_some(hero))
    }

    /// Living heroes on `side` other than `except`.
    pub fn allied_heroes(
        &self,
        side: AbsoluteSide,
        except: CombatantKey,
    ) -> impl Iterator<Item = CombatantKey> + '_ {
        Position::ALL
            .into_iter()
            .map(move |p| CombatantKey::hero(side, p))
            .filter(move |&k| k != except && self.is_alive(k))
    }

    // === Outcome ===

    /// Has `side` lost every combatant?
    #[must_use]
    pub fn is_defeated(&self, side: AbsoluteSide) -> bool {
        self.alive_keys(side).next().is_none()
    }

    /// Number of combatants (alive or not) across both sides.
    #[must_use]
    pub fn combatant_count(&self) -> usize {
        AbsoluteSide::ALL.iter().map(|&s| self.keys(s).count()).sum()
    }

    /// Pull every combatant's HP back into `[0, max_hp]`. Returns how many
    /// needed it.
    pub fn clamp_vitals(&mut self) -> usize {
        let mut clamped = 0;
        for key in self.turn_order() {
            if let Some(c) = self.get_mut(key) {
                if c.current_hp > c.max_hp {
                    c.apply_hp(c.current_hp);
                    clamped += 1;
                }
            }
        }
        clamped
    }
}
