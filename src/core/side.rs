//! Side identification and per-side data storage.
//!
//! ## AbsoluteSide
//!
//! Stable `host`/`guest` identity shared by both clients. Every payload
//! and checkpoint names sides this way.
//!
//! ## LocalSide
//!
//! Per-client `player`/`opponent` labelling, derived from the absolute side
//! and the client's own role. Used only for presentation.
//!
//! ## SideMap
//!
//! Two-slot storage indexed by `AbsoluteSide`.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Stable side identity, independent of which client is rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbsoluteSide {
    Host,
    Guest,
}

impl AbsoluteSide {
    /// Both sides in scheduling order.
    pub const ALL: [AbsoluteSide; 2] = [AbsoluteSide::Host, AbsoluteSide::Guest];

    /// The other side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            AbsoluteSide::Host => AbsoluteSide::Guest,
            AbsoluteSide::Guest => AbsoluteSide::Host,
        }
    }

    /// Map to the local label seen by a client playing `role`.
    ///
    /// ```
    /// use battle_sync::core::{AbsoluteSide, LocalSide};
    ///
    /// assert_eq!(AbsoluteSide::Guest.to_local(AbsoluteSide::Guest), LocalSide::Player);
    /// assert_eq!(AbsoluteSide::Host.to_local(AbsoluteSide::Guest), LocalSide::Opponent);
    /// ```
    #[must_use]
    pub const fn to_local(self, role: AbsoluteSide) -> LocalSide {
        if self as u8 == role as u8 {
            LocalSide::Player
        } else {
            LocalSide::Opponent
        }
    }
}

impl std::fmt::Display for AbsoluteSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbsoluteSide::Host => write!(f, "host"),
            AbsoluteSide::Guest => write!(f, "guest"),
        }
    }
}

/// Per-client side label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalSide {
    Player,
    Opponent,
}

impl LocalSide {
    /// Inverse of [`AbsoluteSide::to_local`].
    #[must_use]
    pub const fn to_absolute(self, role: AbsoluteSide) -> AbsoluteSide {
        match self {
            LocalSide::Player => role,
            LocalSide::Opponent => role.opposite(),
        }
    }
}

/// Per-side data storage with O(1) access.
///
/// ```
/// use battle_sync::core::{AbsoluteSide, SideMap};
///
/// let mut kills: SideMap<u32> = SideMap::with_value(0);
/// kills[AbsoluteSide::Guest] += 2;
/// assert_eq!(kills[AbsoluteSide::Host], 0);
/// assert_eq!(kills[AbsoluteSide::Guest], 2);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SideMap<T> {
    host: T,
    guest: T,
}

impl<T> SideMap<T> {
    /// Create with values from a factory function.
    pub fn new(factory: impl Fn(AbsoluteSide) -> T) -> Self {
        Self {
            host: factory(AbsoluteSide::Host),
            guest: factory(AbsoluteSide::Guest),
        }
    }

    /// Create with both entries set to the same value.
    pub fn with_value(value: T) -> Self
    where
        T: Clone,
    {
        Self {
            host: value.clone(),
            guest: value,
        }
    }

    /// Get a reference to a side's data.
    #[must_use]
    pub fn get(&self, side: AbsoluteSide) -> &T {
        match side {
            AbsoluteSide::Host => &self.host,
            AbsoluteSide::Guest => &self.guest,
        }
    }

    /// Get a mutable reference to a side's data.
    pub fn get_mut(&mut self, side: AbsoluteSide) -> &mut T {
        match side {
            AbsoluteSide::Host => &mut self.host,
            AbsoluteSide::Guest => &mut self.guest,
        }
    }

    /// Iterate over (side, &T) pairs in scheduling order.
    pub fn iter(&self) -> impl Iterator<Item = (AbsoluteSide, &T)> {
        [(AbsoluteSide::Host, &self.host), (AbsoluteSide::Guest, &self.guest)].into_iter()
    }
}

impl<T: Default> Default for SideMap<T> {
    fn default() -> Self {
        Self::new(|_| T::default())
    }
}

impl<T> Index<AbsoluteSide> for SideMap<T> {
    type Output = T;

    fn index(&self, side: AbsoluteSide) -> &Self::Output {
        self.get(side)
    }
}

impl<T> IndexMut<AbsoluteSide> for SideMap<T> {
    fn index_mut(&mut self, side: AbsoluteSide) -> &mut Self::Output {
        self.get_mut(side)
    }
}
