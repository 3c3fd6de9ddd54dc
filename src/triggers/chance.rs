//! Trigger chance formulas.
//!
//! Stacked copies of a probabilistic effect combine multiplicatively:
//! `1 - (1 - p)^n`, never `n * p`. Handlers that document a different
//! scaling (for example an additive bonus from some battle counter) use
//! [`additive_bonus`] or [`multiplicative_bonus`] explicitly; the formulas
//! are deliberately not unified.

use crate::core::BattleRng;

/// Probability that at least one of `copies` independent `p` rolls succeeds.
///
/// ```
/// use battle_sync::triggers::combined_chance;
///
/// assert!((combined_chance(0.2, 2) - 0.36).abs() < 1e-12);
/// assert_eq!(combined_chance(0.2, 0), 0.0);
/// ```
#[must_use]
pub fn combined_chance(p: f64, copies: u32) -> f64 {
    if copies == 0 || p.is_nan() {
        return 0.0;
    }
    let p = p.clamp(0.0, 1.0);
    let exponent = i32::try_from(copies).unwrap_or(i32::MAX);
    1.0 - (1.0 - p).powi(exponent)
}

/// Roll each of `copies` independently; returns how many succeeded.
pub fn independent_rolls(rng: &mut BattleRng, p: f64, copies: u32) -> u32 {
    (0..copies).filter(|_| rng.roll(p)).count() as u32
}

/// `base + bonus_per_unit * units`, clamped to `[0, 1]`.
#[must_use]
pub fn additive_bonus(base: f64, bonus_per_unit: f64, units: u32) -> f64 {
    (base + bonus_per_unit * f64::from(units)).clamp(0.0, 1.0)
}

/// `base * (1 + bonus_per_unit) ^ units`, clamped to `[0, 1]`.
#[must_use]
pub fn multiplicative_bonus(base: f64, bonus_per_unit: f64, units: u32) -> f64 {
    let exponent = i32::try_from(units).unwrap_or(i32::MAX);
    (base * (1.0 + bonus_per_unit).powi(exponent)).clamp(0.0, 1.0)
}
