//! Belief vectors and safe probability normalization.
//!
//! CFR's positive-regret clipping routinely produces all-zero rows at
//! dominated actions; normalization therefore treats underflow as data and
//! falls back to the uniform distribution instead of failing.

use crate::Pair;
use crate::game::Game;

/// Threshold below which a reach-probability mass is considered zero.
pub const REACH_SMOOTHING_EPS: f64 = 1e-80;

/// Threshold below which a regret mass is considered zero.
pub const REGRET_SMOOTHING_EPS: f64 = 1e-80;

/// Normalize `values` into a fresh distribution.
///
/// If the sum is at least `eps` the result is `values / sum`; otherwise the
/// uniform distribution over all entries. The output always sums to 1 within
/// floating-point tolerance.
#[must_use]
pub fn normalize_probabilities_safe(values: &[f64], eps: f64) -> Vec<f64> {
    let mut out = values.to_vec();
    normalize_probabilities_safe_in_place(&mut out, eps);
    out
}

/// In-place variant of [`normalize_probabilities_safe`].
#[allow(clippy::cast_precision_loss)]
pub fn normalize_probabilities_safe_in_place(values: &mut [f64], eps: f64) {
    let sum: f64 = values.iter().sum();
    if sum >= eps {
        for v in values.iter_mut() {
            *v /= sum;
        }
    } else {
        let uniform = 1.0 / values.len() as f64;
        values.fill(uniform);
    }
}

/// Safe normalization writing `f32` output, used when packing queries.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn write_normalized_probabilities(values: &[f64], eps: f64, out: &mut [f32]) {
    assert_eq!(values.len(), out.len());
    let sum: f64 = values.iter().sum();
    if sum >= eps {
        for (slot, &v) in out.iter_mut().zip(values) {
            *slot = (v / sum) as f32;
        }
    } else {
        let uniform = 1.0 / values.len() as f64;
        out.fill(uniform as f32);
    }
}

/// Uniform distribution over all hands.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn uniform_beliefs(game: &Game) -> Vec<f64> {
    vec![1.0 / game.num_hands() as f64; game.num_hands()]
}

/// Uniform beliefs for both players, the distribution at the game's root.
#[must_use]
pub fn initial_beliefs(game: &Game) -> Pair<Vec<f64>> {
    [uniform_beliefs(game), uniform_beliefs(game)]
}
