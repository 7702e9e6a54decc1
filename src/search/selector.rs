//! Weighted neighbour selectors and roulette-wheel choice.
//!
//! Each selector wraps one move generator with a static `bonus`. In
//! adaptive mode it also carries `points`, which start at the bonus and
//! are updated at the end of every segment from the scores the selector
//! collected.
//!
//! # Scoring
//!
//! Per use, scaled by the bonus:
//! - improving move accepted: [`SCORE_IMPROVED`]
//! - other move accepted: [`SCORE_ACCEPTED`]
//! - move rejected or none generated: 0
//!
//! At the end of a segment:
//!
//! `points = max(min_ratio * bonus, points * (1 - rho) + rho * avg_score)`
//!
//! # References
//!
//! Ropke & Pisinger (2006), Equation (1)

use super::control::ControlCell;
use super::selection::NeighbourSelection;
use crate::model::Model;
use rand::Rng;
use std::fmt;
use std::sync::Arc;

/// Score of an accepted strictly improving move.
pub const SCORE_IMPROVED: f64 = 2.0;
/// Score of any other accepted move.
pub const SCORE_ACCEPTED: f64 = 1.0;

/// One move generator with its execution weight.
pub struct NeighbourSelector<M: Model> {
    selection: Arc<dyn NeighbourSelection<M>>,
    bonus: f64,
    points: ControlCell,
}

impl<M: Model> fmt::Debug for NeighbourSelector<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NeighbourSelector")
            .field("selection", &self.selection.name())
            .field("bonus", &self.bonus)
            .field("points", &self.points())
            .finish()
    }
}

impl<M: Model> NeighbourSelector<M> {
    /// Wraps `selection`; negative or non-finite bonuses become 0.
    pub fn new(selection: Arc<dyn NeighbourSelection<M>>, bonus: f64) -> Self {
        let bonus = if bonus.is_finite() && bonus >= 0.0 {
            bonus
        } else {
            tracing::warn!(selection = selection.name(), bonus, "invalid bonus, using 0");
            0.0
        };
        Self {
            selection,
            bonus,
            points: ControlCell::new(),
        }
    }

    pub fn selection(&self) -> &Arc<dyn NeighbourSelection<M>> {
        &self.selection
    }

    pub fn bonus(&self) -> f64 {
        self.bonus
    }

    /// Current adaptive points (the bonus until the first update).
    pub fn points(&self) -> f64 {
        self.points.get().unwrap_or(self.bonus)
    }

    /// Roulette weight: points in adaptive mode, bonus otherwise.
    pub fn weight(&self, adaptive: bool) -> f64 {
        if adaptive {
            self.points()
        } else {
            self.bonus
        }
    }

    /// Folds a segment's average score into the points.
    pub(crate) fn update_points(&self, stats: &SegmentStats, reaction_factor: f64, min_ratio: f64) {
        if stats.uses == 0 {
            return;
        }
        let avg_score = stats.score / stats.uses as f64;
        let points = self.points() * (1.0 - reaction_factor) + avg_score * reaction_factor;
        self.points.set(points.max(min_ratio * self.bonus));
    }
}

/// Scores a selector collected during the current segment.
#[derive(Debug, Clone, Default)]
pub(crate) struct SegmentStats {
    pub(crate) score: f64,
    pub(crate) uses: usize,
}

impl SegmentStats {
    pub(crate) fn record(&mut self, score: f64) {
        self.score += score;
        self.uses += 1;
    }
}

/// Select an index by roulette wheel over `weights`.
///
/// Only positive finite weights take part; falls back to a uniform choice
/// when no such weight exists.
pub(crate) fn roulette_select<R: Rng>(weights: &[f64], rng: &mut R) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }
    let total: f64 = weights.iter().copied().filter(|w| is_live(*w)).sum();
    if total <= 0.0 || !total.is_finite() {
        return Some(rng.random_range(0..weights.len()));
    }
    Some(roulette_pick(weights, rng.random_range(0.0..total)))
}

fn is_live(weight: f64) -> bool {
    weight > 0.0 && weight.is_finite()
}

/// Index whose cumulative slice of the positive weights contains `roll`.
fn roulette_pick(weights: &[f64], mut roll: f64) -> usize {
    let mut last = 0;
    for (i, w) in weights.iter().copied().enumerate().filter(|(_, w)| is_live(*w)) {
        last = i;
        roll -= w;
        if roll < 0.0 {
            return i;
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Scripted, ToyModel};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_roulette_skips_non_positive_weights() {
        assert_eq!(roulette_pick(&[0.0, 1.0], 0.0), 1);
        assert_eq!(roulette_pick(&[2.0, -1.0, 0.0, 1.0], 1.999), 0);
        assert_eq!(roulette_pick(&[2.0, -1.0, 0.0, 1.0], 2.0), 3);
        // rounding past the total lands on the last live weight
        assert_eq!(roulette_pick(&[1.0, 1.0, 0.0], 2.0), 1);

        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..1_000 {
            assert_eq!(roulette_select(&[0.0, 1.0], &mut rng), Some(1));
            assert_eq!(roulette_select(&[-5.0, 1.0, f64::NAN], &mut rng), Some(1));
        }
    }

    #[test]
    fn test_roulette_respects_weights() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts = [0usize; 3];
        for _ in 0..10_000 {
            counts[roulette_select(&[1.0, 0.0, 3.0], &mut rng).unwrap()] += 1;
        }
        assert_eq!(counts[1], 0);
        let ratio = counts[2] as f64 / counts[0] as f64;
        assert!((2.5..3.5).contains(&ratio), "ratio {ratio}");
    }

    #[test]
    fn test_roulette_zero_total_is_uniform() {
        let mut rng = StdRng::seed_from_u64(1);
        let picked = roulette_select(&[0.0, 0.0], &mut rng);
        assert!(matches!(picked, Some(0 | 1)));
        assert_eq!(roulette_select(&[], &mut rng), None);
    }

    #[test]
    fn test_points_start_at_bonus_and_floor() {
        let sel: NeighbourSelector<ToyModel> = NeighbourSelector::new(Scripted::constant(1.0), 2.0);
        assert_eq!(sel.points(), 2.0);
        assert_eq!(sel.weight(false), 2.0);

        let idle = SegmentStats { score: 0.0, uses: 10 };
        for _ in 0..200 {
            sel.update_points(&idle, 0.5, 0.1);
        }
        assert!((sel.points() - 0.2).abs() < 1e-9);

        let good = SegmentStats { score: 40.0, uses: 10 };
        sel.update_points(&good, 0.5, 0.1);
        assert!(sel.points() > 2.0);
    }

    #[test]
    fn test_invalid_bonus_is_zero() {
        let sel: NeighbourSelector<ToyModel> = NeighbourSelector::new(Scripted::constant(1.0), -1.0);
        assert_eq!(sel.bonus(), 0.0);
    }
}
