//! Great deluge acceptance strategy.

use super::config::GdConfig;
use crate::model::{Model, Solution};
use crate::properties::adjusted;
use crate::search::{resulting_total, AcceptanceStrategy, Role, SearchContext};

/// Per-thread great deluge state.
#[derive(Debug, Clone, Default)]
pub struct DelugeState {
    /// Water level (master).
    pub bound: f64,
    /// Water level at the start of the current pass.
    pub pass_start: f64,
    /// Completed passes without a significant new best.
    pub idle_passes: u32,
    pub last_improving: u64,
    pub best_value: f64,
    moves: u64,
    accepted: u64,
}

/// Accepts a move when it does not worsen the solution or when the
/// resulting total stays below a slowly sinking water level.
///
/// The master lowers the level every iteration. Each time it falls below
/// the lower band a new, wider pass starts at the upper band.
///
/// # Bands
///
/// With `k` idle passes and best value `b >= 0`:
/// - upper: `max(b + 2, UpperBoundRate^(1 + k) * b)`
/// - lower: `LowerBoundRate^(1 + k) * b`
///
/// Negative best values divide by the rates instead.
///
/// # References
///
/// Dueck (1993), "New Optimization Heuristics: The Great Deluge Algorithm
/// and the Record-to-Record Travel"
#[derive(Debug, Clone)]
pub struct GreatDeluge {
    config: GdConfig,
}

impl GreatDeluge {
    pub fn new(config: GdConfig) -> Self {
        Self {
            config: config.normalized(),
        }
    }

    pub fn config(&self) -> &GdConfig {
        &self.config
    }

    /// Water level at activation for the given best value.
    pub fn initial_bound(&self, best: f64) -> f64 {
        if best > 0.0 {
            self.config.upper_bound_rate * best
        } else {
            best / self.config.upper_bound_rate
        }
    }

    /// Upper and lower band after `idle_passes` idle passes.
    pub fn bands(&self, best: f64, idle_passes: u32) -> (f64, f64) {
        let exp = 1 + idle_passes as i32;
        let up = self.config.upper_bound_rate.powi(exp);
        let low = self.config.lower_bound_rate.powi(exp);
        if best >= 0.0 {
            ((best + 2.0).max(up * best), low * best)
        } else {
            ((best + 2.0).max(best / up), best / low)
        }
    }

    fn cool_rate<C>(&self, cx: &SearchContext<C>) -> f64 {
        adjusted(
            self.config.cool_rate,
            self.config.cool_rate_adjustments.as_deref(),
            cx.adjustment_slot(),
        )
    }
}

impl<M: Model> AcceptanceStrategy<M> for GreatDeluge {
    type Context = DelugeState;

    fn name(&self) -> &str {
        "Great Deluge"
    }

    fn create_context(&self, _solution: &Solution<M>, _role: Role) -> DelugeState {
        DelugeState::default()
    }

    fn activate(&self, cx: &mut SearchContext<DelugeState>, solution: &mut Solution<M>) {
        let best = solution.best_value();
        let bound = self.initial_bound(best);
        cx.state = DelugeState {
            bound,
            pass_start: bound,
            best_value: best,
            ..DelugeState::default()
        };
        cx.publish(bound);
    }

    fn inc_iteration(&self, cx: &mut SearchContext<DelugeState>, solution: &mut Solution<M>) {
        cx.state.moves += 1;
        if !cx.is_master() {
            return;
        }
        let best = solution.best_value();
        let rate = self.cool_rate(cx);
        if best >= 0.0 {
            cx.state.bound *= rate;
        } else {
            cx.state.bound /= rate;
        }

        let (upper, lower) = self.bands(best, cx.state.idle_passes);
        if cx.state.bound > upper {
            cx.state.bound = upper;
        } else if cx.state.bound < lower {
            cx.state.idle_passes += 1;
            cx.state.bound = upper;
            cx.state.pass_start = upper;
            tracing::info!(
                thread = cx.index(),
                passes = cx.state.idle_passes + 1,
                bound = upper,
                "Great Deluge [{}]...",
                cx.state.idle_passes + 1
            );
        }
        let width = cx.state.pass_start - lower;
        if width > 0.0 {
            cx.set_progress(1.0 - (cx.state.bound - lower) / width);
        }
        cx.publish(cx.state.bound);

        if cx.iteration() % 10_000 == 0 {
            let state = &cx.state;
            tracing::debug!(
                thread = cx.index(),
                iter = cx.iteration(),
                bound = state.bound,
                best,
                value = solution.total_value(),
                idle = state.idle_passes,
                "bound is {:.2} ({:.2}% of best), Pacc={:.5}%",
                state.bound,
                100.0 * state.bound / best,
                100.0 * state.accepted as f64 / state.moves.max(1) as f64
            );
            cx.state.moves = 0;
            cx.state.accepted = 0;
        }
    }

    fn accept(
        &self,
        cx: &mut SearchContext<DelugeState>,
        solution: &Solution<M>,
        value: f64,
        lazy: bool,
    ) -> bool {
        let bound = if cx.is_master() {
            Some(cx.state.bound)
        } else {
            cx.published()
        };
        let accepted = value <= 0.0 || bound.is_some_and(|b| resulting_total(solution, value, lazy) < b);
        if accepted {
            cx.state.accepted += 1;
        }
        accepted
    }

    fn best_saved(&self, cx: &mut SearchContext<DelugeState>, solution: &mut Solution<M>) {
        let best = solution.best_value();
        if (cx.state.best_value - best).abs() >= 1.0 {
            cx.state.last_improving = cx.iteration();
            cx.state.idle_passes = 0;
            cx.state.best_value = best;
        }
    }
}
