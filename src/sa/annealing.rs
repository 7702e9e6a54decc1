//! Simulated annealing acceptance strategy.

use super::config::{acceptance_probability, SaConfig, Temperatures};
use crate::model::{Model, Solution};
use crate::properties::adjusted;
use crate::search::{resulting_total, AcceptanceStrategy, Role, SearchContext};
use rand::Rng;

/// Per-thread annealing state.
///
/// Only the master advances the schedule; a follower reads the temperature
/// the master last published and keeps only its own best-value record.
#[derive(Debug, Clone)]
pub struct AnnealingState {
    /// Current temperature (master).
    pub temperature: f64,
    /// Temperatures of the current run; `None` while still training.
    pub calibration: Option<Temperatures>,
    pub temperature_length: u64,
    pub reheat_length: u64,
    pub restore_length: u64,
    pub last_improving: Option<u64>,
    pub last_best: Option<u64>,
    pub last_reheat: u64,
    pub last_cooling: u64,
    /// Best value seen by this thread, for absolute acceptance and
    /// restore decisions.
    pub best_value: f64,
    training_count: u64,
    training_total: f64,
    moves: u64,
    square_sum: f64,
    accepted: [u64; 3],
}

impl AnnealingState {
    fn tally(&mut self, value: f64) {
        let slot = if value < 0.0 {
            0
        } else if value > 0.0 {
            2
        } else {
            1
        };
        self.accepted[slot] += 1;
    }

    fn reset_tallies(&mut self) {
        self.moves = 0;
        self.square_sum = 0.0;
        self.accepted = [0; 3];
    }

    /// Worsening moves sampled for calibration so far.
    pub fn training_count(&self) -> u64 {
        self.training_count
    }
}

/// Simulated annealing with optional self-calibration, geometric cooling,
/// reheating and best-solution restores.
///
/// # Schedule (master thread)
///
/// Per iteration, in order:
/// 1. while training, sample and wait; calibrate once enough samples exist,
/// 2. restore the best when no new best appeared for `restore_length`
///    iterations,
/// 3. below the minimal temperature, restore the best if the current
///    solution is at least 0.1% worse, then reheat,
/// 4. otherwise reheat after `reheat_length` idle iterations,
/// 5. otherwise cool every `temperature_length` iterations (skipped when the
///    last improvement is more recent than that).
///
/// # References
///
/// - Kirkpatrick, Gelatt & Vecchi (1983), "Optimization by Simulated Annealing"
/// - Müller (2009), "ITC2007 Solver Description: A Hybrid Approach"
#[derive(Debug, Clone)]
pub struct SimulatedAnnealing {
    config: SaConfig,
    reheat_rate: f64,
}

impl SimulatedAnnealing {
    pub fn new(config: SaConfig) -> Self {
        let config = config.normalized();
        Self {
            reheat_rate: config.reheat_rate(),
            config,
        }
    }

    pub fn config(&self) -> &SaConfig {
        &self.config
    }

    fn cooling_rate<C>(&self, cx: &SearchContext<C>) -> f64 {
        adjusted(
            self.config.cooling_rate,
            self.config.cooling_rate_adjustments.as_deref(),
            cx.adjustment_slot(),
        )
    }

    fn set_lengths(&self, state: &mut AnnealingState, temperature_length: u64) {
        state.temperature_length = temperature_length.max(1);
        state.reheat_length =
            ((self.config.reheat_length_coef * state.temperature_length as f64).round() as u64).max(1);
        state.restore_length =
            ((self.config.restore_best_length_coef() * state.reheat_length as f64).round() as u64).max(1);
    }

    fn probability(&self, value: f64, temperature: f64) -> f64 {
        acceptance_probability(value, temperature, self.config.stochastic_hc)
    }

    fn train<M: Model>(&self, cx: &mut SearchContext<AnnealingState>, solution: &Solution<M>) {
        let mean = cx.state.training_total / cx.state.training_count.max(1) as f64;
        let t = Temperatures::train(mean, &self.config);
        let speed = cx.iteration() as f64 / (cx.elapsed().as_secs_f64() * 1000.0).max(1.0);
        let length = (speed * self.config.time_between_cooldowns * 1000.0).round() as u64;

        let state = &mut cx.state;
        state.calibration = Some(t);
        state.temperature = t.initial;
        self.set_lengths(state, length);
        state.last_improving = None;
        state.last_best = Some(0);
        state.last_reheat = 0;
        state.last_cooling = 0;
        state.best_value = solution.best_value();
        state.reset_tallies();

        tracing::info!(
            thread = cx.index(),
            mean,
            initial = t.initial,
            maximal = t.maximal,
            minimal = t.minimal,
            "temperature set to {:.5} (p(+0.1)={:.2}%, p(+1)={:.2}%, p(+10)={:.5}%)",
            t.initial,
            100.0 * self.probability(0.1, t.initial),
            100.0 * self.probability(1.0, t.initial),
            100.0 * self.probability(10.0, t.initial),
        );
        tracing::info!(
            thread = cx.index(),
            "training speed was {:.2} it/s, temperature length adjusted to {}",
            1000.0 * speed,
            cx.state.temperature_length
        );
        cx.publish(t.initial);
        cx.restart_clock();
    }

    fn restore_best<M: Model>(&self, cx: &mut SearchContext<AnnealingState>, solution: &mut Solution<M>) {
        if solution.restore_best() {
            tracing::info!(thread = cx.index(), "best solution restored");
        }
        cx.state.last_best = Some(cx.iteration());
    }

    fn cool<M: Model>(&self, cx: &mut SearchContext<AnnealingState>, solution: &Solution<M>) {
        let it = cx.iteration();
        let recent = cx
            .state
            .last_improving
            .is_some_and(|li| it <= li + cx.state.temperature_length);
        if !recent {
            let rate = self.cooling_rate(cx);
            let thread = cx.index();
            let state = &mut cx.state;
            state.temperature *= rate;
            let moves = state.moves.max(1) as f64;
            tracing::info!(
                thread,
                iter = it,
                value = solution.total_value(),
                best = solution.best_value(),
                "temperature decreased to {:.5} (#moves={}, rms(value)={:.2}, accept=-{:.2}/{:.2}/+{:.2}%, p(+1)={:.5}%)",
                state.temperature,
                state.moves,
                (state.square_sum / moves).sqrt(),
                100.0 * state.accepted[0] as f64 / moves,
                100.0 * state.accepted[1] as f64 / moves,
                100.0 * state.accepted[2] as f64 / moves,
                100.0 * self.probability(1.0, state.temperature),
            );
            cx.state.reset_tallies();
            cx.publish(cx.state.temperature);
        }
        cx.state.last_cooling = it;
    }

    fn reheat<M: Model>(&self, cx: &mut SearchContext<AnnealingState>, solution: &mut Solution<M>) {
        let it = cx.iteration();
        cx.state.temperature *= self.reheat_rate;
        cx.state.last_reheat = it;
        tracing::info!(
            thread = cx.index(),
            iter = it,
            value = solution.total_value(),
            best = solution.best_value(),
            "temperature increased to {:.5} (p(+0.1)={:.2}%, p(+1)={:.5}%)",
            cx.state.temperature,
            100.0 * self.probability(0.1, cx.state.temperature),
            100.0 * self.probability(1.0, cx.state.temperature),
        );
        let maximal = cx.state.calibration.map_or(f64::INFINITY, |t| t.maximal);
        if cx.state.temperature > maximal {
            self.restore_best(cx, solution);
            cx.state.last_improving = None;
        }
        cx.state.best_value = solution.best_value();
        cx.publish(cx.state.temperature);
    }

    /// Current solution is at least 0.1% worse than the best.
    fn materially_worse<M: Model>(solution: &Solution<M>) -> bool {
        let best = solution.best_value();
        let current = solution.total_value();
        if best == 0.0 {
            return current > 0.0;
        }
        (current - best) / best.abs() >= 0.001
    }
}

impl<M: Model> AcceptanceStrategy<M> for SimulatedAnnealing {
    type Context = AnnealingState;

    fn name(&self) -> &str {
        "Simulated Annealing"
    }

    fn create_context(&self, solution: &Solution<M>, _role: Role) -> AnnealingState {
        AnnealingState {
            temperature: 0.0,
            calibration: None,
            temperature_length: self.config.temperature_length,
            reheat_length: 1,
            restore_length: 1,
            last_improving: None,
            last_best: None,
            last_reheat: 0,
            last_cooling: 0,
            best_value: solution.best_value(),
            training_count: 0,
            training_total: 0.0,
            moves: 0,
            square_sum: 0.0,
            accepted: [0; 3],
        }
    }

    fn activate(&self, cx: &mut SearchContext<AnnealingState>, solution: &mut Solution<M>) {
        let state = &mut cx.state;
        state.training_count = 0;
        state.training_total = 0.0;
        if state.calibration.is_none() && !self.config.is_training() {
            state.calibration = Some(Temperatures::fixed(&self.config));
        }
        if let Some(t) = state.calibration {
            state.temperature = t.initial;
        }
        let length = state.temperature_length;
        self.set_lengths(state, length);
        state.last_improving = None;
        state.last_best = None;
        state.last_reheat = 0;
        state.last_cooling = 0;
        state.best_value = solution.best_value();
        state.reset_tallies();
        if cx.state.calibration.is_some() {
            cx.publish(cx.state.temperature);
        }
    }

    fn inc_iteration(&self, cx: &mut SearchContext<AnnealingState>, solution: &mut Solution<M>) {
        if !cx.is_master() {
            return;
        }
        if cx.state.calibration.is_none() {
            if cx.state.training_count < self.config.training_values {
                let progress = cx.state.training_count as f64 / self.config.training_values as f64;
                cx.set_progress(progress);
                return;
            }
            self.train(cx, solution);
        }

        let it = cx.iteration();
        if cx.state.last_best.is_some_and(|lb| it > lb + cx.state.restore_length) {
            self.restore_best(cx, solution);
        }
        let minimal = cx.state.calibration.map_or(0.0, |t| t.minimal);
        if cx.state.temperature < minimal {
            if Self::materially_worse(solution) {
                self.restore_best(cx, solution);
            }
            cx.state.last_improving = Some(it);
            self.reheat(cx, solution);
        } else if cx
            .state
            .last_improving
            .is_some_and(|li| it > cx.state.last_reheat.max(li) + cx.state.reheat_length)
        {
            self.reheat(cx, solution);
        } else if it > cx.state.last_cooling + cx.state.temperature_length {
            self.cool(cx, solution);
        }

        let since = cx.state.last_reheat.max(cx.state.last_improving.unwrap_or(0));
        let progress = it.saturating_sub(since) as f64 / cx.state.reheat_length as f64;
        cx.set_progress(progress);
    }

    fn accept(
        &self,
        cx: &mut SearchContext<AnnealingState>,
        solution: &Solution<M>,
        value: f64,
        lazy: bool,
    ) -> bool {
        cx.state.moves += 1;
        cx.state.square_sum += value * value;
        let v = if self.config.relative_acceptance {
            value
        } else {
            resulting_total(solution, value, lazy) - cx.state.best_value
        };

        let temperature = if cx.is_master() {
            if cx.state.calibration.is_none() {
                if v <= 0.0 {
                    cx.state.tally(value);
                    return true;
                }
                cx.state.training_count += 1;
                cx.state.training_total += v;
                return false;
            }
            cx.state.temperature
        } else {
            match cx.published() {
                Some(t) => t,
                None => {
                    if v <= 0.0 {
                        cx.state.tally(value);
                    }
                    return v <= 0.0;
                }
            }
        };

        let prob = self.probability(v, temperature);
        if prob >= 1.0 || cx.rng().random::<f64>() < prob {
            cx.state.tally(value);
            return true;
        }
        false
    }

    fn best_saved(&self, cx: &mut SearchContext<AnnealingState>, solution: &mut Solution<M>) {
        let best = solution.best_value();
        let old = cx.state.best_value;
        let scale = old.abs().max(best.abs());
        let relative = if scale > 0.0 { (old - best).abs() / scale } else { 0.0 };
        if cx.state.last_improving.is_none() || relative >= 1e-4 {
            let it = cx.iteration();
            cx.state.last_improving = Some(it);
            cx.state.last_best = Some(it);
            cx.state.best_value = best;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{NeighbourSearch, NeighbourSelection, NeighbourSelector, SearchConfig};
    use crate::testing::{RestoreCounter, Scripted, ToyModel};
    use std::sync::Arc;

    fn annealing(gen: Arc<Scripted>, config: SaConfig) -> Arc<NeighbourSearch<ToyModel, SimulatedAnnealing>> {
        NeighbourSearch::new(
            SimulatedAnnealing::new(config),
            SearchConfig::default().with_seed(11),
            vec![NeighbourSelector::new(gen, 1.0)],
        )
    }

    #[test]
    fn test_zero_cost_always_accepted() {
        for t in [1e-6, 0.01, 1.0, 100.0] {
            let config = SaConfig::default()
                .with_initial_temperature(t)
                .with_relative_acceptance(true)
                .with_stochastic_hc(false);
            let sa = annealing(Scripted::constant(0.0), config);
            let mut s = ToyModel::filled(vec![0], 3, 1);
            for _ in 0..50 {
                assert_eq!(sa.select_neighbour(&mut s).and_then(|n| n.value()), Some(0.0));
            }
        }
    }

    #[test]
    fn test_training_rejects_worsening_then_calibrates() {
        let config = SaConfig::default().with_training(20, 1e-5);
        let sa = annealing(Scripted::new(vec![2.0; 20], -1.0), config);
        let mut s = ToyModel::filled(vec![0], 3, 1);

        // the 20 worsening samples are rejected; the next iteration
        // calibrates from their mean and accepts -1
        let n = sa.select_neighbour(&mut s).unwrap();
        assert_eq!(n.value(), Some(-1.0));
        assert_eq!(sa.inspect(&mut s, |cx| cx.state.training_count()), Some(20));

        let t = sa.inspect(&mut s, |cx| cx.state.calibration).flatten().unwrap();
        let expected = Temperatures::train(2.0, &SaConfig::default());
        assert!((t.initial - expected.initial).abs() < 1e-12);
        assert!((t.maximal - expected.maximal).abs() < 1e-12);
        assert_eq!(sa.published(), Some(t.initial));
    }

    #[test]
    fn test_cooling_after_temperature_length() {
        let sa = annealing(
            Scripted::new(vec![1e9; 25], 0.0),
            SaConfig::default()
                .with_initial_temperature(1.0)
                .with_temperature_length(10)
                .with_cooling_rate(0.5),
        );
        let mut s = ToyModel::filled(vec![0], 3, 1);
        let _ = sa.select_neighbour(&mut s).unwrap();
        // iterations 11 and 22 cooled the temperature twice
        let t = sa.inspect(&mut s, |cx| cx.state.temperature).unwrap();
        assert!((t - 0.25).abs() < 1e-12, "{t}");
        assert_eq!(sa.published(), Some(0.25));
    }

    #[test]
    fn test_cooling_rate_adjusted_per_thread() {
        let strategy = SimulatedAnnealing::new(
            SaConfig::default()
                .with_initial_temperature(1.0)
                .with_cooling_rate_adjustments(vec![Some(0.5)]),
        );
        let gen = Scripted::constant(0.0);
        let sa = NeighbourSearch::new(strategy.clone(), SearchConfig::default(), vec![NeighbourSelector::new(gen, 1.0)]);
        let mut s = ToyModel::solution(vec![0], 1);
        let _ = sa.select_neighbour(&mut s);
        let rate = sa.inspect(&mut s, |cx| strategy.cooling_rate(cx)).unwrap();
        assert!((rate - 0.475).abs() < 1e-12);
    }

    #[test]
    fn test_follower_without_published_temperature_is_greedy() {
        let sa = annealing(
            Scripted::new(vec![5.0, 5.0, 0.0], 0.0),
            SaConfig::default().with_initial_temperature(1e6),
        );
        let mut follower = ToyModel::filled(vec![0], 3, 2);
        let n = sa.select_neighbour(&mut follower).unwrap();
        assert_eq!(n.value(), Some(0.0));
        assert_eq!(sa.inspect(&mut follower, |cx| cx.iteration()), Some(3));
    }

    #[test]
    fn test_follower_uses_master_temperature() {
        let sa = annealing(Scripted::constant(0.5), SaConfig::default().with_initial_temperature(1e6));
        let mut master = ToyModel::filled(vec![0], 3, 1);
        let mut follower = ToyModel::filled(vec![0], 3, 2);
        assert!(sa.select_neighbour(&mut master).is_some());
        assert_eq!(sa.published(), Some(1e6));
        // with a huge temperature the follower accepts worsening moves
        assert!(sa.select_neighbour(&mut follower).is_some());
        assert!(sa.inspect(&mut follower, |cx| cx.iteration()).unwrap() < 10);
    }

    #[test]
    fn test_restore_when_below_minimal_and_worse() {
        let config = SaConfig::default()
            .with_initial_temperature(1.0)
            .with_minimal_temperature(0.5)
            .with_maximal_temperature(100.0)
            .with_temperature_length(1)
            .with_cooling_rate(0.1);
        let sa = annealing(Scripted::new(vec![1e9; 5], 0.0), config);
        let mut s = ToyModel::filled(vec![0, 0], 0, 1);
        assert!(s.save_best());
        s.assignment_mut().assign(0, 4);
        let _ = sa.select_neighbour(&mut s).unwrap();
        assert_eq!(s.assignment().value(0), Some(&0));
        let reheats = sa.inspect(&mut s, |cx| cx.state.last_reheat).unwrap();
        assert!(reheats > 0);
    }

    /// Solution whose best (value 0) is saved, with `counter` listening.
    fn at_best(targets: Vec<i32>, counter: &Arc<RestoreCounter>) -> Solution<ToyModel> {
        let mut s = ToyModel::filled(targets, 0, 1);
        assert!(s.save_best());
        s.add_listener(counter.clone());
        s
    }

    #[test]
    fn test_absolute_acceptance_measures_against_best() {
        let config = SaConfig::default()
            .with_initial_temperature(1e-9)
            .with_relative_acceptance(false);
        let sa = annealing(Scripted::new(vec![-1.0, -1.0], -9.0), config);
        let restores = Arc::new(RestoreCounter::default());
        let mut s = at_best(vec![0], &restores);
        s.assignment_mut().assign(0, 3);

        // -1 still leaves the total 8 above the best: rejected; -9 reaches it
        let n = sa.select_neighbour(&mut s).unwrap();
        assert_eq!(n.value(), Some(-9.0));
        assert_eq!(sa.inspect(&mut s, |cx| cx.iteration()), Some(3));
        assert_eq!(restores.count(), 0);
        assert_eq!(sa.published(), Some(1e-9));

        // the same moves judged by their own cost are accepted at once
        let sa = annealing(
            Scripted::new(vec![-1.0], -9.0),
            SaConfig::default()
                .with_initial_temperature(1e-9)
                .with_relative_acceptance(true),
        );
        assert_eq!(sa.select_neighbour(&mut s).and_then(|n| n.value()), Some(-1.0));
    }

    #[test]
    fn test_below_minimal_restores_then_reheats() {
        let config = SaConfig::default()
            .with_initial_temperature(1.0)
            .with_minimal_temperature(0.5)
            .with_maximal_temperature(100.0)
            .with_temperature_length(1)
            .with_cooling_rate(0.1)
            .with_reheat_rate(2.0);
        let sa = annealing(Scripted::new(vec![1e9; 5], 0.0), config);
        let restores = Arc::new(RestoreCounter::default());
        let mut s = at_best(vec![0, 0], &restores);
        s.assignment_mut().assign(0, 4);

        // it 2 cools to 0.1; it 3 restores (16 vs 0) and reheats to 0.2;
        // it 4 and 5 reheat without restoring, to 0.4 and 0.8
        let n = sa.select_neighbour(&mut s).unwrap();
        assert_eq!(n.value(), Some(0.0));
        assert_eq!(restores.count(), 1);
        assert_eq!(s.assignment().value(0), Some(&0));
        let t = sa.inspect(&mut s, |cx| cx.state.temperature).unwrap();
        assert!((t - 0.8).abs() < 1e-12, "{t}");
        assert_eq!(sa.published(), Some(t));
        assert_eq!(sa.inspect(&mut s, |cx| cx.state.last_reheat), Some(5));
    }

    #[test]
    fn test_reheat_above_maximal_forces_restore() {
        // the first reheat overshoots the maximal temperature
        let config = SaConfig::default()
            .with_initial_temperature(1.0)
            .with_minimal_temperature(1.2)
            .with_maximal_temperature(1.5)
            .with_temperature_length(1000)
            .with_cooling_rate(0.5)
            .with_reheat_rate(4.0)
            .with_restore_best_length_coef(100.0);
        let sa = annealing(Scripted::new(vec![1e9], 0.0), config);
        let restores = Arc::new(RestoreCounter::default());
        let mut s = at_best(vec![0], &restores);

        let n = sa.select_neighbour(&mut s).unwrap();
        assert_eq!(n.value(), Some(0.0));
        // at the best already: only the maximal-temperature branch restores
        assert_eq!(restores.count(), 1);
        assert_eq!(sa.inspect(&mut s, |cx| cx.state.last_improving), Some(None));
        assert_eq!(sa.inspect(&mut s, |cx| cx.state.last_best), Some(Some(1)));
        assert_eq!(sa.inspect(&mut s, |cx| cx.state.temperature), Some(4.0));
        assert_eq!(sa.published(), Some(4.0));
    }

    #[test]
    fn test_best_saved_marks_improvement() {
        let sa = annealing(Scripted::constant(0.0), SaConfig::default().with_initial_temperature(1.0));
        let mut s = ToyModel::filled(vec![0], 3, 1);
        s.add_listener(sa.clone());
        let _ = sa.select_neighbour(&mut s);
        s.assignment_mut().assign(0, 0);
        assert!(s.save_best());
        assert_eq!(sa.inspect(&mut s, |cx| cx.state.last_improving), Some(Some(1)));
        assert_eq!(sa.inspect(&mut s, |cx| cx.state.best_value), Some(0.0));
    }
}
