//! The shared generate/accept loop.
//!
//! [`NeighbourSearch`] owns a list of weighted move generators and an
//! [`AcceptanceStrategy`]. Each call to `select_neighbour` runs the loop
//!
//! 1. activate the thread's context if inactive,
//! 2. while the strategy can continue and no stop was requested:
//!    advance the iteration, pick a generator by roulette, and
//!    - return lazy neighbours at once (this search becomes their
//!      acceptance criterion),
//!    - return eager neighbours the strategy accepts,
//! 3. deactivate (master only) and return `None`.

use super::config::SearchConfig;
use super::context::SearchContext;
use super::control::{ControlCell, Role};
use super::selection::NeighbourSelection;
use super::selector::{roulette_select, NeighbourSelector, SCORE_ACCEPTED, SCORE_IMPROVED};
use super::EPSILON;
use crate::model::{ContextKey, LazyAcceptance, Model, Neighbour, Solution, SolutionListener};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Weak};

/// Acceptance policy plugged into [`NeighbourSearch`].
///
/// A strategy only decides whether to accept, whether to continue, and how
/// its control parameters evolve per iteration. Its per-thread state is
/// `Context`, stored inside the generic [`SearchContext`].
pub trait AcceptanceStrategy<M: Model>: Send + Sync + 'static {
    type Context: Send + 'static;

    /// Phase name used in logs, e.g. `"Hill Climber"`.
    fn name(&self) -> &str;

    /// Fresh per-thread state.
    fn create_context(&self, solution: &Solution<M>, role: Role) -> Self::Context;

    /// Called when the search (re)starts on this thread.
    fn activate(&self, _cx: &mut SearchContext<Self::Context>, _solution: &mut Solution<M>) {}

    /// Called when the loop ends on a master thread.
    fn deactivate(&self, _cx: &mut SearchContext<Self::Context>, _solution: &mut Solution<M>) {}

    /// Advances control parameters; called once per iteration before a
    /// move is generated.
    fn inc_iteration(&self, _cx: &mut SearchContext<Self::Context>, _solution: &mut Solution<M>) {}

    fn can_continue(&self, _cx: &SearchContext<Self::Context>, _solution: &Solution<M>) -> bool {
        true
    }

    /// Decides on a move of marginal cost `value`.
    ///
    /// When `lazy` is true the move is already applied to the assignment.
    fn accept(
        &self,
        cx: &mut SearchContext<Self::Context>,
        solution: &Solution<M>,
        value: f64,
        lazy: bool,
    ) -> bool;

    fn best_saved(&self, _cx: &mut SearchContext<Self::Context>, _solution: &mut Solution<M>) {}

    fn best_cleared(&self, _cx: &mut SearchContext<Self::Context>, _solution: &mut Solution<M>) {}

    fn best_restored(&self, _cx: &mut SearchContext<Self::Context>, _solution: &mut Solution<M>) {}

    /// Whether hill-climb aware generators should only propose
    /// non-worsening moves.
    fn hill_climbing(&self) -> bool {
        false
    }
}

/// Total value of the assignment once a move of cost `value` is in place.
pub fn resulting_total<M: Model>(solution: &Solution<M>, value: f64, lazy: bool) -> f64 {
    if lazy {
        solution.total_value()
    } else {
        solution.total_value() + value
    }
}

/// Generic neighbourhood search driven by an acceptance strategy.
pub struct NeighbourSearch<M: Model, S: AcceptanceStrategy<M>> {
    strategy: S,
    config: SearchConfig,
    selectors: Vec<NeighbourSelector<M>>,
    key: ContextKey,
    control: Arc<ControlCell>,
    me: Weak<Self>,
}

impl<M: Model, S: AcceptanceStrategy<M>> NeighbourSearch<M, S> {
    pub fn new(strategy: S, config: SearchConfig, selectors: Vec<NeighbourSelector<M>>) -> Arc<Self> {
        if selectors.is_empty() {
            tracing::warn!("{}: no neighbour selectors configured", strategy.name());
        }
        if strategy.hill_climbing() {
            for selector in &selectors {
                if let Some(hc) = selector.selection().hill_climber_selection() {
                    hc.set_hc_mode(true);
                }
            }
        }
        Arc::new_cyclic(|me| Self {
            strategy,
            config,
            selectors,
            key: ContextKey::next(),
            control: Arc::new(ControlCell::new()),
            me: me.clone(),
        })
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn selectors(&self) -> &[NeighbourSelector<M>] {
        &self.selectors
    }

    /// Control parameter published by the master thread.
    pub fn published(&self) -> Option<f64> {
        self.control.get()
    }

    /// Reads this search's context on the given solution, if it exists.
    pub fn inspect<R>(
        &self,
        solution: &mut Solution<M>,
        f: impl FnOnce(&SearchContext<S::Context>) -> R,
    ) -> Option<R> {
        solution
            .context_mut::<SearchContext<S::Context>>(self.key)
            .map(|cx| f(cx))
    }

    /// Runs `f` with this search's context taken out of the solution,
    /// creating the context on first use.
    pub(crate) fn with_context<R>(
        &self,
        solution: &mut Solution<M>,
        f: impl FnOnce(&mut SearchContext<S::Context>, &mut Solution<M>) -> R,
    ) -> R {
        let mut cx = match solution.take_context::<SearchContext<S::Context>>(self.key) {
            Some(cx) => cx,
            None => Box::new(self.create_context(solution)),
        };
        let result = f(&mut cx, solution);
        solution.put_context(self.key, cx);
        result
    }

    /// Event delivery; skipped when the context does not exist yet or is
    /// currently taken.
    fn on_context(
        &self,
        solution: &mut Solution<M>,
        f: impl FnOnce(&mut SearchContext<S::Context>, &mut Solution<M>),
    ) {
        if let Some(mut cx) = solution.take_context::<SearchContext<S::Context>>(self.key) {
            f(&mut cx, solution);
            solution.put_context(self.key, cx);
        }
    }

    fn create_context(&self, solution: &mut Solution<M>) -> SearchContext<S::Context> {
        let index = solution.index();
        let role = Role::of(index, self.config.isolated_contexts);
        let rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::from_rng(solution.rng()),
        };
        let state = self.strategy.create_context(solution, role);
        SearchContext::new(
            index,
            role,
            rng,
            Arc::clone(&self.control),
            self.selectors.len(),
            state,
        )
    }

    fn activate(&self, cx: &mut SearchContext<S::Context>, solution: &mut Solution<M>) {
        cx.activate();
        tracing::info!(
            thread = cx.index(),
            master = cx.is_master(),
            "{}...",
            self.strategy.name()
        );
        self.strategy.activate(cx, solution);
    }

    fn deactivate(&self, cx: &mut SearchContext<S::Context>, solution: &mut Solution<M>) {
        self.strategy.deactivate(cx, solution);
        cx.deactivate();
    }

    fn next_selector(&self, cx: &mut SearchContext<S::Context>) -> Option<usize> {
        if self.selectors.is_empty() {
            return None;
        }
        if self.config.random_selection {
            let n = self.selectors.len();
            return Some(cx.rng().random_range(0..n));
        }
        let weights: Vec<f64> = self
            .selectors
            .iter()
            .map(|s| s.weight(self.config.adaptive_points))
            .collect();
        roulette_select(&weights, cx.rng())
    }

    fn record(&self, cx: &mut SearchContext<S::Context>, selector: usize, value: f64, accepted: bool) {
        if !self.config.adaptive_points {
            return;
        }
        let score = match (accepted, value < -EPSILON) {
            (false, _) => 0.0,
            (true, true) => SCORE_IMPROVED,
            (true, false) => SCORE_ACCEPTED,
        };
        let bonus = self.selectors[selector].bonus();
        if let Some(stats) = cx.segment.get_mut(selector) {
            stats.record(score * bonus);
        }
    }

    fn end_segment(&self, cx: &mut SearchContext<S::Context>) {
        if !self.config.adaptive_points || cx.iteration() % self.config.update_segment != 0 {
            return;
        }
        if cx.is_master() {
            for (selector, stats) in self.selectors.iter().zip(&cx.segment) {
                selector.update_points(stats, self.config.reaction_factor, self.config.min_points_ratio);
            }
            tracing::debug!(
                thread = cx.index(),
                points = ?self.selectors.iter().map(|s| s.points()).collect::<Vec<_>>(),
                "{}: selector points updated",
                self.strategy.name()
            );
        }
        for stats in &mut cx.segment {
            *stats = Default::default();
        }
    }

    fn log_progress(&self, cx: &SearchContext<S::Context>, solution: &Solution<M>) {
        if cx.iteration() % self.config.log_interval != 0 {
            return;
        }
        tracing::debug!(
            thread = cx.index(),
            iter = cx.iteration(),
            speed = cx.speed(),
            value = solution.total_value(),
            best = solution.best_value(),
            progress = cx.progress(),
            "{}",
            self.strategy.name()
        );
    }

    fn search(&self, cx: &mut SearchContext<S::Context>, solution: &mut Solution<M>) -> Option<Neighbour<M>> {
        if !cx.is_active() {
            self.activate(cx, solution);
        }
        while self.strategy.can_continue(cx, solution) {
            if solution.is_stopped() {
                return None;
            }
            cx.inc_iteration();
            self.strategy.inc_iteration(cx, solution);
            self.end_segment(cx);
            self.log_progress(cx, solution);

            let Some(idx) = self.next_selector(cx) else {
                break;
            };
            let selection = Arc::clone(self.selectors[idx].selection());
            match selection.select_neighbour(solution) {
                None => self.record(cx, idx, 0.0, false),
                Some(mut n) if n.is_lazy() => {
                    if let Some(me) = self.me.upgrade() {
                        n.set_acceptance(me);
                    }
                    cx.last_selector = Some(idx);
                    return Some(n);
                }
                Some(n) => {
                    let value = n.value().unwrap_or(0.0);
                    let accepted = self.strategy.accept(cx, solution, value, false);
                    self.record(cx, idx, value, accepted);
                    if accepted {
                        return Some(n);
                    }
                }
            }
        }
        if cx.is_master() {
            self.deactivate(cx, solution);
        }
        None
    }
}

impl<M: Model, S: AcceptanceStrategy<M>> LazyAcceptance<M> for NeighbourSearch<M, S> {
    fn accept(&self, solution: &mut Solution<M>, value: f64) -> bool {
        self.with_context(solution, |cx, solution| {
            let accepted = self.strategy.accept(cx, solution, value, true);
            if let Some(idx) = cx.last_selector.take() {
                self.record(cx, idx, value, accepted);
            }
            accepted
        })
    }
}

impl<M: Model, S: AcceptanceStrategy<M>> SolutionListener<M> for NeighbourSearch<M, S> {
    fn solution_updated(&self, solution: &mut Solution<M>) {
        for selector in &self.selectors {
            selector.selection().solution_updated(solution);
        }
    }

    fn best_saved(&self, solution: &mut Solution<M>) {
        self.on_context(solution, |cx, solution| self.strategy.best_saved(cx, solution));
        for selector in &self.selectors {
            selector.selection().best_saved(solution);
        }
    }

    fn best_cleared(&self, solution: &mut Solution<M>) {
        self.on_context(solution, |cx, solution| self.strategy.best_cleared(cx, solution));
        for selector in &self.selectors {
            selector.selection().best_cleared(solution);
        }
    }

    fn best_restored(&self, solution: &mut Solution<M>) {
        self.on_context(solution, |cx, solution| self.strategy.best_restored(cx, solution));
        for selector in &self.selectors {
            selector.selection().best_restored(solution);
        }
    }
}

impl<M: Model, S: AcceptanceStrategy<M>> NeighbourSelection<M> for NeighbourSearch<M, S> {
    fn name(&self) -> &str {
        self.strategy.name()
    }

    fn select_neighbour(&self, solution: &mut Solution<M>) -> Option<Neighbour<M>> {
        self.with_context(solution, |cx, solution| self.search(cx, solution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LazySimpleNeighbour;
    use crate::testing::{Scripted, ToyModel};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Accepts every non-worsening move for a fixed number of iterations.
    struct Budget(u64);

    impl AcceptanceStrategy<ToyModel> for Budget {
        type Context = ();

        fn name(&self) -> &str {
            "Budget"
        }

        fn create_context(&self, _: &Solution<ToyModel>, _: Role) {}

        fn can_continue(&self, cx: &SearchContext<()>, _: &Solution<ToyModel>) -> bool {
            cx.iteration() < self.0
        }

        fn accept(&self, _: &mut SearchContext<()>, _: &Solution<ToyModel>, value: f64, _: bool) -> bool {
            value <= 0.0
        }
    }

    /// Always proposes one lazy move setting variable 0 to `value`.
    struct LazyGen(i32, AtomicUsize);

    impl SolutionListener<ToyModel> for LazyGen {}

    impl NeighbourSelection<ToyModel> for LazyGen {
        fn name(&self) -> &str {
            "LazyGen"
        }

        fn select_neighbour(&self, _: &mut Solution<ToyModel>) -> Option<Neighbour<ToyModel>> {
            self.1.fetch_add(1, Ordering::Relaxed);
            Some(Neighbour::lazy(LazySimpleNeighbour::new(0, Some(self.0))))
        }
    }

    fn search(gen: Arc<dyn NeighbourSelection<ToyModel>>, budget: u64) -> Arc<NeighbourSearch<ToyModel, Budget>> {
        NeighbourSearch::new(
            Budget(budget),
            SearchConfig::default(),
            vec![NeighbourSelector::new(gen, 1.0)],
        )
    }

    #[test]
    fn test_rejects_until_budget_exhausted() {
        let gen = Scripted::constant(1.0);
        let ns = search(gen.clone(), 10);
        let mut s = ToyModel::solution(vec![0], 1);
        assert!(ns.select_neighbour(&mut s).is_none());
        assert_eq!(gen.calls(), 10);
        // master deactivated: next call starts a new run
        assert_eq!(ns.inspect(&mut s, |cx| cx.is_active()), Some(false));
    }

    #[test]
    fn test_returns_accepted_move() {
        let gen = Scripted::new(vec![3.0, 2.0, -1.0], 1.0);
        let ns = search(gen.clone(), 100);
        let mut s = ToyModel::solution(vec![0], 1);
        let n = ns.select_neighbour(&mut s).unwrap();
        assert_eq!(n.value(), Some(-1.0));
        assert_eq!(ns.inspect(&mut s, |cx| cx.iteration()), Some(3));
    }

    #[test]
    fn test_follower_stays_active() {
        let ns = search(Scripted::constant(1.0), 5);
        let mut s = ToyModel::solution(vec![0], 2);
        assert!(ns.select_neighbour(&mut s).is_none());
        assert_eq!(ns.inspect(&mut s, |cx| cx.is_active()), Some(true));
        assert_eq!(ns.inspect(&mut s, |cx| cx.role()), Some(Role::Follower));
    }

    #[test]
    fn test_stop_flag_ends_search() {
        let gen = Scripted::constant(1.0);
        let ns = search(gen.clone(), 1000);
        let mut s = ToyModel::solution(vec![0], 1);
        s.stop();
        assert!(ns.select_neighbour(&mut s).is_none());
        assert_eq!(gen.calls(), 0);
    }

    #[test]
    fn test_lazy_move_uses_search_as_criterion() {
        let mut s = ToyModel::filled(vec![5], 5, 1);

        // worsening lazy move: rejected by the search and undone
        let ns = search(Arc::new(LazyGen(9, AtomicUsize::new(0))), 10);
        let n = ns.select_neighbour(&mut s).unwrap();
        assert!(n.is_lazy());
        assert!(!n.assign(&mut s));
        assert_eq!(s.assignment().value(0), Some(&5));

        // neutral lazy move: accepted
        let ns = search(Arc::new(LazyGen(5, AtomicUsize::new(0))), 10);
        let n = ns.select_neighbour(&mut s).unwrap();
        assert!(n.assign(&mut s));
    }

    #[test]
    fn test_no_selectors_returns_none() {
        let ns: Arc<NeighbourSearch<ToyModel, Budget>> =
            NeighbourSearch::new(Budget(10), SearchConfig::default(), Vec::new());
        let mut s = ToyModel::solution(vec![0], 1);
        assert!(ns.select_neighbour(&mut s).is_none());
    }

    #[test]
    fn test_adaptive_points_reward_success() {
        let good = Scripted::constant(-1.0);
        let bad = Scripted::constant(1.0);
        let ns = NeighbourSearch::new(
            Budget(1000),
            SearchConfig::default()
                .with_adaptive_points(true)
                .with_update_segment(10)
                .with_reaction_factor(0.5)
                .with_seed(3),
            vec![
                NeighbourSelector::new(good, 1.0),
                NeighbourSelector::new(bad, 1.0),
            ],
        );
        let mut s = ToyModel::solution(vec![0], 1);
        for _ in 0..200 {
            let _ = ns.select_neighbour(&mut s);
        }
        let points: Vec<f64> = ns.selectors().iter().map(|s| s.points()).collect();
        assert!(points[0] > points[1], "{points:?}");
        assert!(points[1] >= 0.1 - 1e-12);
    }

    #[test]
    fn test_random_selection_uses_every_selector() {
        let a = Scripted::constant(1.0);
        let b = Scripted::constant(1.0);
        let ns = NeighbourSearch::new(
            Budget(200),
            SearchConfig::default().with_random_selection(true).with_seed(1),
            vec![
                NeighbourSelector::new(a.clone(), 0.0),
                NeighbourSelector::new(b.clone(), 100.0),
            ],
        );
        let mut s = ToyModel::solution(vec![0], 1);
        assert!(ns.select_neighbour(&mut s).is_none());
        assert!(a.calls() > 50 && b.calls() > 50);
    }
}
