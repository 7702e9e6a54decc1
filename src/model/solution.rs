//! Per-thread solution: working assignment plus the shared best snapshot.

use super::assignment::Assignment;
use super::best::BestSolution;
use super::context::{ContextKey, ContextStore};
use super::types::Model;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Receives solution events.
///
/// Every method has a no-op default. Listeners get the solution mutably so
/// that they can update the search contexts stored inside it.
pub trait SolutionListener<M: Model>: Send + Sync {
    /// The working assignment changed (a neighbour was applied).
    fn solution_updated(&self, _solution: &mut Solution<M>) {}

    /// This thread installed a new best solution.
    fn best_saved(&self, _solution: &mut Solution<M>) {}

    /// The best solution was forgotten.
    fn best_cleared(&self, _solution: &mut Solution<M>) {}

    /// The best solution was copied back into this thread's assignment.
    fn best_restored(&self, _solution: &mut Solution<M>) {}
}

/// One search thread's view of the problem.
///
/// Owns the working assignment (identified by its thread index), the
/// iteration counter, the thread's RNG, and the search contexts of every
/// component that runs on this thread. The best solution and the stop flag
/// are shared with the other threads.
pub struct Solution<M: Model> {
    model: Arc<M>,
    assignment: Assignment<M::Value>,
    iteration: u64,
    started: Instant,
    best: Arc<BestSolution<M::Value>>,
    stop: Arc<AtomicBool>,
    cancel: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
    rng: StdRng,
    contexts: ContextStore,
    listeners: Vec<Arc<dyn SolutionListener<M>>>,
}

impl<M: Model> Solution<M> {
    /// Creates a solution with an empty assignment for thread `index`.
    pub fn new(model: Arc<M>, index: usize) -> Self {
        let assignment = Assignment::new(index, model.nr_variables());
        Self {
            model,
            assignment,
            iteration: 0,
            started: Instant::now(),
            best: Arc::new(BestSolution::new()),
            stop: Arc::new(AtomicBool::new(false)),
            cancel: None,
            deadline: None,
            rng: StdRng::from_rng(&mut rand::rng()),
            contexts: ContextStore::default(),
            listeners: Vec::new(),
        }
    }

    /// Shares the best snapshot with other threads.
    pub fn with_best(mut self, best: Arc<BestSolution<M::Value>>) -> Self {
        self.best = best;
        self
    }

    /// Shares the cooperative stop flag with other threads.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Treats the solution as stopped once the external `cancel` flag is set.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Treats the solution as stopped once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Starts from the values of `initial` (the thread index is kept).
    pub fn with_initial(mut self, initial: &Assignment<M::Value>) -> Self {
        self.assignment.copy_values_from(initial);
        self
    }

    pub fn model(&self) -> &Arc<M> {
        &self.model
    }

    pub fn assignment(&self) -> &Assignment<M::Value> {
        &self.assignment
    }

    pub fn assignment_mut(&mut self) -> &mut Assignment<M::Value> {
        &mut self.assignment
    }

    /// Thread index of the working assignment.
    pub fn index(&self) -> usize {
        self.assignment.index()
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn inc_iteration(&mut self) {
        self.iteration += 1;
    }

    /// Time since this solution was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Total value of the working assignment.
    pub fn total_value(&self) -> f64 {
        self.model.total_value(&self.assignment)
    }

    pub fn nr_unassigned(&self) -> usize {
        self.assignment.nr_unassigned()
    }

    pub fn is_complete(&self) -> bool {
        self.assignment.is_complete()
    }

    pub fn best(&self) -> &Arc<BestSolution<M::Value>> {
        &self.best
    }

    /// Best value ever saved, or the current value when nothing is saved yet.
    pub fn best_value(&self) -> f64 {
        self.best.value().unwrap_or_else(|| self.total_value())
    }

    /// Unassigned variables of the best solution, if one was saved.
    pub fn best_unassigned(&self) -> Option<usize> {
        self.best.nr_unassigned()
    }

    pub fn is_best_complete(&self) -> bool {
        self.best.nr_unassigned() == Some(0)
    }

    /// True if the working assignment would replace the best solution.
    pub fn is_better_than_best(&self) -> bool {
        self.best
            .is_improvement(self.assignment.nr_unassigned(), self.total_value())
    }

    /// Saves the working assignment as the best one if it is strictly
    /// better, notifying listeners. Returns `true` when saved.
    pub fn save_best(&mut self) -> bool {
        let value = self.total_value();
        if !self.best.try_install(&self.assignment, value, self.iteration) {
            return false;
        }
        self.notify(|l, s| l.best_saved(s));
        true
    }

    /// Copies the best solution into the working assignment.
    /// Returns `false` when nothing was saved yet.
    pub fn restore_best(&mut self) -> bool {
        let restored = self
            .best
            .with_snapshot(|best| self.assignment.copy_values_from(&best.assignment))
            .is_some();
        if restored {
            self.notify(|l, s| l.best_restored(s));
        }
        restored
    }

    pub fn clear_best(&mut self) {
        self.best.clear();
        self.notify(|l, s| l.best_cleared(s));
    }

    /// Announces that the working assignment changed.
    pub fn update(&mut self) {
        self.notify(|l, s| l.solution_updated(s));
    }

    /// Requests all threads sharing the stop flag to stop.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
            || self.cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed))
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn add_listener(&mut self, listener: Arc<dyn SolutionListener<M>>) {
        self.listeners.push(listener);
    }

    fn notify(&mut self, event: impl Fn(&dyn SolutionListener<M>, &mut Solution<M>)) {
        let listeners = std::mem::take(&mut self.listeners);
        for listener in &listeners {
            event(listener.as_ref(), self);
        }
        let added = std::mem::replace(&mut self.listeners, listeners);
        self.listeners.extend(added);
    }

    /// Removes the context stored under `key`, if any.
    ///
    /// Search components take their context out for the duration of a call
    /// and put it back afterwards, so the solution stays freely borrowable
    /// in between. Events delivered while a context is taken do not see it.
    pub fn take_context<C: Any + Send>(&mut self, key: ContextKey) -> Option<Box<C>> {
        self.contexts.take(key)
    }

    pub fn put_context<C: Any + Send>(&mut self, key: ContextKey, context: Box<C>) {
        self.contexts.put(key, context);
    }

    pub fn context_mut<C: Any + Send>(&mut self, key: ContextKey) -> Option<&mut C> {
        self.contexts.get_mut(key)
    }
}
