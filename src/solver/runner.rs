//! Multi-threaded search loop.
//!
//! [`Solver`] runs one [`Solution`] per thread against a shared
//! [`BestSolution`]: select → assign → update → save best → repeat.

use super::config::SolverConfig;
use crate::model::{Assignment, BestSolution, Model, Solution, SolutionListener};
use crate::properties::Properties;
use crate::registry::Registry;
use crate::search::NeighbourSelection;
use anyhow::Context;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of a solver run.
#[derive(Debug, Clone)]
pub struct SolverResult<T> {
    /// The best assignment found by any thread.
    pub best: Option<Assignment<T>>,

    /// Total value of the best assignment.
    pub best_value: Option<f64>,

    /// Unassigned variables of the best assignment.
    pub unassigned: Option<usize>,

    /// Index of the thread that found the best assignment.
    pub best_index: Option<usize>,

    /// Iterations executed by each thread, in thread order.
    pub iterations: Vec<u64>,

    /// Whether the run was cancelled externally.
    pub cancelled: bool,

    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl<T> SolverResult<T> {
    /// True when the best assignment has every variable assigned.
    pub fn is_complete(&self) -> bool {
        self.unassigned == Some(0)
    }
}

/// Delivers solution events to the top-level selection.
struct Forward<M: Model>(Arc<dyn NeighbourSelection<M>>);

impl<M: Model> SolutionListener<M> for Forward<M> {
    fn solution_updated(&self, solution: &mut Solution<M>) {
        self.0.solution_updated(solution);
    }

    fn best_saved(&self, solution: &mut Solution<M>) {
        self.0.best_saved(solution);
    }

    fn best_cleared(&self, solution: &mut Solution<M>) {
        self.0.best_cleared(solution);
    }

    fn best_restored(&self, solution: &mut Solution<M>) {
        self.0.best_restored(solution);
    }
}

/// Drives a neighbour selection on one or more threads.
///
/// A single thread searches assignment index 0; with more threads they
/// get indices `1..=threads`, so that only the first one is the master.
///
/// Every thread keeps going until its selection is exhausted. Reaching
/// the iteration limit, the time limit or the cancel flag stops all of
/// them.
///
/// # Usage
///
/// ```ignore
/// let registry = Registry::with_defaults();
/// let props = Properties::new()
///     .with("Neighbour.Class", "SimpleSearch")
///     .with("Termination.TimeOut", "10");
/// let result = Solver::from_properties(Arc::new(model), &props, &registry)?.run()?;
/// println!("best: {:?}", result.best_value);
/// ```
pub struct Solver<M: Model> {
    model: Arc<M>,
    selection: Arc<dyn NeighbourSelection<M>>,
    config: SolverConfig,
    initial: Option<Assignment<M::Value>>,
}

impl<M: Model> Solver<M> {
    pub fn new(model: Arc<M>, selection: Arc<dyn NeighbourSelection<M>>, config: SolverConfig) -> Self {
        Self {
            model,
            selection,
            config: config.normalized(),
            initial: None,
        }
    }

    /// Builds the selection named by `Neighbour.Class` (default
    /// `SimpleSearch`) after checking every name the configuration uses.
    pub fn from_properties(model: Arc<M>, props: &Properties, registry: &Registry<M>) -> anyhow::Result<Self> {
        registry.validate(props)?;
        let name = props.get("Neighbour.Class").unwrap_or("SimpleSearch");
        let selection = registry
            .create(name, props)
            .with_context(|| format!("invalid Neighbour.Class '{name}'"))?;
        Ok(Self::new(model, selection, SolverConfig::from_properties(props)))
    }

    /// Starts every thread from the values of `initial`.
    pub fn with_initial(mut self, initial: Assignment<M::Value>) -> Self {
        self.initial = Some(initial);
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn selection(&self) -> &Arc<dyn NeighbourSelection<M>> {
        &self.selection
    }

    /// Runs the search until every thread stops.
    pub fn run(&self) -> anyhow::Result<SolverResult<M::Value>> {
        self.run_with_cancel(None)
    }

    /// Runs the search with an optional cancellation token.
    ///
    /// Once `cancel` is set, every thread stops at its next check and the
    /// best solution found so far is returned.
    pub fn run_with_cancel(&self, cancel: Option<Arc<AtomicBool>>) -> anyhow::Result<SolverResult<M::Value>> {
        self.config.validate().map_err(anyhow::Error::msg)?;
        let started = Instant::now();
        let best = Arc::new(BestSolution::new());
        let stop = Arc::new(AtomicBool::new(false));
        let deadline = self.config.time_limit.map(|limit| started + limit);
        let threads = self.config.threads;

        tracing::info!(
            threads,
            selection = self.selection.name(),
            max_iterations = ?self.config.max_iterations,
            time_limit = ?self.config.time_limit,
            "solver started"
        );

        let run_thread = |index: usize| {
            let mut solution = Solution::new(Arc::clone(&self.model), index)
                .with_best(Arc::clone(&best))
                .with_stop_flag(Arc::clone(&stop));
            if let Some(seed) = self.config.seed {
                solution = solution.with_seed(seed.wrapping_add(index as u64));
            }
            if let Some(deadline) = deadline {
                solution = solution.with_deadline(deadline);
            }
            if let Some(cancel) = &cancel {
                solution = solution.with_cancel_flag(Arc::clone(cancel));
            }
            if let Some(initial) = &self.initial {
                solution = solution.with_initial(initial);
            }
            self.search(solution)
        };

        #[cfg(feature = "parallel")]
        let iterations: Vec<u64> = if threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .context("failed to build the solver thread pool")?;
            pool.install(|| (1..=threads).into_par_iter().map(run_thread).collect())
        } else {
            vec![run_thread(0)]
        };
        #[cfg(not(feature = "parallel"))]
        let iterations: Vec<u64> = if threads > 1 {
            (1..=threads).map(run_thread).collect()
        } else {
            vec![run_thread(0)]
        };

        let cancelled = cancel.is_some_and(|c| c.load(Ordering::Relaxed));
        let snapshot = best.snapshot();
        let result = SolverResult {
            best_value: snapshot.as_ref().map(|s| s.value),
            unassigned: snapshot.as_ref().map(|s| s.nr_unassigned()),
            best_index: snapshot.as_ref().map(|s| s.index()),
            best: snapshot.map(|s| s.assignment),
            iterations,
            cancelled,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            best = ?result.best_value,
            unassigned = ?result.unassigned,
            cancelled,
            elapsed = ?result.elapsed,
            "solver finished"
        );
        Ok(result)
    }

    /// One thread's loop. Returns the number of iterations executed.
    fn search(&self, mut solution: Solution<M>) -> u64 {
        solution.add_listener(Arc::new(Forward(Arc::clone(&self.selection))));
        if self.initial.is_some() {
            solution.update();
            solution.save_best();
        }
        while !solution.is_stopped() {
            let Some(neighbour) = self.selection.select_neighbour(&mut solution) else {
                tracing::debug!(thread = solution.index(), "{} exhausted", self.selection.name());
                break;
            };
            neighbour.assign(&mut solution);
            solution.inc_iteration();
            solution.update();
            if solution.is_better_than_best() && solution.save_best() {
                tracing::trace!(
                    thread = solution.index(),
                    iter = solution.iteration(),
                    value = solution.total_value(),
                    unassigned = solution.nr_unassigned(),
                    "new best"
                );
            }
            if self
                .config
                .max_iterations
                .is_some_and(|max| solution.iteration() >= max)
            {
                tracing::debug!(thread = solution.index(), "iteration limit reached");
                solution.stop();
            }
        }
        solution.iteration()
    }
}
