//! Hill climbing acceptance strategies.

use super::config::{CounterMode, HillClimberConfig, StepCountingConfig};
use crate::model::{Model, Solution};
use crate::properties::adjusted;
use crate::search::{resulting_total, AcceptanceStrategy, Role, SearchContext, EPSILON};

/// Idle bookkeeping of a hill climber.
#[derive(Debug, Clone, Default)]
pub struct HillClimberState {
    /// Iteration of the last strictly improving accepted move.
    pub last_improving: u64,
}

/// Accepts only non-worsening moves; stops after `max_idle` iterations
/// without a strict improvement.
#[derive(Debug, Clone)]
pub struct HillClimber {
    config: HillClimberConfig,
    name: String,
}

impl HillClimber {
    pub fn new(config: HillClimberConfig) -> Self {
        Self::named(config, "Hill Climbing")
    }

    /// Hill climber announcing itself under `name`.
    pub fn named(config: HillClimberConfig, name: impl Into<String>) -> Self {
        Self {
            config: config.normalized(),
            name: name.into(),
        }
    }

    pub fn config(&self) -> &HillClimberConfig {
        &self.config
    }

    fn idle_budget_left(&self, cx_iteration: u64, state: &HillClimberState) -> bool {
        cx_iteration.saturating_sub(state.last_improving) < self.config.max_idle
    }

    fn update_progress<C>(&self, cx: &mut SearchContext<C>, state_last: u64) {
        let idle = cx.iteration().saturating_sub(state_last);
        cx.set_progress(idle as f64 / self.config.max_idle as f64);
    }

    fn accept_value(&self, state: &mut HillClimberState, iteration: u64, value: f64) -> bool {
        if value > 0.0 {
            return false;
        }
        if value < -EPSILON {
            state.last_improving = iteration;
        }
        true
    }
}

impl<M: Model> AcceptanceStrategy<M> for HillClimber {
    type Context = HillClimberState;

    fn name(&self) -> &str {
        &self.name
    }

    fn create_context(&self, _solution: &Solution<M>, _role: Role) -> HillClimberState {
        HillClimberState::default()
    }

    fn activate(&self, cx: &mut SearchContext<HillClimberState>, _solution: &mut Solution<M>) {
        cx.state.last_improving = 0;
    }

    fn inc_iteration(&self, cx: &mut SearchContext<HillClimberState>, _solution: &mut Solution<M>) {
        let last = cx.state.last_improving;
        self.update_progress(cx, last);
    }

    fn can_continue(&self, cx: &SearchContext<HillClimberState>, _solution: &Solution<M>) -> bool {
        self.idle_budget_left(cx.iteration(), &cx.state)
    }

    fn accept(
        &self,
        cx: &mut SearchContext<HillClimberState>,
        _solution: &Solution<M>,
        value: f64,
        _lazy: bool,
    ) -> bool {
        let iteration = cx.iteration();
        self.accept_value(&mut cx.state, iteration, value)
    }

    fn hill_climbing(&self) -> bool {
        self.config.hc_mode
    }
}

/// Per-thread state of the step-counting hill climber.
#[derive(Debug, Clone, Default)]
pub struct StepCountingState {
    pub climber: HillClimberState,
    /// Acceptance threshold: the total value at the last counter reset.
    pub bound: f64,
    /// Moves counted since the last reset.
    pub counter: u64,
}

/// Hill climber that also accepts any move leaving the total below a
/// bound, resetting the bound to the current total every `counter_limit`
/// counted moves.
///
/// The bound and counter belong to the thread's own assignment; the limit
/// may be scaled per thread.
///
/// # References
///
/// Bykov & Petrovic (2016), "A Step Counting Hill Climbing Algorithm
/// applied to University Examination Timetabling"
#[derive(Debug, Clone)]
pub struct StepCountingHillClimber {
    climber: HillClimber,
    config: StepCountingConfig,
}

impl StepCountingHillClimber {
    pub fn new(config: StepCountingConfig) -> Self {
        Self::named(config, "Step Counting Hill Climbing")
    }

    pub fn named(config: StepCountingConfig, name: impl Into<String>) -> Self {
        let config = config.normalized();
        Self {
            climber: HillClimber::named(config.hill_climber.clone(), name),
            config,
        }
    }

    pub fn config(&self) -> &StepCountingConfig {
        &self.config
    }

    /// Counter limit of the thread behind `cx`.
    pub fn counter_limit<C>(&self, cx: &SearchContext<C>) -> u64 {
        let limit = adjusted(
            self.config.counter_limit as f64,
            self.config.counter_limit_adjustments.as_deref(),
            cx.adjustment_slot(),
        );
        (limit.round() as u64).max(1)
    }
}

impl<M: Model> AcceptanceStrategy<M> for StepCountingHillClimber {
    type Context = StepCountingState;

    fn name(&self) -> &str {
        &self.climber.name
    }

    fn create_context(&self, _solution: &Solution<M>, _role: Role) -> StepCountingState {
        StepCountingState::default()
    }

    fn activate(&self, cx: &mut SearchContext<StepCountingState>, solution: &mut Solution<M>) {
        cx.state.climber.last_improving = 0;
        cx.state.bound = solution.total_value();
        cx.state.counter = 0;
    }

    fn inc_iteration(&self, cx: &mut SearchContext<StepCountingState>, solution: &mut Solution<M>) {
        if cx.state.counter >= self.counter_limit(cx) {
            cx.state.bound = solution.total_value();
            cx.state.counter = 0;
            tracing::trace!(thread = cx.index(), bound = cx.state.bound, "step counter reset");
        }
        if self.config.counter_mode == CounterMode::All {
            cx.state.counter += 1;
        }
        let last = cx.state.climber.last_improving;
        self.climber.update_progress(cx, last);
    }

    fn can_continue(&self, cx: &SearchContext<StepCountingState>, solution: &Solution<M>) -> bool {
        self.climber.idle_budget_left(cx.iteration(), &cx.state.climber)
            || cx.state.counter < self.counter_limit(cx)
            || solution.total_value() < cx.state.bound
    }

    fn accept(
        &self,
        cx: &mut SearchContext<StepCountingState>,
        solution: &Solution<M>,
        value: f64,
        lazy: bool,
    ) -> bool {
        let iteration = cx.iteration();
        let accepted = self.climber.accept_value(&mut cx.state.climber, iteration, value)
            || resulting_total(solution, value, lazy) < cx.state.bound;
        let counted = match self.config.counter_mode {
            CounterMode::All => false,
            CounterMode::Accepted => accepted,
            CounterMode::Improving => accepted && value < -EPSILON,
        };
        if counted {
            cx.state.counter += 1;
        }
        accepted
    }

    fn hill_climbing(&self) -> bool {
        false
    }
}
