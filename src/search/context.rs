//! Per-thread search context shared by all acceptance strategies.

use super::control::{ControlCell, Role};
use super::selector::SegmentStats;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Mutable search state of one thread.
///
/// Holds what every strategy needs (iteration counter, activation time,
/// role, RNG, progress) plus the strategy-specific `state`.
pub struct SearchContext<C> {
    iteration: u64,
    started: Option<Instant>,
    role: Role,
    index: usize,
    rng: StdRng,
    control: Arc<ControlCell>,
    progress: f64,
    pub(crate) last_selector: Option<usize>,
    pub(crate) segment: Vec<SegmentStats>,
    /// Strategy-specific state.
    pub state: C,
}

impl<C> SearchContext<C> {
    pub(crate) fn new(
        index: usize,
        role: Role,
        rng: StdRng,
        control: Arc<ControlCell>,
        nr_selectors: usize,
        state: C,
    ) -> Self {
        Self {
            iteration: 0,
            started: None,
            role,
            index,
            rng,
            control,
            progress: 0.0,
            last_selector: None,
            segment: vec![SegmentStats::default(); nr_selectors],
            state,
        }
    }

    /// Iterations since activation.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub(crate) fn inc_iteration(&mut self) {
        self.iteration += 1;
    }

    pub fn is_active(&self) -> bool {
        self.started.is_some()
    }

    pub(crate) fn activate(&mut self) {
        self.started = Some(Instant::now());
        self.iteration = 0;
        self.progress = 0.0;
    }

    pub(crate) fn deactivate(&mut self) {
        self.started = None;
    }

    /// Restarts the clock and iteration counter without deactivating.
    pub fn restart_clock(&mut self) {
        self.started = Some(Instant::now());
        self.iteration = 0;
    }

    /// Time since activation.
    pub fn elapsed(&self) -> Duration {
        self.started.map(|t| t.elapsed()).unwrap_or_default()
    }

    /// Iterations per second since activation.
    pub fn speed(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.iteration as f64 / secs
        } else {
            0.0
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_master(&self) -> bool {
        self.role == Role::Master
    }

    /// Thread index of the assignment this context belongs to.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Zero-based slot into per-thread adjustment tables (`index - 1`).
    pub fn adjustment_slot(&self) -> Option<usize> {
        self.index.checked_sub(1)
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Last control value published by the master.
    pub fn published(&self) -> Option<f64> {
        self.control.get()
    }

    /// Publishes a control value; ignored unless this thread is master.
    pub fn publish(&self, value: f64) {
        if self.is_master() {
            self.control.set(value);
        }
    }

    /// Search progress in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn set_progress(&mut self, progress: f64) {
        self.progress = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }
}
