//! Master role and the published control parameter.

use std::sync::atomic::{AtomicU64, Ordering};

/// Whether a search thread may advance shared control parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Cools, reheats, resets bounds and publishes the result.
    Master,
    /// Reads the last published control value for its own decisions.
    Follower,
}

impl Role {
    /// Master role of the assignment with the given thread index.
    ///
    /// With isolated contexts every thread drives its own parameters;
    /// otherwise only index 0 or 1 does.
    pub fn of(index: usize, isolated: bool) -> Self {
        if isolated || index <= 1 {
            Role::Master
        } else {
            Role::Follower
        }
    }
}

/// Single-writer `f64` cell shared between search threads.
///
/// Holds the bits in an `AtomicU64`; `NaN` means nothing was published.
/// Followers may observe a value that is a few master iterations old.
#[derive(Debug)]
pub struct ControlCell(AtomicU64);

impl Default for ControlCell {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlCell {
    pub fn new() -> Self {
        ControlCell(AtomicU64::new(f64::NAN.to_bits()))
    }

    pub fn get(&self) -> Option<f64> {
        let v = f64::from_bits(self.0.load(Ordering::Relaxed));
        (!v.is_nan()).then_some(v)
    }

    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.0.store(f64::NAN.to_bits(), Ordering::Relaxed);
    }
}
