//! Solver configuration.

use crate::properties::Properties;
use std::time::Duration;

/// Configuration for [`Solver`](super::Solver).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use u_localsearch::solver::SolverConfig;
///
/// let config = SolverConfig::default()
///     .with_threads(4)
///     .with_time_limit(Duration::from_secs(30))
///     .with_seed(42);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolverConfig {
    /// Number of search threads (`Parallel.NrSolvers`).
    pub threads: usize,

    /// Iteration limit of each thread (`Termination.MaxIters`).
    pub max_iterations: Option<u64>,

    /// Wall-clock limit of the run (`Termination.TimeOut`, seconds).
    pub time_limit: Option<Duration>,

    /// Base seed; thread `i` uses `seed + i` (`General.Seed`).
    pub seed: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            max_iterations: None,
            time_limit: None,
            seed: None,
        }
    }
}

impl SolverConfig {
    /// Reads `Parallel.NrSolvers`, `Termination.MaxIters`,
    /// `Termination.TimeOut` and `General.Seed`. Negative limits mean none.
    pub fn from_properties(props: &Properties) -> Self {
        let max_iterations = props.get_f64("Termination.MaxIters", -1.0);
        let time_out = props.get_f64("Termination.TimeOut", -1.0);
        Self {
            threads: props.get_usize("Parallel.NrSolvers", 1),
            max_iterations: (max_iterations >= 0.0).then_some(max_iterations as u64),
            time_limit: (time_out > 0.0).then(|| Duration::from_secs_f64(time_out)),
            seed: props.get("General.Seed").and_then(|s| s.parse().ok()),
        }
        .normalized()
    }

    pub fn with_threads(mut self, n: usize) -> Self {
        self.threads = n;
        self
    }

    pub fn with_max_iterations(mut self, n: u64) -> Self {
        self.max_iterations = Some(n);
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.threads == 0 {
            return Err("threads must be at least 1".into());
        }
        Ok(())
    }

    /// Clamps illegal values, logging each change.
    pub fn normalized(mut self) -> Self {
        if self.threads == 0 {
            tracing::warn!("Parallel.NrSolvers must be at least 1, using 1");
            self.threads = 1;
        }
        self
    }
}
