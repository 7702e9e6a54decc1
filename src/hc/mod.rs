//! Hill climbing.
//!
//! - [`HillClimber`]: accepts non-worsening moves, stops after a number of
//!   iterations without a strict improvement.
//! - [`StepCountingHillClimber`]: additionally accepts moves that keep the
//!   total below a bound that is refreshed every `counter_limit` counted
//!   moves.
//!
//! # References
//!
//! - Bykov & Petrovic (2016), "A Step Counting Hill Climbing Algorithm
//!   applied to University Examination Timetabling"

mod climber;
mod config;

pub use climber::{HillClimber, HillClimberState, StepCountingHillClimber, StepCountingState};
pub use config::{CounterMode, HillClimberConfig, StepCountingConfig};
