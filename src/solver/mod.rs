//! Solver driving a neighbour selection to termination.
//!
//! # Key Types
//!
//! - [`SolverConfig`]: threads, iteration and time limits, seed
//! - [`Solver`]: builds the top-level selection and runs it per thread
//! - [`SolverResult`]: best assignment and run statistics

mod config;
mod runner;

pub use config::SolverConfig;
pub use runner::{Solver, SolverResult};
