//! Simulated Annealing (SA).
//!
//! Accepts worsening moves with a probability that decreases with the
//! temperature. The schedule calibrates its temperatures from sampled
//! move costs when no initial temperature is given, cools geometrically,
//! reheats when the search stalls, and falls back to the best solution
//! when it drifts too far.
//!
//! # References
//!
//! - Kirkpatrick, Gelatt & Vecchi (1983), "Optimization by Simulated Annealing"
//! - Cerny (1985), "Thermodynamical Approach to the Travelling Salesman Problem"

mod annealing;
mod config;

pub use annealing::{AnnealingState, SimulatedAnnealing};
pub use config::{acceptance_probability, SaConfig, Temperatures};
