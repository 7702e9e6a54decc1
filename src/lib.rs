//! Neighbourhood-search metaheuristics over a generic assignment model.
//!
//! Provides the building blocks of iterative local search:
//!
//! - **Model**: the problem contract ([`model::Model`]), per-thread
//!   [`model::Solution`]s and a best solution shared by all threads.
//! - **Search engine**: weighted roulette choice among neighbourhood
//!   generators with optional adaptive points, driven by a pluggable
//!   acceptance strategy ([`search::NeighbourSearch`]).
//! - **Hill Climbing (HC)**: non-worsening moves until too many idle
//!   iterations, optionally counting steps ([`hc`]).
//! - **Simulated Annealing (SA)**: temperature-controlled acceptance with
//!   cooling and reheating ([`sa`]).
//! - **Great Deluge (GD)**: acceptance below a falling bound that is
//!   raised again when the search gets stuck ([`gd`]).
//! - **Phases**: sequencers combining construction, hill climbing and
//!   improvement ([`phase`]).
//! - **Neighbourhoods**: stock random, swap and construction moves
//!   ([`neighbourhoods`]).
//! - **Solver**: runs a selection on one or more threads until it is
//!   exhausted or a limit is reached ([`solver`]).
//!
//! Everything is configured from flat `Key=value` [`Properties`]; the
//! [`registry::Registry`] resolves the names they reference.
//!
//! # Architecture
//!
//! Components are shared between threads and keep no per-thread state of
//! their own: each thread's state lives in a context stored inside its
//! solution. Shared control parameters (temperature, bound) are advanced
//! by the master thread only and read by the others.

pub mod gd;
pub mod hc;
pub mod model;
pub mod neighbourhoods;
pub mod phase;
pub mod registry;
pub mod sa;
pub mod search;
pub mod solver;

mod properties;

pub use properties::Properties;

#[cfg(test)]
pub(crate) mod testing;
