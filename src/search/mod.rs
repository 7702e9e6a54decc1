//! Neighbourhood search engine.
//!
//! The pieces every acceptance strategy shares:
//!
//! - [`NeighbourSelection`]: the "propose a neighbour" contract implemented
//!   by move generators, searches and phase sequencers alike.
//! - [`NeighbourSelector`]: one weighted generator, chosen by roulette
//!   wheel (static bonus, or adaptive points).
//! - [`SearchContext`]: per-thread iteration counter, clock, role, RNG and
//!   strategy state, stored inside each thread's solution.
//! - [`NeighbourSearch`]: the generate/accept loop over an
//!   [`AcceptanceStrategy`].
//!
//! Only the master thread ([`Role::Master`]) advances shared control
//! parameters; followers read the value it last published.
//!
//! # References
//!
//! - Ropke & Pisinger (2006), "An Adaptive Large Neighborhood Search
//!   Heuristic for the Pickup and Delivery Problem with Time Windows"

mod config;
mod context;
mod control;
mod engine;
mod selection;
mod selector;

pub use config::SearchConfig;
pub use context::SearchContext;
pub use control::{ControlCell, Role};
pub use engine::{resulting_total, AcceptanceStrategy, NeighbourSearch};
pub use selection::{HillClimberSelection, NeighbourSelection};
pub use selector::{NeighbourSelector, SCORE_ACCEPTED, SCORE_IMPROVED};

/// Tolerance below which a negative cost counts as an improvement.
pub const EPSILON: f64 = 1e-5;
