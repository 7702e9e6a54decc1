//! Problem-side contracts consumed by the search engine.
//!
//! # Core Traits
//!
//! - [`Model`]: variables, domains, objective and hard conflicts
//! - [`Move`] / [`LazyMove`]: eager and lazy changes to an assignment
//! - [`LazyAcceptance`]: late acceptance callback of lazy moves
//! - [`SolutionListener`]: best-saved / cleared / restored notifications
//!
//! # Key Types
//!
//! - [`Assignment`]: one thread's variable-to-value mapping
//! - [`Solution`]: a thread's assignment, iteration counter, RNG and
//!   search contexts, plus the shared [`BestSolution`]
//! - [`Neighbour`]: uniform wrapper over eager and lazy moves

mod assignment;
mod best;
mod context;
mod neighbour;
mod solution;
mod types;

pub use assignment::Assignment;
pub use best::{BestSnapshot, BestSolution};
pub use context::ContextKey;
pub use neighbour::{
    LazyAcceptance, LazyMove, LazySimpleNeighbour, Move, Neighbour, SimpleNeighbour,
};
pub use solution::{Solution, SolutionListener};
pub use types::Model;
