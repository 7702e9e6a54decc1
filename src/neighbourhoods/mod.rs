//! Stock move generators.
//!
//! - [`RandomMove`]: one random variable, one random conflict-free value
//! - [`RandomSwapMove`]: a random value whose conflicts are moved to other
//!   conflict-free values
//! - [`Construction`]: assigns the most constrained unassigned variable
//!
//! The first two are hill-climb aware: under a hill climber they only
//! propose moves that do not worsen the solution.

mod construction;
mod random_move;
mod swap;

pub use construction::Construction;
pub use random_move::RandomMove;
pub use swap::{RandomSwapMove, SwapMove};
