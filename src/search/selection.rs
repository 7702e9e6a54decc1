//! Neighbour selection contract.

use crate::model::{Model, Neighbour, Solution, SolutionListener};

/// Anything that proposes neighbours: move generators, acceptance-driven
/// searches and phase sequencers alike.
///
/// Returning `None` is the normal "exhausted" signal, not an error. The
/// caller typically moves on to the next phase or stops.
///
/// Implementations must not change the working assignment while
/// proposing; changes happen only when the returned neighbour is assigned.
/// The solution is passed mutably for access to the thread's RNG and
/// search contexts.
pub trait NeighbourSelection<M: Model>: SolutionListener<M> {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Proposes the next neighbour, or `None` when exhausted.
    fn select_neighbour(&self, solution: &mut Solution<M>) -> Option<Neighbour<M>>;

    /// Hill-climb capability of this selection, if it has one.
    fn hill_climber_selection(&self) -> Option<&dyn HillClimberSelection> {
        None
    }
}

/// Capability of generators that can restrict themselves to
/// non-worsening moves when driven by a hill climber.
pub trait HillClimberSelection: Send + Sync {
    fn set_hc_mode(&self, hc_mode: bool);
}
