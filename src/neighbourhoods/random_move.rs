use crate::model::{Model, Neighbour, SimpleNeighbour, Solution, SolutionListener};
use crate::search::{HillClimberSelection, NeighbourSelection};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};

/// Assigns a random value to a random variable.
///
/// Proposes nothing when the value is the current one, when it conflicts
/// with the assignment, or, in hill-climbing mode, when it would worsen
/// the solution.
#[derive(Debug, Default)]
pub struct RandomMove {
    hc_mode: AtomicBool,
}

impl RandomMove {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hc_mode(&self) -> bool {
        self.hc_mode.load(Ordering::Relaxed)
    }
}

impl HillClimberSelection for RandomMove {
    fn set_hc_mode(&self, hc_mode: bool) {
        self.hc_mode.store(hc_mode, Ordering::Relaxed);
    }
}

impl<M: Model> SolutionListener<M> for RandomMove {}

impl<M: Model> NeighbourSelection<M> for RandomMove {
    fn name(&self) -> &str {
        "Random Move"
    }

    fn select_neighbour(&self, solution: &mut Solution<M>) -> Option<Neighbour<M>> {
        let model = std::sync::Arc::clone(solution.model());
        let nr_variables = model.nr_variables();
        if nr_variables == 0 {
            return None;
        }
        let variable = solution.rng().random_range(0..nr_variables);
        let values = model.values(variable);
        if values.is_empty() {
            return None;
        }
        let value = &values[solution.rng().random_range(0..values.len())];

        let assignment = solution.assignment();
        if assignment.value(variable) == Some(value) {
            return None;
        }
        if !model.conflicts(assignment, variable, value).is_empty() {
            return None;
        }
        let delta = model.assignment_delta(assignment, &[(variable, Some(value.clone()))]);
        if self.hc_mode() && delta > 0.0 {
            return None;
        }
        Some(Neighbour::eager(SimpleNeighbour::new(variable, Some(value.clone())), delta))
    }

    fn hill_climber_selection(&self) -> Option<&dyn HillClimberSelection> {
        Some(self)
    }
}
