use crate::model::{Model, Neighbour, SimpleNeighbour, Solution, SolutionListener};
use crate::search::NeighbourSelection;
use rand::Rng;

/// Greedy construction step.
///
/// Picks the unassigned variable with the smallest domain and gives it the
/// value with the fewest conflicts, then the lowest cost. Ties are broken
/// at random. Exhausted once the assignment is complete.
#[derive(Debug, Clone, Copy, Default)]
pub struct Construction;

impl Construction {
    pub fn new() -> Self {
        Self
    }
}

impl<M: Model> SolutionListener<M> for Construction {}

impl<M: Model> NeighbourSelection<M> for Construction {
    fn name(&self) -> &str {
        "Construction"
    }

    fn select_neighbour(&self, solution: &mut Solution<M>) -> Option<Neighbour<M>> {
        let model = std::sync::Arc::clone(solution.model());
        let unassigned: Vec<usize> = solution.assignment().unassigned().collect();

        let mut variable = None;
        let mut smallest = usize::MAX;
        let mut ties = 0u32;
        for v in unassigned {
            let size = model.values(v).len();
            if size == 0 {
                continue;
            }
            if size < smallest {
                smallest = size;
                variable = Some(v);
                ties = 1;
            } else if size == smallest {
                ties += 1;
                if solution.rng().random_range(0..ties) == 0 {
                    variable = Some(v);
                }
            }
        }
        let variable = variable?;

        let mut best: Option<(usize, f64, &M::Value)> = None;
        let mut ties = 0u32;
        for value in model.values(variable) {
            let assignment = solution.assignment();
            let conflicts = model.conflicts(assignment, variable, value);
            let mut changes: Vec<(usize, Option<M::Value>)> = conflicts.iter().map(|c| (*c, None)).collect();
            changes.push((variable, Some(value.clone())));
            let delta = model.assignment_delta(assignment, &changes);
            let candidate = (conflicts.len(), delta);
            match best {
                Some((n, d, _)) if (n, d) < candidate => {}
                Some((n, d, _)) if (n, d) == candidate => {
                    ties += 1;
                    if solution.rng().random_range(0..ties) == 0 {
                        best = Some((conflicts.len(), delta, value));
                    }
                }
                _ => {
                    best = Some((conflicts.len(), delta, value));
                    ties = 1;
                }
            }
        }
        let (_, delta, value) = best?;
        Some(Neighbour::eager(SimpleNeighbour::new(variable, Some(value.clone())), delta))
    }
}
