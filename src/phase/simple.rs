//! Fixed construction → hill climbing → deluge/annealing program.

use super::{MaxIdleSelection, ParallelConstruction, Phase, Slot};
use crate::model::{Model, Neighbour, Solution, SolutionListener};
use crate::neighbourhoods::Construction;
use crate::properties::Properties;
use crate::registry::Registry;
use crate::search::NeighbourSelection;
use std::sync::Arc;

/// A ready-made search program.
///
/// 1. an optional custom construction (`Construction.Class`), run until it
///    is exhausted or, with `Construction.UntilComplete`, until the
///    assignment is complete,
/// 2. the stock [`Construction`] while variables remain unassigned,
/// 3. hill climbing (`Search.CountSteps` selects the step counting
///    variant),
/// 4. great deluge, or simulated annealing when `Search.GreatDeluge` is
///    false.
///
/// With `Search.MaxIdleIterations >= 0` both constructions stop after that
/// many iterations without a new best, and later phases go back to the
/// best solution whenever it had fewer unassigned variables (unless
/// `Suggestion.AllowUnassignments`). A negative value keeps constructing
/// in every phase while the assignment is incomplete.
///
/// With more than one thread (`Parallel.NrSolvers`) the construction is
/// wrapped in [`ParallelConstruction`].
pub struct SimpleSearch<M: Model> {
    construction: Option<Arc<dyn NeighbourSelection<M>>>,
    until_complete: bool,
    standard: Arc<dyn NeighbourSelection<M>>,
    hill_climber: Arc<dyn NeighbourSelection<M>>,
    great_deluge: Arc<dyn NeighbourSelection<M>>,
    annealing: Arc<dyn NeighbourSelection<M>>,
    use_great_deluge: bool,
    max_idle: Option<u64>,
    allow_unassignments: bool,
    phase: Slot<Phase>,
}

impl<M: Model> SimpleSearch<M> {
    pub fn from_properties(props: &Properties, registry: &Registry<M>) -> anyhow::Result<Self> {
        let mut construction = match props.get("Construction.Class").filter(|s| !s.is_empty()) {
            Some(name) => match registry.create(name, props) {
                Ok(selection) => Some(selection),
                Err(e) => {
                    tracing::error!(name, "unable to use {name}: {e:#}");
                    None
                }
            },
            None => None,
        };
        let until_complete = construction.is_some() && props.get_bool("Construction.UntilComplete", false);
        let mut standard: Arc<dyn NeighbourSelection<M>> = Arc::new(Construction::new());

        let hill_climber = if props.get_bool("Search.CountSteps", false) {
            registry.create("StepCountingHillClimber", props)?
        } else {
            registry.create("HillClimber", props)?
        };
        let great_deluge = registry.create("GreatDeluge", props)?;
        let annealing = registry.create("SimulatedAnnealing", props)?;

        let max_idle = props
            .get("Search.MaxIdleIterations")
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(1000);
        let max_idle = u64::try_from(max_idle).ok();
        if let Some(max_idle) = max_idle {
            standard = Arc::new(MaxIdleSelection::new(standard, max_idle));
            if !until_complete {
                construction = construction
                    .map(|c| Arc::new(MaxIdleSelection::new(c, max_idle)) as Arc<dyn NeighbourSelection<M>>);
            }
        }
        if props.get_usize("Parallel.NrSolvers", 1) > 1 {
            let inner = construction.unwrap_or_else(|| Arc::clone(&standard));
            construction = Some(Arc::new(ParallelConstruction::from_properties(props, inner)));
        }

        Ok(Self {
            construction,
            until_complete,
            standard,
            hill_climber,
            great_deluge,
            annealing,
            use_great_deluge: props.get_bool("Search.GreatDeluge", true),
            max_idle,
            allow_unassignments: props.get_bool("Suggestion.AllowUnassignments", false),
            phase: Slot::new(),
        })
    }

    /// Current phase of the thread, once it has started.
    pub fn phase(&self, solution: &mut Solution<M>) -> Option<Phase> {
        self.phase.get(solution)
    }

    fn parts(&self) -> impl Iterator<Item = &Arc<dyn NeighbourSelection<M>>> {
        self.construction.iter().chain([
            &self.standard,
            &self.hill_climber,
            &self.great_deluge,
            &self.annealing,
        ])
    }

    fn best_has_fewer_unassigned(solution: &Solution<M>) -> bool {
        solution
            .best_unassigned()
            .is_some_and(|best| best < solution.nr_unassigned())
    }

    /// Shared prefix of the two improvement phases.
    fn keep_complete(&self, solution: &mut Solution<M>) -> Option<Neighbour<M>> {
        if self.max_idle.is_none() && !solution.is_complete() {
            let selection = self.construction.as_ref().unwrap_or(&self.standard);
            if let Some(n) = selection.select_neighbour(solution) {
                return Some(n);
            }
        }
        if self.max_idle.is_some() && !self.allow_unassignments && Self::best_has_fewer_unassigned(solution) {
            solution.restore_best();
        }
        None
    }

    fn search(&self, mut phase: Phase, solution: &mut Solution<M>) -> (Phase, Option<Neighbour<M>>) {
        if phase == Phase::Construction {
            if let Some(construction) = &self.construction {
                if !solution.is_complete() {
                    let n = construction.select_neighbour(solution);
                    if n.is_some() || self.until_complete {
                        return (phase, n);
                    }
                }
            }
            phase = Phase::Incomplete;
            tracing::info!(thread = solution.index(), "{}...", self.standard.name());
        }
        if phase == Phase::Incomplete {
            if !solution.is_complete() {
                if let Some(n) = self.standard.select_neighbour(solution) {
                    return (phase, Some(n));
                }
            }
            phase = Phase::HillClimbing;
            if Self::best_has_fewer_unassigned(solution) {
                solution.restore_best();
            }
        }
        if phase == Phase::HillClimbing {
            if let Some(n) = self.keep_complete(solution) {
                return (phase, Some(n));
            }
            if let Some(n) = self.hill_climber.select_neighbour(solution) {
                return (phase, Some(n));
            }
            phase = Phase::Improvement;
        }
        if let Some(n) = self.keep_complete(solution) {
            return (phase, Some(n));
        }
        let improvement = if self.use_great_deluge {
            &self.great_deluge
        } else {
            &self.annealing
        };
        (phase, improvement.select_neighbour(solution))
    }
}

impl<M: Model> SolutionListener<M> for SimpleSearch<M> {
    fn solution_updated(&self, solution: &mut Solution<M>) {
        for s in self.parts() {
            s.solution_updated(solution);
        }
    }

    fn best_saved(&self, solution: &mut Solution<M>) {
        for s in self.parts() {
            s.best_saved(solution);
        }
    }

    fn best_cleared(&self, solution: &mut Solution<M>) {
        for s in self.parts() {
            s.best_cleared(solution);
        }
    }

    fn best_restored(&self, solution: &mut Solution<M>) {
        for s in self.parts() {
            s.best_restored(solution);
        }
    }
}

impl<M: Model> NeighbourSelection<M> for SimpleSearch<M> {
    fn name(&self) -> &str {
        "Simple Search"
    }

    fn select_neighbour(&self, solution: &mut Solution<M>) -> Option<Neighbour<M>> {
        let phase = match self.phase.get(solution) {
            Some(phase) => phase,
            None => {
                tracing::info!(thread = solution.index(), "Construction...");
                Phase::Construction
            }
        };
        let (phase, neighbour) = self.search(phase, solution);
        self.phase.set(solution, phase);
        neighbour
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ToyModel;
    use std::time::{Duration, Instant};

    fn props() -> Properties {
        Properties::new()
            .with("HillClimber.MaxIdle", "50")
            .with("General.Seed", "1")
    }

    fn drive(search: &SimpleSearch<ToyModel>, s: &mut Solution<ToyModel>, steps: usize) {
        for _ in 0..steps {
            let Some(n) = search.select_neighbour(s) else {
                break;
            };
            n.assign(s);
            s.inc_iteration();
            s.update();
            if s.is_better_than_best() {
                s.save_best();
            }
        }
    }

    #[test]
    fn test_constructs_then_improves() {
        let registry = Registry::with_defaults();
        let search = Arc::new(SimpleSearch::from_properties(&props(), &registry).unwrap());
        // at the optimum no deluge move is ever accepted: bound the run
        let mut s = ToyModel::solution(vec![2, 7, 4], 1)
            .with_deadline(Instant::now() + Duration::from_millis(300));
        s.add_listener(search.clone());

        drive(&search, &mut s, 3);
        assert!(s.is_complete());
        assert_eq!(search.phase(&mut s), Some(Phase::Incomplete));

        drive(&search, &mut s, 2000);
        assert_eq!(search.phase(&mut s), Some(Phase::Improvement));
        assert_eq!(s.best_value(), 0.0);
    }

    #[test]
    fn test_unknown_construction_is_skipped() {
        let registry: Registry<ToyModel> = Registry::with_defaults();
        let props = props().with("Construction.Class", "NoSuchThing");
        let search = SimpleSearch::from_properties(&props, &registry).unwrap();
        assert!(search.construction.is_none());
    }

    #[test]
    fn test_parallel_wraps_construction() {
        let registry: Registry<ToyModel> = Registry::with_defaults();
        let props = props().with("Parallel.NrSolvers", "2");
        let search = SimpleSearch::from_properties(&props, &registry).unwrap();
        assert!(search.construction.is_some());
        assert_eq!(search.max_idle, Some(1000));
    }
}
