//! Configurable phase program.

use super::{ParallelConstruction, Phase, Slot};
use crate::model::{Model, Neighbour, Solution, SolutionListener};
use crate::properties::Properties;
use crate::registry::Registry;
use crate::search::NeighbourSelection;
use std::sync::Arc;

type Entry<M> = Option<Arc<dyn NeighbourSelection<M>>>;

/// Selections used by one thread, after borrowing from adjacent phases.
struct Program<M: Model> {
    construction: Entry<M>,
    incomplete: Entry<M>,
    hill_climber: Entry<M>,
    improvement: Entry<M>,
}

/// Runs construction, repair, hill climbing and improvement phases.
///
/// Each phase holds a list of selections; thread `i` uses entry
/// `(i - 1) mod len`, so different threads can run different strategies.
/// A `None` entry or an empty list borrows from the adjacent phase:
/// construction from repair, repair from construction, improvement from
/// repair. Hill climbing is optional.
///
/// The phase cursor only moves forward. Whenever the assignment becomes
/// incomplete again in a later phase, the repair selection runs without
/// moving the cursor back.
pub struct MetaHeuristicSearch<M: Model> {
    construction: Vec<Entry<M>>,
    incomplete: Vec<Entry<M>>,
    hill_climbers: Vec<Entry<M>>,
    improvements: Vec<Entry<M>>,
    phase: Slot<Phase>,
}

fn pick<M: Model>(list: &[Entry<M>], index: usize) -> Entry<M> {
    if list.is_empty() {
        return None;
    }
    let slot = index.checked_sub(1).map_or(0, |i| i % list.len());
    list[slot].clone()
}

fn name_of<M: Model>(entry: &Entry<M>) -> &str {
    entry.as_deref().map_or("none", |s| s.name())
}

impl<M: Model> MetaHeuristicSearch<M> {
    pub fn new(
        construction: Vec<Entry<M>>,
        incomplete: Vec<Entry<M>>,
        hill_climbers: Vec<Entry<M>>,
        improvements: Vec<Entry<M>>,
    ) -> Self {
        Self {
            construction,
            incomplete,
            hill_climbers,
            improvements,
            phase: Slot::new(),
        }
    }

    /// Reads `MetaHeuristic.ConstructionClass`, `IncompleteClass`,
    /// `HillClimberClass` and `ImprovementClass`.
    ///
    /// Each is a comma-separated list of registry names. Empty and `null`
    /// entries are absent slots; construction and repair entries may end
    /// with `@PC` to be wrapped in [`ParallelConstruction`]. Names that
    /// cannot be built are logged and skipped.
    pub fn from_properties(props: &Properties, registry: &Registry<M>) -> Self {
        Self::new(
            phase_list(props, registry, "MetaHeuristic.ConstructionClass", true),
            phase_list(props, registry, "MetaHeuristic.IncompleteClass", true),
            phase_list(props, registry, "MetaHeuristic.HillClimberClass", false),
            phase_list(props, registry, "MetaHeuristic.ImprovementClass", false),
        )
    }

    /// Current phase of the thread, once it has started.
    pub fn phase(&self, solution: &mut Solution<M>) -> Option<Phase> {
        self.phase.get(solution)
    }

    fn program(&self, index: usize) -> Program<M> {
        let construction = pick(&self.construction, index).or_else(|| pick(&self.incomplete, index));
        let incomplete = pick(&self.incomplete, index).or_else(|| construction.clone());
        let improvement = pick(&self.improvements, index).or_else(|| incomplete.clone());
        Program {
            construction,
            incomplete,
            hill_climber: pick(&self.hill_climbers, index),
            improvement,
        }
    }

    fn all(&self) -> impl Iterator<Item = &Arc<dyn NeighbourSelection<M>>> {
        self.construction
            .iter()
            .chain(&self.incomplete)
            .chain(&self.hill_climbers)
            .chain(&self.improvements)
            .flatten()
    }

    fn enter(&self, solution: &Solution<M>, phase: Phase, entry: &Entry<M>) {
        tracing::info!(thread = solution.index(), ?phase, "{}...", name_of(entry));
    }

    fn run(&self, entry: &Entry<M>, solution: &mut Solution<M>) -> Option<Neighbour<M>> {
        entry.as_ref().and_then(|s| s.select_neighbour(solution))
    }

    fn search(&self, program: &Program<M>, mut phase: Phase, solution: &mut Solution<M>) -> (Phase, Option<Neighbour<M>>) {
        if phase == Phase::Construction {
            if !solution.is_complete() {
                if let Some(n) = self.run(&program.construction, solution) {
                    return (phase, Some(n));
                }
            }
            phase = Phase::Incomplete;
            if !solution.is_complete() {
                self.enter(solution, phase, &program.incomplete);
            }
        }
        if phase == Phase::Incomplete {
            if !solution.is_complete() {
                return (phase, self.run(&program.incomplete, solution));
            }
            phase = Phase::HillClimbing;
            if program.hill_climber.is_some() {
                self.enter(solution, phase, &program.hill_climber);
            }
        }
        if phase == Phase::HillClimbing {
            if !solution.is_complete() {
                return (phase, self.run(&program.incomplete, solution));
            }
            if let Some(n) = self.run(&program.hill_climber, solution) {
                return (phase, Some(n));
            }
            phase = Phase::Improvement;
            self.enter(solution, phase, &program.improvement);
        }
        if !solution.is_complete() {
            return (phase, self.run(&program.incomplete, solution));
        }
        (phase, self.run(&program.improvement, solution))
    }
}

fn phase_list<M: Model>(props: &Properties, registry: &Registry<M>, key: &str, allow_pc: bool) -> Vec<Entry<M>> {
    let Some(raw) = props.get(key) else {
        return Vec::new();
    };
    let mut list = Vec::new();
    for entry in raw.split(',').map(str::trim) {
        let (name, pc) = match entry.strip_suffix("@PC") {
            Some(name) if allow_pc => (name, true),
            _ => (entry, false),
        };
        if name.is_empty() || name.eq_ignore_ascii_case("null") {
            list.push(None);
            continue;
        }
        match registry.create(name, props) {
            Ok(selection) if pc => {
                let wrapped: Arc<dyn NeighbourSelection<M>> =
                    Arc::new(ParallelConstruction::from_properties(props, selection));
                list.push(Some(wrapped));
            }
            Ok(selection) => list.push(Some(selection)),
            Err(e) => tracing::error!(key, name, "unable to use {name}: {e:#}"),
        }
    }
    list
}

impl<M: Model> SolutionListener<M> for MetaHeuristicSearch<M> {
    fn solution_updated(&self, solution: &mut Solution<M>) {
        for s in self.all() {
            s.solution_updated(solution);
        }
    }

    fn best_saved(&self, solution: &mut Solution<M>) {
        for s in self.all() {
            s.best_saved(solution);
        }
    }

    fn best_cleared(&self, solution: &mut Solution<M>) {
        for s in self.all() {
            s.best_cleared(solution);
        }
    }

    fn best_restored(&self, solution: &mut Solution<M>) {
        for s in self.all() {
            s.best_restored(solution);
        }
    }
}

impl<M: Model> NeighbourSelection<M> for MetaHeuristicSearch<M> {
    fn name(&self) -> &str {
        "Meta-Heuristic Search"
    }

    fn select_neighbour(&self, solution: &mut Solution<M>) -> Option<Neighbour<M>> {
        let program = self.program(solution.index());
        let phase = match self.phase.get(solution) {
            Some(phase) => phase,
            None => {
                tracing::info!(
                    thread = solution.index(),
                    "Using {} > {}{} > {}",
                    name_of(&program.construction),
                    name_of(&program.incomplete),
                    program
                        .hill_climber
                        .as_deref()
                        .map(|s| format!(" > {}", s.name()))
                        .unwrap_or_default(),
                    name_of(&program.improvement)
                );
                self.enter(solution, Phase::Construction, &program.construction);
                Phase::Construction
            }
        };
        let (phase, neighbour) = self.search(&program, phase, solution);
        self.phase.set(solution, phase);
        neighbour
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{NoopMove, ToyModel};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Yields `budget` no-op moves, then `None`.
    struct Finite {
        name: &'static str,
        budget: usize,
        calls: AtomicUsize,
        saved: AtomicUsize,
    }

    impl Finite {
        fn new(name: &'static str, budget: usize) -> Arc<Self> {
            Arc::new(Self {
                name,
                budget,
                calls: AtomicUsize::new(0),
                saved: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::Relaxed)
        }
    }

    impl SolutionListener<ToyModel> for Finite {
        fn best_saved(&self, _solution: &mut Solution<ToyModel>) {
            self.saved.fetch_add(1, Ordering::Relaxed);
        }
    }

    impl NeighbourSelection<ToyModel> for Finite {
        fn name(&self) -> &str {
            self.name
        }

        fn select_neighbour(&self, _solution: &mut Solution<ToyModel>) -> Option<Neighbour<ToyModel>> {
            let n = self.calls.fetch_add(1, Ordering::Relaxed);
            (n < self.budget).then(|| Neighbour::eager(NoopMove, 0.0))
        }
    }

    fn entry(s: &Arc<Finite>) -> Entry<ToyModel> {
        Some(Arc::clone(s) as Arc<dyn NeighbourSelection<ToyModel>>)
    }

    fn fill(s: &mut Solution<ToyModel>) {
        for v in 0..s.model().nr_variables() {
            s.assignment_mut().assign(v, 0);
        }
    }

    #[test]
    fn test_phases_advance_in_order() {
        let con = Finite::new("con", 2);
        let inc = Finite::new("inc", 1);
        let hc = Finite::new("hc", 1);
        let imp = Finite::new("imp", 100);
        let meta = MetaHeuristicSearch::new(vec![entry(&con)], vec![entry(&inc)], vec![entry(&hc)], vec![entry(&imp)]);
        let mut s = ToyModel::solution(vec![0, 0], 1);

        assert!(meta.select_neighbour(&mut s).is_some());
        assert!(meta.select_neighbour(&mut s).is_some());
        assert_eq!(meta.phase(&mut s), Some(Phase::Construction));

        // construction exhausted, still incomplete: repair
        assert!(meta.select_neighbour(&mut s).is_some());
        assert_eq!(meta.phase(&mut s), Some(Phase::Incomplete));
        assert_eq!(inc.calls(), 1);

        fill(&mut s);
        assert!(meta.select_neighbour(&mut s).is_some());
        assert_eq!(meta.phase(&mut s), Some(Phase::HillClimbing));
        assert!(meta.select_neighbour(&mut s).is_some());
        assert_eq!(meta.phase(&mut s), Some(Phase::Improvement));
        assert_eq!(hc.calls(), 2);
        assert_eq!(imp.calls(), 1);
    }

    #[test]
    fn test_regression_runs_repair_without_going_back() {
        let con = Finite::new("con", 100);
        let inc = Finite::new("inc", 100);
        let imp = Finite::new("imp", 100);
        let meta = MetaHeuristicSearch::new(vec![entry(&con)], vec![entry(&inc)], vec![], vec![entry(&imp)]);
        let mut s = ToyModel::solution(vec![0, 0], 1);
        fill(&mut s);
        assert!(meta.select_neighbour(&mut s).is_some());
        assert_eq!(meta.phase(&mut s), Some(Phase::Improvement));
        assert_eq!(con.calls(), 0);

        s.assignment_mut().unassign(1);
        assert!(meta.select_neighbour(&mut s).is_some());
        assert_eq!(meta.phase(&mut s), Some(Phase::Improvement));
        assert_eq!(inc.calls(), 1);
        assert_eq!(con.calls(), 0);
    }

    #[test]
    fn test_threads_pick_their_own_entry() {
        let a = Finite::new("a", 100);
        let b = Finite::new("b", 100);
        let meta = MetaHeuristicSearch::new(vec![], vec![], vec![], vec![entry(&a), entry(&b)]);
        for index in 1..=3 {
            let mut s = ToyModel::solution(vec![0], index);
            fill(&mut s);
            assert!(meta.select_neighbour(&mut s).is_some());
        }
        assert_eq!(a.calls(), 2);
        assert_eq!(b.calls(), 1);
    }

    #[test]
    fn test_absent_slots_borrow_neighbours() {
        let con = Finite::new("con", 100);
        let meta = MetaHeuristicSearch::new(vec![entry(&con)], vec![None], vec![], vec![]);
        let mut s = ToyModel::solution(vec![0], 1);
        fill(&mut s);
        assert!(meta.select_neighbour(&mut s).is_some());
        assert_eq!(meta.phase(&mut s), Some(Phase::Improvement));
        assert_eq!(con.calls(), 1);
    }

    #[test]
    fn test_events_reach_every_phase() {
        let con = Finite::new("con", 0);
        let imp = Finite::new("imp", 0);
        let meta = Arc::new(MetaHeuristicSearch::new(vec![entry(&con)], vec![], vec![], vec![entry(&imp)]));
        let mut s = ToyModel::solution(vec![0], 1);
        s.add_listener(meta.clone());
        fill(&mut s);
        assert!(s.save_best());
        assert_eq!(con.saved.load(Ordering::Relaxed), 1);
        assert_eq!(imp.saved.load(Ordering::Relaxed), 1);
    }
}
