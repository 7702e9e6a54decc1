use crate::model::{Assignment, Model, Move, Neighbour, Solution, SolutionListener};
use crate::properties::Properties;
use crate::search::{HillClimberSelection, NeighbourSelection};
use rand::rngs::StdRng;
use rand::Rng;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A set of variables moved together.
#[derive(Clone, PartialEq)]
pub struct SwapMove<T> {
    changes: Vec<(usize, T)>,
}

impl<T> SwapMove<T> {
    pub fn changes(&self) -> &[(usize, T)] {
        &self.changes
    }
}

impl<T: fmt::Debug> fmt::Debug for SwapMove<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Swap{{")?;
        for (i, (variable, value)) in self.changes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{variable}={value:?}")?;
        }
        write!(f, "}}")
    }
}

impl<M: Model> Move<M> for SwapMove<M::Value> {
    fn assign(&self, _model: &M, assignment: &mut Assignment<M::Value>) {
        for (variable, _) in &self.changes {
            assignment.unassign(*variable);
        }
        for (variable, value) in &self.changes {
            assignment.assign(*variable, value.clone());
        }
    }
}

/// Assigns a random value to a random variable and moves every variable
/// it conflicts with to another conflict-free value.
///
/// Variables are tried from a random start; for each variable at most
/// `max_attempts` values with conflicts are tried, and each conflicting
/// variable gets at most `max_attempts` alternatives. The search for one
/// move is cut short after `time_limit`. Costs are evaluated on a trial
/// copy, so the working assignment is never touched.
#[derive(Debug)]
pub struct RandomSwapMove {
    max_attempts: usize,
    time_limit: Option<Duration>,
    hc_mode: AtomicBool,
}

impl Default for RandomSwapMove {
    fn default() -> Self {
        Self::new(3, Some(Duration::from_millis(200)))
    }
}

/// One resolution attempt over a trial assignment.
struct Trial<'a, M: Model> {
    model: &'a M,
    assignment: Assignment<M::Value>,
    total: f64,
    rng: &'a mut StdRng,
    started: Instant,
}

impl RandomSwapMove {
    pub fn new(max_attempts: usize, time_limit: Option<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            time_limit,
            hc_mode: AtomicBool::new(false),
        }
    }

    /// Reads `RandomSwap.MaxAttempts` (default 3) and
    /// `RandomSwap.TimeLimit` in milliseconds (default 200, 0 = none).
    pub fn from_properties(props: &Properties) -> Self {
        let limit = props.get_u64("RandomSwap.TimeLimit", 200);
        Self::new(
            props.get_usize("RandomSwap.MaxAttempts", 3),
            (limit > 0).then(|| Duration::from_millis(limit)),
        )
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn hc_mode(&self) -> bool {
        self.hc_mode.load(Ordering::Relaxed)
    }

    fn out_of_time<M: Model>(&self, trial: &Trial<'_, M>) -> bool {
        self.time_limit.is_some_and(|limit| trial.started.elapsed() > limit)
    }

    /// Finds conflict-free values for `conflicts[index..]`, appending them
    /// to `changes`. Returns the cost of the complete swap.
    fn resolve<M: Model>(
        &self,
        trial: &mut Trial<'_, M>,
        conflicts: &[(usize, Option<M::Value>)],
        index: usize,
        changes: &mut Vec<(usize, M::Value)>,
    ) -> Option<f64> {
        let model = trial.model;
        let Some((variable, original)) = conflicts.get(index) else {
            return Some(model.total_value(&trial.assignment) - trial.total);
        };
        let values = model.values(*variable);
        if values.is_empty() {
            return None;
        }
        let start = trial.rng.random_range(0..values.len());
        let mut attempts = 0;
        for i in 0..values.len() {
            let value = &values[(i + start) % values.len()];
            if original.as_ref() == Some(value) || !model.conflicts(&trial.assignment, *variable, value).is_empty() {
                continue;
            }
            trial.assignment.assign(*variable, value.clone());
            let result = self.resolve(trial, conflicts, index + 1, changes);
            trial.assignment.unassign(*variable);
            attempts += 1;
            if let Some(v) = result {
                if !self.hc_mode() || v <= 0.0 {
                    changes.push((*variable, value.clone()));
                    return Some(v);
                }
            }
            if attempts >= self.max_attempts || self.out_of_time(trial) {
                break;
            }
        }
        None
    }
}

impl HillClimberSelection for RandomSwapMove {
    fn set_hc_mode(&self, hc_mode: bool) {
        self.hc_mode.store(hc_mode, Ordering::Relaxed);
    }
}

impl<M: Model> SolutionListener<M> for RandomSwapMove {}

impl<M: Model> NeighbourSelection<M> for RandomSwapMove {
    fn name(&self) -> &str {
        "Random Swap Move"
    }

    fn select_neighbour(&self, solution: &mut Solution<M>) -> Option<Neighbour<M>> {
        let model = Arc::clone(solution.model());
        let nr_variables = model.nr_variables();
        if nr_variables == 0 {
            return None;
        }
        let assignment = solution.assignment().clone();
        let mut trial = Trial {
            model: model.as_ref(),
            total: model.total_value(&assignment),
            assignment,
            rng: solution.rng(),
            started: Instant::now(),
        };
        let first = trial.rng.random_range(0..nr_variables);
        for i in 0..nr_variables {
            let variable = (i + first) % nr_variables;
            let values = model.values(variable);
            if values.is_empty() {
                continue;
            }
            let start = trial.rng.random_range(0..values.len());
            let old = trial.assignment.value(variable).cloned();
            let mut attempts = 0;
            for j in 0..values.len() {
                let value = &values[(j + start) % values.len()];
                if old.as_ref() == Some(value) {
                    continue;
                }
                let conflicts = model.conflicts(&trial.assignment, variable, value);
                if conflicts.is_empty() {
                    let delta = model.assignment_delta(&trial.assignment, &[(variable, Some(value.clone()))]);
                    if !self.hc_mode() || delta <= 0.0 {
                        let mv = SwapMove {
                            changes: vec![(variable, value.clone())],
                        };
                        return Some(Neighbour::eager(mv, delta));
                    }
                    continue;
                }

                let saved: Vec<(usize, Option<M::Value>)> = conflicts
                    .iter()
                    .map(|c| (*c, trial.assignment.unassign(*c)))
                    .collect();
                trial.assignment.assign(variable, value.clone());
                let mut changes = Vec::with_capacity(saved.len() + 1);
                let result = self.resolve(&mut trial, &saved, 0, &mut changes);
                attempts += 1;

                trial.assignment.set(variable, old.clone());
                for (c, v) in saved.into_iter().rev() {
                    trial.assignment.set(c, v);
                }

                if let Some(v) = result {
                    changes.push((variable, value.clone()));
                    // assigning a previously unassigned variable always counts
                    let v = if old.is_none() { -1.0 } else { v };
                    return Some(Neighbour::eager(SwapMove { changes }, v));
                }
                if attempts >= self.max_attempts {
                    break;
                }
            }
        }
        None
    }

    fn hill_climber_selection(&self) -> Option<&dyn HillClimberSelection> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ToyModel;

    fn select(mv: &RandomSwapMove, s: &mut Solution<ToyModel>) -> Option<Neighbour<ToyModel>> {
        NeighbourSelection::<ToyModel>::select_neighbour(mv, s)
    }

    #[test]
    fn test_swap_resolves_conflicts() {
        // every value is taken by some variable: moves must push the
        // conflicting variable elsewhere
        let model = ToyModel::new(vec![0; 10]).with_conflict_on_equal();
        let mut s = model.into_solution(1);
        for v in 0..10 {
            s.assignment_mut().assign(v, v as i32);
        }
        let mv = RandomSwapMove::new(5, None);
        let mut swaps = 0;
        for _ in 0..50 {
            let before = s.total_value();
            let snapshot = s.assignment().clone();
            let Some(n) = select(&mv, &mut s) else {
                continue;
            };
            assert_eq!(s.assignment(), &snapshot);
            let value = n.value().unwrap();
            assert!(n.assign(&mut s));
            assert!((s.total_value() - before - value).abs() < 1e-9);
            assert!(s.is_complete());
            let mut seen: Vec<i32> = s.assignment().assigned().map(|(_, x)| *x).collect();
            seen.sort_unstable();
            seen.dedup();
            assert_eq!(seen.len(), 10);
            swaps += 1;
        }
        assert!(swaps > 0);
    }

    #[test]
    fn test_free_value_is_a_simple_move() {
        let mut s = ToyModel::new(vec![4, 4]).with_conflict_on_equal().into_solution(1);
        s.assignment_mut().assign(0, 4);
        let mv = RandomSwapMove::default();
        let n = select(&mv, &mut s).unwrap();
        assert!(n.assign(&mut s));
        assert!(s.assignment().nr_assigned() >= 1);
    }

    #[test]
    fn test_hc_mode_never_worsens() {
        let mut s = ToyModel::filled(vec![5, 5, 5], 5, 1);
        let mv = RandomSwapMove::default();
        mv.set_hc_mode(true);
        for _ in 0..100 {
            assert!(select(&mv, &mut s).is_none());
        }
    }

    #[test]
    fn test_from_properties() {
        let props = Properties::new()
            .with("RandomSwap.MaxAttempts", "7")
            .with("RandomSwap.TimeLimit", "0");
        let mv = RandomSwapMove::from_properties(&props);
        assert_eq!(mv.max_attempts(), 7);
        assert!(mv.time_limit.is_none());
    }
}
