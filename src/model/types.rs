//! Core trait for the problem definition.

use super::assignment::Assignment;
use std::fmt::Debug;

/// Defines the combinatorial problem being searched.
///
/// The model is shared read-only by all search threads. It owns the
/// variable domains and the objective; the search engine only ever asks
/// it for costs and conflicts, it never decides what a valid placement is.
///
/// # Minimization
///
/// The engine minimizes `total_value`. For maximization, negate the value.
///
/// # Examples
///
/// ```ignore
/// struct Coloring { edges: Vec<(usize, usize)>, n: usize, colors: Vec<u8> }
///
/// impl Model for Coloring {
///     type Value = u8;
///
///     fn nr_variables(&self) -> usize { self.n }
///
///     fn values(&self, _variable: usize) -> &[u8] { &self.colors }
///
///     fn total_value(&self, a: &Assignment<u8>) -> f64 {
///         self.edges.iter()
///             .filter(|(x, y)| a.value(*x).is_some() && a.value(*x) == a.value(*y))
///             .count() as f64
///     }
/// }
/// ```
pub trait Model: Send + Sync + 'static {
    /// The value type of every variable.
    type Value: Clone + PartialEq + Debug + Send + Sync + 'static;

    /// Number of variables.
    fn nr_variables(&self) -> usize;

    /// Domain of the given variable.
    fn values(&self, variable: usize) -> &[Self::Value];

    /// Total cost of the assignment. Lower is better.
    fn total_value(&self, assignment: &Assignment<Self::Value>) -> f64;

    /// Variables that would have to be unassigned if `variable` took
    /// `value` (hard conflicts). The variable itself is never reported.
    fn conflicts(
        &self,
        _assignment: &Assignment<Self::Value>,
        _variable: usize,
        _value: &Self::Value,
    ) -> Vec<usize> {
        Vec::new()
    }

    /// Marginal cost of applying `changes` to the assignment.
    ///
    /// The default evaluates the changes on a trial copy. Models with
    /// incremental evaluation should override it.
    fn assignment_delta(
        &self,
        assignment: &Assignment<Self::Value>,
        changes: &[(usize, Option<Self::Value>)],
    ) -> f64 {
        let before = self.total_value(assignment);
        let mut trial = assignment.clone();
        for (variable, value) in changes {
            trial.set(*variable, value.clone());
        }
        self.total_value(&trial) - before
    }
}
