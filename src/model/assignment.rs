//! Per-thread working assignment.

/// A mapping from variables to their currently chosen values.
///
/// Variables are addressed by their position in the model (`0..n`).
/// Every concurrently running search thread owns one assignment; the
/// `index` identifies that thread and never changes.
///
/// # Examples
///
/// ```
/// use u_localsearch::model::Assignment;
///
/// let mut a: Assignment<i32> = Assignment::new(1, 3);
/// a.assign(0, 7);
/// assert_eq!(a.value(0), Some(&7));
/// assert_eq!(a.nr_unassigned(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Assignment<T> {
    index: usize,
    values: Vec<Option<T>>,
    nr_assigned: usize,
}

impl<T: Clone> Assignment<T> {
    /// Creates an empty assignment over `nr_variables` variables.
    pub fn new(index: usize, nr_variables: usize) -> Self {
        Self {
            index,
            values: vec![None; nr_variables],
            nr_assigned: 0,
        }
    }

    /// Stable thread index of this assignment.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn nr_variables(&self) -> usize {
        self.values.len()
    }

    /// Current value of `variable`, if any.
    pub fn value(&self, variable: usize) -> Option<&T> {
        self.values.get(variable).and_then(Option::as_ref)
    }

    /// Assigns `value` to `variable`, returning the previous value.
    pub fn assign(&mut self, variable: usize, value: T) -> Option<T> {
        let previous = self.values[variable].replace(value);
        if previous.is_none() {
            self.nr_assigned += 1;
        }
        previous
    }

    /// Removes the value of `variable`, returning it.
    pub fn unassign(&mut self, variable: usize) -> Option<T> {
        let previous = self.values[variable].take();
        if previous.is_some() {
            self.nr_assigned -= 1;
        }
        previous
    }

    /// Sets the slot of `variable` to exactly `value`.
    pub fn set(&mut self, variable: usize, value: Option<T>) -> Option<T> {
        match value {
            Some(v) => self.assign(variable, v),
            None => self.unassign(variable),
        }
    }

    pub fn nr_assigned(&self) -> usize {
        self.nr_assigned
    }

    pub fn nr_unassigned(&self) -> usize {
        self.values.len() - self.nr_assigned
    }

    pub fn is_complete(&self) -> bool {
        self.nr_assigned == self.values.len()
    }

    /// Iterates over the unassigned variables.
    pub fn unassigned(&self) -> impl Iterator<Item = usize> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_none())
            .map(|(i, _)| i)
    }

    /// Iterates over `(variable, value)` pairs of the assigned variables.
    pub fn assigned(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (i, v)))
    }

    /// Copies all values of `other` while keeping this assignment's index.
    pub fn copy_values_from(&mut self, other: &Assignment<T>) {
        self.values.clone_from(&other.values);
        self.nr_assigned = other.nr_assigned;
    }
}
