//! String-keyed configuration surface.
//!
//! [`Properties`] holds options such as `SimulatedAnnealing.CoolingRate`
//! or `GreatDeluge.UpperBoundRate`. Typed getters fall back to the given
//! default when a key is missing or does not parse; unparsable values are
//! logged, never fatal.

use std::collections::BTreeMap;

/// In-memory key/value configuration.
///
/// # Examples
///
/// ```
/// use u_localsearch::Properties;
///
/// let props = Properties::new()
///     .with("HillClimber.MaxIdle", "500")
///     .with("SimulatedAnnealing.CoolingRateAdjustments", "1.0,,0.5");
///
/// assert_eq!(props.get_u64("HillClimber.MaxIdle", 10), 500);
/// assert_eq!(
///     props.get_f64_list("SimulatedAnnealing.CoolingRateAdjustments"),
///     Some(vec![Some(1.0), None, Some(0.5)])
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.trim())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterates over all `(key, value)` entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn parse_or<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        match self.get(key) {
            None | Some("") => default,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(key, value = raw, "unparsable property, using default");
                default
            }),
        }
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.parse_or(key, default)
    }

    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.parse_or(key, default)
    }

    pub fn get_usize(&self, key: &str, default: usize) -> usize {
        self.parse_or(key, default)
    }

    /// Reads `true`/`false` (also `1`/`0`, `yes`/`no`, case-insensitive).
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key).map(str::to_ascii_lowercase).as_deref() {
            None | Some("") => default,
            Some("true" | "1" | "yes" | "on") => true,
            Some("false" | "0" | "no" | "off") => false,
            Some(raw) => {
                tracing::warn!(key, value = raw, "unparsable boolean property, using default");
                default
            }
        }
    }

    /// Reads a comma-separated list of numbers; empty or invalid entries
    /// become `None` (used for per-thread adjustment arrays).
    pub fn get_f64_list(&self, key: &str) -> Option<Vec<Option<f64>>> {
        let raw = self.get(key)?;
        if raw.is_empty() {
            return None;
        }
        Some(
            raw.split(',')
                .map(|item| item.trim().parse::<f64>().ok())
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Properties::new();
        for (k, v) in iter {
            props.set(k, v);
        }
        props
    }
}

/// Looks up `base` scaled by the adjustment of thread slot `idx`.
///
/// Missing arrays, out-of-range indices and empty entries leave `base`
/// unchanged.
pub(crate) fn adjusted(base: f64, adjustments: Option<&[Option<f64>]>, idx: Option<usize>) -> f64 {
    match (adjustments, idx) {
        (Some(adj), Some(i)) => match adj.get(i) {
            Some(Some(factor)) => base * factor,
            _ => base,
        },
        _ => base,
    }
}
