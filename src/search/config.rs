//! Options shared by every neighbourhood search.

use crate::properties::Properties;

/// Engine-level configuration common to all acceptance strategies.
///
/// Read from `<Base>.*` keys, where `<Base>` is the strategy's parameter
/// base name (e.g. `SimulatedAnnealing`).
///
/// # Examples
///
/// ```
/// use u_localsearch::search::SearchConfig;
///
/// let config = SearchConfig::default()
///     .with_neighbours("RandomMove;RandomSwapMove@0.1")
///     .with_adaptive_points(true)
///     .with_update_segment(500);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchConfig {
    /// Pick selectors uniformly instead of by weight (`Random`).
    pub random_selection: bool,

    /// Adapt selector points from their success (`Update`).
    pub adaptive_points: bool,

    /// Move generators, `Name[@bonus]` separated by `;` (`Neighbours`).
    pub neighbours: Option<String>,

    /// Generators appended to the default or configured list
    /// (`AdditionalNeighbours`).
    pub additional_neighbours: Option<String>,

    /// Give every thread its own control parameters (`IsolatedContexts`).
    pub isolated_contexts: bool,

    /// Iterations per points-update segment (`UpdateSegment`).
    pub update_segment: u64,

    /// Reaction factor of the points update, in (0, 1]
    /// (`UpdateReactionFactor`).
    pub reaction_factor: f64,

    /// Lower bound of the points as a fraction of the bonus.
    pub min_points_ratio: f64,

    /// Iterations between progress log lines.
    pub log_interval: u64,

    /// Seed of the per-thread search RNG (`Seed`); thread `i` uses
    /// `seed + i`. When absent the solution's RNG seeds it.
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            random_selection: false,
            adaptive_points: false,
            neighbours: None,
            additional_neighbours: None,
            isolated_contexts: false,
            update_segment: 1000,
            reaction_factor: 0.1,
            min_points_ratio: 0.1,
            log_interval: 100_000,
            seed: None,
        }
    }
}

impl SearchConfig {
    /// Reads `<base>.Random`, `<base>.Update`, `<base>.Neighbours`, ...
    pub fn from_properties(props: &Properties, base: &str) -> Self {
        let d = Self::default();
        let key = |name: &str| format!("{base}.{name}");
        let text = |name: &str| {
            props
                .get(&key(name))
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        Self {
            random_selection: props.get_bool(&key("Random"), d.random_selection),
            adaptive_points: props.get_bool(&key("Update"), d.adaptive_points),
            neighbours: text("Neighbours"),
            additional_neighbours: text("AdditionalNeighbours"),
            isolated_contexts: props.get_bool(&key("IsolatedContexts"), d.isolated_contexts),
            update_segment: props.get_u64(&key("UpdateSegment"), d.update_segment),
            reaction_factor: props.get_f64(&key("UpdateReactionFactor"), d.reaction_factor),
            min_points_ratio: d.min_points_ratio,
            log_interval: props.get_u64(&key("LogInterval"), d.log_interval),
            seed: text("Seed").and_then(|s| s.parse().ok()),
        }
        .normalized()
    }

    pub fn with_random_selection(mut self, random: bool) -> Self {
        self.random_selection = random;
        self
    }

    pub fn with_adaptive_points(mut self, update: bool) -> Self {
        self.adaptive_points = update;
        self
    }

    pub fn with_neighbours(mut self, neighbours: impl Into<String>) -> Self {
        self.neighbours = Some(neighbours.into());
        self
    }

    pub fn with_additional_neighbours(mut self, neighbours: impl Into<String>) -> Self {
        self.additional_neighbours = Some(neighbours.into());
        self
    }

    pub fn with_isolated_contexts(mut self, isolated: bool) -> Self {
        self.isolated_contexts = isolated;
        self
    }

    pub fn with_update_segment(mut self, n: u64) -> Self {
        self.update_segment = n;
        self
    }

    pub fn with_reaction_factor(mut self, rho: f64) -> Self {
        self.reaction_factor = rho;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.update_segment == 0 {
            return Err("update_segment must be positive".into());
        }
        if self.reaction_factor <= 0.0 || self.reaction_factor > 1.0 {
            return Err(format!(
                "reaction_factor must be in (0, 1], got {}",
                self.reaction_factor
            ));
        }
        if !(0.0..=1.0).contains(&self.min_points_ratio) {
            return Err("min_points_ratio must be in [0, 1]".into());
        }
        Ok(())
    }

    /// Clamps illegal values to their defaults, logging each change.
    pub fn normalized(mut self) -> Self {
        let d = Self::default();
        if self.update_segment == 0 {
            tracing::warn!("UpdateSegment must be positive, using {}", d.update_segment);
            self.update_segment = d.update_segment;
        }
        if !(self.reaction_factor > 0.0 && self.reaction_factor <= 1.0) {
            tracing::warn!(
                value = self.reaction_factor,
                "UpdateReactionFactor out of (0, 1], using {}",
                d.reaction_factor
            );
            self.reaction_factor = d.reaction_factor;
        }
        if self.log_interval == 0 {
            self.log_interval = d.log_interval;
        }
        self
    }
}
