//! Name-to-factory registry of strategies and move generators.
//!
//! Configuration refers to components by name, e.g.
//! `HillClimber.Neighbours = RandomMove;RandomSwapMove@0.01` or
//! `MetaHeuristic.ImprovementClass = GreatDeluge,SimulatedAnnealing`.
//! The registry resolves those names at build time. Unknown names are
//! reported by [`Registry::validate`]; when building, they are logged and
//! skipped.

use crate::gd::{GdConfig, GreatDeluge};
use crate::hc::{HillClimber, HillClimberConfig, StepCountingConfig, StepCountingHillClimber};
use crate::model::Model;
use crate::neighbourhoods::{Construction, RandomMove, RandomSwapMove};
use crate::phase::{MetaHeuristicSearch, SimpleSearch};
use crate::properties::Properties;
use crate::sa::{SaConfig, SimulatedAnnealing};
use crate::search::{AcceptanceStrategy, NeighbourSearch, NeighbourSelection, NeighbourSelector, SearchConfig};
use anyhow::{anyhow, bail, Context as _};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Neighbours used by every search unless `<base>.Neighbours` is set.
pub const DEFAULT_NEIGHBOURS: &str = "RandomMove;RandomSwapMove@0.01";

/// Builds a selection from the configuration.
pub type Factory<M> =
    Arc<dyn Fn(&Properties, &Registry<M>) -> anyhow::Result<Arc<dyn NeighbourSelection<M>>> + Send + Sync>;

/// Property prefixes of the stock searches.
const SEARCH_BASES: [&str; 3] = ["HillClimber", "SimulatedAnnealing", "GreatDeluge"];

/// Comma-separated lists of names read by the phase programs.
const NAME_LISTS: [&str; 5] = [
    "MetaHeuristic.ConstructionClass",
    "MetaHeuristic.IncompleteClass",
    "MetaHeuristic.HillClimberClass",
    "MetaHeuristic.ImprovementClass",
    "Construction.Class",
];

/// Parses `"A;B@0.01"` into `[("A", 1.0), ("B", 0.01)]`.
///
/// Empty entries are dropped. A weight that does not parse is logged and
/// replaced by 1.
pub fn parse_weighted_list(list: &str) -> Vec<(String, f64)> {
    list.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('@') {
            Some((name, weight)) => {
                let weight = weight.trim().parse().unwrap_or_else(|_| {
                    tracing::warn!(entry, "invalid neighbour weight, using 1");
                    1.0
                });
                (name.trim().to_owned(), weight)
            }
            None => (entry.to_owned(), 1.0),
        })
        .collect()
}

/// Registry of named factories.
pub struct Registry<M: Model> {
    factories: BTreeMap<String, Factory<M>>,
}

impl<M: Model> Default for Registry<M> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl<M: Model> Registry<M> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// All stock generators, strategies and phase programs.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("RandomMove", |_, _| Ok(Arc::new(RandomMove::new())));
        registry.register("RandomSwapMove", |props, _| {
            Ok(Arc::new(RandomSwapMove::from_properties(props)))
        });
        registry.register("Construction", |_, _| Ok(Arc::new(Construction::new())));
        registry.register("HillClimber", |props, registry| {
            let strategy = HillClimber::new(HillClimberConfig::from_properties(props, "HillClimber"));
            Ok(registry.build_search(strategy, props, "HillClimber"))
        });
        registry.register("StepCountingHillClimber", |props, registry| {
            let strategy = StepCountingHillClimber::new(StepCountingConfig::from_properties(props, "HillClimber"));
            Ok(registry.build_search(strategy, props, "HillClimber"))
        });
        registry.register("SimulatedAnnealing", |props, registry| {
            let strategy = SimulatedAnnealing::new(SaConfig::from_properties(props, "SimulatedAnnealing"));
            Ok(registry.build_search(strategy, props, "SimulatedAnnealing"))
        });
        registry.register("GreatDeluge", |props, registry| {
            let strategy = GreatDeluge::new(GdConfig::from_properties(props, "GreatDeluge"));
            Ok(registry.build_search(strategy, props, "GreatDeluge"))
        });
        registry.register("MetaHeuristicSearch", |props, registry| {
            Ok(Arc::new(MetaHeuristicSearch::from_properties(props, registry)))
        });
        registry.register("SimpleSearch", |props, registry| {
            Ok(Arc::new(SimpleSearch::from_properties(props, registry)?))
        });
        registry
    }

    /// Registers (or replaces) a factory.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Properties, &Registry<M>) -> anyhow::Result<Arc<dyn NeighbourSelection<M>>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Builds the selection registered under `name`.
    pub fn create(&self, name: &str, props: &Properties) -> anyhow::Result<Arc<dyn NeighbourSelection<M>>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| anyhow!("unknown selection '{name}'"))?;
        factory(props, self).with_context(|| format!("failed to build '{name}'"))
    }

    /// Weighted neighbour list of the search reading `<base>.*`.
    ///
    /// Uses `<base>.Neighbours` (default [`DEFAULT_NEIGHBOURS`]) followed
    /// by `<base>.AdditionalNeighbours`.
    pub fn neighbour_list(config: &SearchConfig) -> Vec<(String, f64)> {
        let mut list = parse_weighted_list(config.neighbours.as_deref().unwrap_or(DEFAULT_NEIGHBOURS));
        if let Some(additional) = &config.additional_neighbours {
            list.extend(parse_weighted_list(additional));
        }
        list
    }

    /// Builds the weighted selectors of a search; unknown or failing
    /// entries are logged and skipped.
    pub fn selectors(&self, config: &SearchConfig, props: &Properties) -> Vec<NeighbourSelector<M>> {
        Self::neighbour_list(config)
            .into_iter()
            .filter_map(|(name, weight)| match self.create(&name, props) {
                Ok(selection) => {
                    tracing::info!(name = %name, weight, "using neighbour selection");
                    Some(NeighbourSelector::new(selection, weight))
                }
                Err(e) => {
                    tracing::error!(name = %name, "unable to use {name}: {e:#}");
                    None
                }
            })
            .collect()
    }

    /// Wraps `strategy` in a [`NeighbourSearch`] configured from `<base>.*`.
    pub fn build_search<S>(&self, strategy: S, props: &Properties, base: &str) -> Arc<dyn NeighbourSelection<M>>
    where
        S: AcceptanceStrategy<M>,
    {
        let config = SearchConfig::from_properties(props, base);
        let selectors = self.selectors(&config, props);
        NeighbourSearch::new(strategy, config, selectors)
    }

    /// Checks that every name referenced by the configuration is known.
    pub fn validate(&self, props: &Properties) -> anyhow::Result<()> {
        let mut unknown = Vec::new();
        for base in SEARCH_BASES {
            let config = SearchConfig::from_properties(props, base);
            for (name, weight) in Self::neighbour_list(&config) {
                if !self.contains(&name) {
                    unknown.push(format!("{base}.Neighbours: {name}"));
                }
                if !(weight >= 0.0) {
                    unknown.push(format!("{base}.Neighbours: {name} has negative weight {weight}"));
                }
            }
        }
        for key in NAME_LISTS {
            let Some(raw) = props.get(key) else {
                continue;
            };
            for entry in raw.split(',').map(str::trim) {
                let name = entry.strip_suffix("@PC").unwrap_or(entry);
                if name.is_empty() || name.eq_ignore_ascii_case("null") {
                    continue;
                }
                if !self.contains(name) {
                    unknown.push(format!("{key}: {name}"));
                }
            }
        }
        if unknown.is_empty() {
            return Ok(());
        }
        bail!("invalid configuration: {}", unknown.join(", "))
    }
}
