//! SA configuration and temperature calibration.

use crate::properties::Properties;

/// Configuration for [`SimulatedAnnealing`](super::SimulatedAnnealing).
///
/// A non-positive `initial_temperature` switches on self-calibration: the
/// first `training_values` worsening moves are sampled and the
/// temperatures derived from their mean cost so that such a move would be
/// accepted with probability `training_probability` at the maximal
/// temperature (see [`Temperatures::train`]).
///
/// # Examples
///
/// ```
/// use u_localsearch::sa::SaConfig;
///
/// let config = SaConfig::default()
///     .with_initial_temperature(1.5)
///     .with_cooling_rate(0.97)
///     .with_temperature_length(1000);
/// assert!(config.validate().is_ok());
/// assert!(config.reheat_rate() > 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SaConfig {
    /// Starting temperature; `<= 0` means calibrate by training
    /// (`InitialTemperature`).
    pub initial_temperature: f64,

    /// Temperature above which reheating restores the best solution
    /// (`MaximalTemperature`). Derived by training or 1.5 when absent.
    pub maximal_temperature: Option<f64>,

    /// Temperature below which the schedule reheats
    /// (`MinimalTemperature`). Derived by training or 0 when absent.
    pub minimal_temperature: Option<f64>,

    /// Geometric cooling factor in (0, 1) (`CoolingRate`).
    pub cooling_rate: f64,

    /// Per-thread factors of the cooling rate, indexed by `thread - 1`
    /// (`CoolingRateAdjustments`).
    pub cooling_rate_adjustments: Option<Vec<Option<f64>>>,

    /// Reheat factor (`ReheatRate`); derived from the cooling rate when
    /// absent.
    pub reheat_rate: Option<f64>,

    /// Iterations per cooling step (`TemperatureLength`).
    pub temperature_length: u64,

    /// Reheat after `coef * temperature_length` idle iterations
    /// (`ReheatLengthCoef`).
    pub reheat_length_coef: f64,

    /// Restore the best after `coef * reheat_length` iterations without a
    /// new best (`RestoreBestLengthCoef`); defaults to `reheat_length_coef`.
    pub restore_best_length_coef: Option<f64>,

    /// Use `1 / (1 + exp(v / T))` instead of `exp(-v / T)` (`StochasticHC`).
    pub stochastic_hc: bool,

    /// Judge moves by their own cost instead of the resulting total
    /// against the best (`RelativeAcceptance`).
    pub relative_acceptance: bool,

    /// Worsening moves sampled during calibration (`TrainingValues`).
    pub training_values: u64,

    /// Target acceptance probability of an average worsening move at the
    /// maximal temperature (`TrainingProbability`).
    pub training_probability: f64,

    /// Wall-clock seconds per cooling step, used to size the temperature
    /// length after calibration (`TimeBetweenCooldowns`).
    pub time_between_cooldowns: f64,
}

impl Default for SaConfig {
    fn default() -> Self {
        Self {
            initial_temperature: -1.0,
            maximal_temperature: None,
            minimal_temperature: None,
            cooling_rate: 0.95,
            cooling_rate_adjustments: None,
            reheat_rate: None,
            temperature_length: 25_000,
            reheat_length_coef: 5.0,
            restore_best_length_coef: None,
            stochastic_hc: false,
            relative_acceptance: true,
            training_values: 10_000,
            training_probability: 1e-5,
            time_between_cooldowns: 10.0,
        }
    }
}

impl SaConfig {
    /// Reads the `<base>.*` keys listed on the fields.
    pub fn from_properties(props: &Properties, base: &str) -> Self {
        let d = Self::default();
        let key = |name: &str| format!("{base}.{name}");
        let optional = |name: &str| {
            let k = key(name);
            props.contains(&k).then(|| props.get_f64(&k, f64::NAN)).filter(|v| v.is_finite())
        };
        Self {
            initial_temperature: props.get_f64(&key("InitialTemperature"), d.initial_temperature),
            maximal_temperature: optional("MaximalTemperature").filter(|t| *t > 0.0),
            minimal_temperature: optional("MinimalTemperature").filter(|t| *t >= 0.0),
            cooling_rate: props.get_f64(&key("CoolingRate"), d.cooling_rate),
            cooling_rate_adjustments: props.get_f64_list(&key("CoolingRateAdjustments")),
            reheat_rate: optional("ReheatRate").filter(|r| *r > 0.0),
            temperature_length: props.get_u64(&key("TemperatureLength"), d.temperature_length),
            reheat_length_coef: props.get_f64(&key("ReheatLengthCoef"), d.reheat_length_coef),
            restore_best_length_coef: optional("RestoreBestLengthCoef").filter(|c| *c > 0.0),
            stochastic_hc: props.get_bool(&key("StochasticHC"), d.stochastic_hc),
            relative_acceptance: props.get_bool(&key("RelativeAcceptance"), d.relative_acceptance),
            training_values: props.get_u64(&key("TrainingValues"), d.training_values),
            training_probability: props.get_f64(&key("TrainingProbability"), d.training_probability),
            time_between_cooldowns: props.get_f64(&key("TimeBetweenCooldowns"), d.time_between_cooldowns),
        }
        .normalized()
    }

    pub fn with_initial_temperature(mut self, t: f64) -> Self {
        self.initial_temperature = t;
        self
    }

    pub fn with_maximal_temperature(mut self, t: f64) -> Self {
        self.maximal_temperature = Some(t);
        self
    }

    pub fn with_minimal_temperature(mut self, t: f64) -> Self {
        self.minimal_temperature = Some(t);
        self
    }

    pub fn with_cooling_rate(mut self, rate: f64) -> Self {
        self.cooling_rate = rate;
        self
    }

    pub fn with_cooling_rate_adjustments(mut self, adjustments: Vec<Option<f64>>) -> Self {
        self.cooling_rate_adjustments = Some(adjustments);
        self
    }

    pub fn with_reheat_rate(mut self, rate: f64) -> Self {
        self.reheat_rate = Some(rate);
        self
    }

    pub fn with_temperature_length(mut self, n: u64) -> Self {
        self.temperature_length = n;
        self
    }

    pub fn with_reheat_length_coef(mut self, coef: f64) -> Self {
        self.reheat_length_coef = coef;
        self
    }

    pub fn with_restore_best_length_coef(mut self, coef: f64) -> Self {
        self.restore_best_length_coef = Some(coef);
        self
    }

    pub fn with_stochastic_hc(mut self, stochastic: bool) -> Self {
        self.stochastic_hc = stochastic;
        self
    }

    pub fn with_relative_acceptance(mut self, relative: bool) -> Self {
        self.relative_acceptance = relative;
        self
    }

    pub fn with_training(mut self, values: u64, probability: f64) -> Self {
        self.training_values = values;
        self.training_probability = probability;
        self
    }

    pub fn with_time_between_cooldowns(mut self, secs: f64) -> Self {
        self.time_between_cooldowns = secs;
        self
    }

    /// True when the temperatures are calibrated by training.
    pub fn is_training(&self) -> bool {
        self.initial_temperature <= 0.0
    }

    /// Configured reheat rate, or `(1 / cooling_rate)^(1.7 * reheat_length_coef)`.
    pub fn reheat_rate(&self) -> f64 {
        self.reheat_rate
            .unwrap_or_else(|| (1.0 / self.cooling_rate).powf(self.reheat_length_coef * 1.7))
    }

    pub fn restore_best_length_coef(&self) -> f64 {
        self.restore_best_length_coef.unwrap_or(self.reheat_length_coef)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.cooling_rate <= 0.0 || self.cooling_rate >= 1.0 {
            return Err(format!("cooling_rate must be in (0, 1), got {}", self.cooling_rate));
        }
        if self.temperature_length == 0 {
            return Err("temperature_length must be positive".into());
        }
        if self.reheat_length_coef <= 0.0 {
            return Err("reheat_length_coef must be positive".into());
        }
        if let Some(rate) = self.reheat_rate {
            if rate <= 1.0 {
                return Err(format!("reheat_rate must be greater than 1, got {rate}"));
            }
        }
        if self.training_values == 0 {
            return Err("training_values must be positive".into());
        }
        if self.training_probability <= 0.0 || self.training_probability >= 1.0 {
            return Err("training_probability must be in (0, 1)".into());
        }
        if self.time_between_cooldowns <= 0.0 {
            return Err("time_between_cooldowns must be positive".into());
        }
        if let (Some(min), Some(max)) = (self.minimal_temperature, self.maximal_temperature) {
            if min >= max {
                return Err("minimal_temperature must be less than maximal_temperature".into());
            }
        }
        Ok(())
    }

    /// Clamps illegal values to their defaults, logging each change.
    pub fn normalized(mut self) -> Self {
        let d = Self::default();
        if !(self.cooling_rate > 0.0 && self.cooling_rate < 1.0) {
            tracing::warn!(value = self.cooling_rate, "CoolingRate out of (0, 1), using {}", d.cooling_rate);
            self.cooling_rate = d.cooling_rate;
        }
        if self.temperature_length == 0 {
            tracing::warn!("TemperatureLength must be positive, using 1");
            self.temperature_length = 1;
        }
        if !(self.reheat_length_coef > 0.0) {
            tracing::warn!("ReheatLengthCoef must be positive, using {}", d.reheat_length_coef);
            self.reheat_length_coef = d.reheat_length_coef;
        }
        if self.reheat_rate.is_some_and(|r| r <= 1.0) {
            tracing::warn!("ReheatRate must be greater than 1, deriving it from CoolingRate");
            self.reheat_rate = None;
        }
        if self.training_values == 0 {
            self.training_values = 1;
        }
        if !(self.training_probability > 0.0 && self.training_probability < 1.0) {
            tracing::warn!(
                value = self.training_probability,
                "TrainingProbability out of (0, 1), using {}",
                d.training_probability
            );
            self.training_probability = d.training_probability;
        }
        if !(self.time_between_cooldowns > 0.0) {
            self.time_between_cooldowns = d.time_between_cooldowns;
        }
        self
    }
}

/// Initial, maximal and minimal temperature of one annealing run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperatures {
    pub initial: f64,
    pub maximal: f64,
    pub minimal: f64,
}

impl Temperatures {
    /// Temperatures of a fixed schedule.
    pub fn fixed(config: &SaConfig) -> Self {
        Self {
            initial: config.initial_temperature,
            maximal: config.maximal_temperature.unwrap_or(1.5),
            minimal: config.minimal_temperature.unwrap_or(0.0),
        }
    }

    /// Calibrates from the mean cost `mean` of sampled worsening moves.
    ///
    /// Classic rule, solving `exp(-v / T) = p`:
    /// `initial = -v / ln(0.01 p)`, `maximal = -v / ln(p)`,
    /// `minimal = -0.1 / ln(p)`.
    ///
    /// Stochastic rule, solving `1 / (1 + exp(v / T)) = p`:
    /// `initial = v / ln(1 / (0.01 p) - 1)`, `maximal = v / ln(1 / p - 1)`,
    /// `minimal = 0.1 / ln(1 / p - 1)`.
    ///
    /// Configured maximal/minimal temperatures take precedence.
    pub fn train(mean: f64, config: &SaConfig) -> Self {
        let p = config.training_probability;
        let (initial, maximal, minimal) = if config.stochastic_hc {
            let ln_init = (1.0 / (0.01 * p) - 1.0).ln();
            let ln_p = (1.0 / p - 1.0).ln();
            (mean / ln_init, mean / ln_p, 0.1 / ln_p)
        } else {
            let ln_init = (0.01 * p).ln();
            let ln_p = p.ln();
            (-mean / ln_init, -mean / ln_p, -0.1 / ln_p)
        };
        Self {
            initial,
            maximal: config.maximal_temperature.unwrap_or(maximal),
            minimal: config.minimal_temperature.unwrap_or(minimal),
        }
    }
}

/// Probability of accepting a move of cost `value` at `temperature`.
///
/// Classic: 1 for `value <= 0`, `exp(-value / T)` otherwise.
/// Stochastic hill climbing: `1 / (1 + exp(value / T))`.
pub fn acceptance_probability(value: f64, temperature: f64, stochastic_hc: bool) -> f64 {
    if temperature <= 0.0 {
        return if value <= 0.0 { 1.0 } else { 0.0 };
    }
    if stochastic_hc {
        1.0 / (1.0 + (value / temperature).exp())
    } else if value <= 0.0 {
        1.0
    } else {
        (-value / temperature).exp()
    }
}
