//! Hill climber configuration.

use crate::properties::Properties;
use std::fmt;
use std::str::FromStr;

/// Configuration for the [`HillClimber`](super::HillClimber).
///
/// # Examples
///
/// ```
/// use u_localsearch::hc::HillClimberConfig;
///
/// let config = HillClimberConfig::default().with_max_idle(500);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HillClimberConfig {
    /// Iterations without a strict improvement before the climb stops
    /// (`MaxIdle`).
    pub max_idle: u64,

    /// Tell hill-climb aware generators to propose only non-worsening
    /// moves.
    pub hc_mode: bool,
}

impl Default for HillClimberConfig {
    fn default() -> Self {
        Self {
            max_idle: 10_000,
            hc_mode: true,
        }
    }
}

impl HillClimberConfig {
    /// Reads `<base>.MaxIdle`.
    pub fn from_properties(props: &Properties, base: &str) -> Self {
        let d = Self::default();
        Self {
            max_idle: props.get_u64(&format!("{base}.MaxIdle"), d.max_idle),
            hc_mode: d.hc_mode,
        }
        .normalized()
    }

    pub fn with_max_idle(mut self, n: u64) -> Self {
        self.max_idle = n;
        self
    }

    pub fn with_hc_mode(mut self, hc_mode: bool) -> Self {
        self.hc_mode = hc_mode;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_idle == 0 {
            return Err("max_idle must be positive".into());
        }
        Ok(())
    }

    /// Clamps illegal values, logging each change.
    pub fn normalized(mut self) -> Self {
        if self.max_idle == 0 {
            tracing::warn!("MaxIdle must be positive, using 1");
            self.max_idle = 1;
        }
        self
    }
}

/// Which moves advance the step counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CounterMode {
    /// Every generated move.
    #[default]
    All,
    /// Accepted moves only.
    Accepted,
    /// Strictly improving accepted moves only.
    Improving,
}

impl FromStr for CounterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(CounterMode::All),
            "ACCEPTED" => Ok(CounterMode::Accepted),
            "IMPROVING" => Ok(CounterMode::Improving),
            other => Err(format!("unknown counter mode {other}")),
        }
    }
}

impl fmt::Display for CounterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CounterMode::All => "ALL",
            CounterMode::Accepted => "ACCEPTED",
            CounterMode::Improving => "IMPROVING",
        })
    }
}

/// Configuration for the [`StepCountingHillClimber`](super::StepCountingHillClimber).
///
/// # Examples
///
/// ```
/// use u_localsearch::hc::{CounterMode, StepCountingConfig};
///
/// let config = StepCountingConfig::default()
///     .with_counter_limit(500)
///     .with_counter_mode(CounterMode::Accepted);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepCountingConfig {
    /// Idle stop rule shared with the plain hill climber.
    pub hill_climber: HillClimberConfig,

    /// Counted moves before the bound is reset (`CounterLimit`).
    pub counter_limit: u64,

    /// Which moves are counted (`CounterMode`).
    pub counter_mode: CounterMode,

    /// Per-thread factors of the limit, indexed by `thread - 1`
    /// (`CounterLimitAdjustments`).
    pub counter_limit_adjustments: Option<Vec<Option<f64>>>,
}

impl Default for StepCountingConfig {
    fn default() -> Self {
        Self {
            hill_climber: HillClimberConfig::default(),
            counter_limit: 1000,
            counter_mode: CounterMode::All,
            counter_limit_adjustments: None,
        }
    }
}

impl StepCountingConfig {
    /// Reads `<base>.MaxIdle`, `<base>.CounterLimit`, `<base>.CounterMode`
    /// and `<base>.CounterLimitAdjustments`.
    pub fn from_properties(props: &Properties, base: &str) -> Self {
        let d = Self::default();
        let mode_key = format!("{base}.CounterMode");
        let counter_mode = match props.get(&mode_key) {
            None | Some("") => d.counter_mode,
            Some(raw) => raw.parse().unwrap_or_else(|e: String| {
                tracing::warn!(key = mode_key.as_str(), "{e}, using {}", d.counter_mode);
                d.counter_mode
            }),
        };
        Self {
            hill_climber: HillClimberConfig::from_properties(props, base),
            counter_limit: props.get_u64(&format!("{base}.CounterLimit"), d.counter_limit),
            counter_mode,
            counter_limit_adjustments: props.get_f64_list(&format!("{base}.CounterLimitAdjustments")),
        }
        .normalized()
    }

    pub fn with_max_idle(mut self, n: u64) -> Self {
        self.hill_climber.max_idle = n;
        self
    }

    pub fn with_counter_limit(mut self, n: u64) -> Self {
        self.counter_limit = n;
        self
    }

    pub fn with_counter_mode(mut self, mode: CounterMode) -> Self {
        self.counter_mode = mode;
        self
    }

    pub fn with_counter_limit_adjustments(mut self, adjustments: Vec<Option<f64>>) -> Self {
        self.counter_limit_adjustments = Some(adjustments);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.hill_climber.validate()?;
        if self.counter_limit == 0 {
            return Err("counter_limit must be positive".into());
        }
        Ok(())
    }

    /// Clamps illegal values, logging each change.
    pub fn normalized(mut self) -> Self {
        self.hill_climber = self.hill_climber.normalized();
        if self.counter_limit == 0 {
            tracing::warn!("CounterLimit must be positive, using 1");
            self.counter_limit = 1;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let c = StepCountingConfig::default();
        assert_eq!(c.hill_climber.max_idle, 10_000);
        assert_eq!(c.counter_limit, 1000);
        assert_eq!(c.counter_mode, CounterMode::All);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_counter_mode_parse() {
        assert_eq!("accepted".parse::<CounterMode>(), Ok(CounterMode::Accepted));
        assert_eq!(" IMPROVING ".parse::<CounterMode>(), Ok(CounterMode::Improving));
        assert!("sometimes".parse::<CounterMode>().is_err());
    }

    #[test]
    fn test_from_properties() {
        let props = Properties::new()
            .with("HillClimber.MaxIdle", "50")
            .with("HillClimber.CounterLimit", "7")
            .with("HillClimber.CounterMode", "bogus")
            .with("HillClimber.CounterLimitAdjustments", "1,2");
        let c = StepCountingConfig::from_properties(&props, "HillClimber");
        assert_eq!(c.hill_climber.max_idle, 50);
        assert_eq!(c.counter_limit, 7);
        assert_eq!(c.counter_mode, CounterMode::All);
        assert_eq!(c.counter_limit_adjustments, Some(vec![Some(1.0), Some(2.0)]));
    }

    #[test]
    fn test_normalized_clamps() {
        let c = StepCountingConfig::default().with_counter_limit(0).with_max_idle(0);
        assert!(c.validate().is_err());
        let c = c.normalized();
        assert_eq!(c.counter_limit, 1);
        assert_eq!(c.hill_climber.max_idle, 1);
    }
}
