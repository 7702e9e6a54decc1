//! Great deluge configuration.

use crate::properties::Properties;

/// Configuration for [`GreatDeluge`](super::GreatDeluge).
///
/// # Examples
///
/// ```
/// use u_localsearch::gd::GdConfig;
///
/// let config = GdConfig::default()
///     .with_cool_rate(0.99999)
///     .with_bound_rates(1.1, 0.9);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GdConfig {
    /// Per-iteration decay of the water level, in (0, 1) (`CoolRate`).
    pub cool_rate: f64,

    /// Per-thread factors of the cool rate, indexed by `thread - 1`
    /// (`CoolRateAdjustments`).
    pub cool_rate_adjustments: Option<Vec<Option<f64>>>,

    /// Upper band as a multiple of the best value, `> 1`
    /// (`UpperBoundRate`).
    pub upper_bound_rate: f64,

    /// Lower band as a multiple of the best value, in (0, 1)
    /// (`LowerBoundRate`).
    pub lower_bound_rate: f64,
}

impl Default for GdConfig {
    fn default() -> Self {
        Self {
            cool_rate: 0.9999999,
            cool_rate_adjustments: None,
            upper_bound_rate: 1.05,
            lower_bound_rate: 0.95,
        }
    }
}

impl GdConfig {
    /// Reads `<base>.CoolRate`, `<base>.CoolRateAdjustments`,
    /// `<base>.UpperBoundRate` and `<base>.LowerBoundRate`.
    pub fn from_properties(props: &Properties, base: &str) -> Self {
        let d = Self::default();
        Self {
            cool_rate: props.get_f64(&format!("{base}.CoolRate"), d.cool_rate),
            cool_rate_adjustments: props.get_f64_list(&format!("{base}.CoolRateAdjustments")),
            upper_bound_rate: props.get_f64(&format!("{base}.UpperBoundRate"), d.upper_bound_rate),
            lower_bound_rate: props.get_f64(&format!("{base}.LowerBoundRate"), d.lower_bound_rate),
        }
        .normalized()
    }

    pub fn with_cool_rate(mut self, rate: f64) -> Self {
        self.cool_rate = rate;
        self
    }

    pub fn with_cool_rate_adjustments(mut self, adjustments: Vec<Option<f64>>) -> Self {
        self.cool_rate_adjustments = Some(adjustments);
        self
    }

    pub fn with_bound_rates(mut self, upper: f64, lower: f64) -> Self {
        self.upper_bound_rate = upper;
        self.lower_bound_rate = lower;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.cool_rate <= 0.0 || self.cool_rate >= 1.0 {
            return Err(format!("cool_rate must be in (0, 1), got {}", self.cool_rate));
        }
        if self.upper_bound_rate <= 1.0 {
            return Err(format!(
                "upper_bound_rate must be greater than 1, got {}",
                self.upper_bound_rate
            ));
        }
        if self.lower_bound_rate <= 0.0 || self.lower_bound_rate >= 1.0 {
            return Err(format!(
                "lower_bound_rate must be in (0, 1), got {}",
                self.lower_bound_rate
            ));
        }
        Ok(())
    }

    /// Clamps illegal values to their defaults, logging each change.
    pub fn normalized(mut self) -> Self {
        let d = Self::default();
        if !(self.cool_rate > 0.0 && self.cool_rate < 1.0) {
            tracing::warn!(value = self.cool_rate, "CoolRate out of (0, 1), using {}", d.cool_rate);
            self.cool_rate = d.cool_rate;
        }
        if !(self.upper_bound_rate > 1.0) {
            tracing::warn!(
                value = self.upper_bound_rate,
                "UpperBoundRate must be greater than 1, using {}",
                d.upper_bound_rate
            );
            self.upper_bound_rate = d.upper_bound_rate;
        }
        if !(self.lower_bound_rate > 0.0 && self.lower_bound_rate < 1.0) {
            tracing::warn!(
                value = self.lower_bound_rate,
                "LowerBoundRate out of (0, 1), using {}",
                d.lower_bound_rate
            );
            self.lower_bound_rate = d.lower_bound_rate;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let c = GdConfig::default();
        assert!((c.cool_rate - 0.9999999).abs() < 1e-15);
        assert!((c.upper_bound_rate - 1.05).abs() < 1e-12);
        assert!((c.lower_bound_rate - 0.95).abs() < 1e-12);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_rates() {
        assert!(GdConfig::default().with_cool_rate(1.0).validate().is_err());
        assert!(GdConfig::default().with_bound_rates(0.9, 0.5).validate().is_err());
        assert!(GdConfig::default().with_bound_rates(1.1, 1.5).validate().is_err());
    }

    #[test]
    fn test_from_properties_normalizes() {
        let props = Properties::new()
            .with("GreatDeluge.CoolRate", "2")
            .with("GreatDeluge.UpperBoundRate", "1.2")
            .with("GreatDeluge.CoolRateAdjustments", ",0.99");
        let c = GdConfig::from_properties(&props, "GreatDeluge");
        assert!((c.cool_rate - 0.9999999).abs() < 1e-15);
        assert!((c.upper_bound_rate - 1.2).abs() < 1e-12);
        assert_eq!(c.cool_rate_adjustments, Some(vec![None, Some(0.99)]));
    }
}
