//! Great Deluge (GD).
//!
//! Threshold acceptance against a water level that sinks a little every
//! iteration; when it sinks below the lower band a new, wider pass starts.
//!
//! # References
//!
//! - Dueck (1993), "New Optimization Heuristics: The Great Deluge
//!   Algorithm and the Record-to-Record Travel"

mod config;
mod deluge;

pub use config::GdConfig;
pub use deluge::{DelugeState, GreatDeluge};
