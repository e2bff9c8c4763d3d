//! Core types, errors and rule configuration

pub mod config;
pub mod error;
pub mod types;

pub use config::{AaCasualtyMethod, RocketPayoutMode, RuleSet};
pub use error::{EngineError, Result};
pub use types::{PlayerId, ProductionUnits, TerritoryId, UnitId};
