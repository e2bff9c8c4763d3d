//! Ironfront - Combat Resolution Engine
//!
//! The dice-to-hit, casualty-selection and bombardment core of a turn-based
//! grand strategy wargame. The surrounding game (turn scheduler, map model,
//! UI, transport) calls into this crate and applies the results it returns.

pub mod casualty;
pub mod core;
pub mod dice;
pub mod history;
pub mod ordering;
pub mod rocket;
pub mod unit;
pub mod value;
