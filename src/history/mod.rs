//! Combat history and audit logging
//!
//! Every roll and casualty decision is reported to an append-only sink so a
//! game client can replay, display, or audit a battle. The engine works
//! unchanged with the no-op sink.

use serde::{Deserialize, Serialize};

use crate::core::types::{PlayerId, TerritoryId, UnitId};
use crate::dice::{DiceRoll, DicePurpose};

/// One auditable combat event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CombatEvent {
    DiceRolled {
        purpose: DicePurpose,
        roll: DiceRoll,
    },
    CasualtiesSelected {
        player: PlayerId,
        killed: Vec<UnitId>,
        damaged: Vec<UnitId>,
        auto_selected: bool,
    },
    SelectionRejected {
        player: PlayerId,
        attempt: u32,
        reason: String,
    },
    AaMethodDegraded {
        requested: String,
        reason: String,
    },
    RocketTargeted {
        territory: TerritoryId,
        unit: Option<UnitId>,
    },
    RocketPayout {
        territory: TerritoryId,
        raw_damage: u32,
        applied_damage: u32,
    },
}

/// Append-only event sink
pub trait HistorySink {
    fn record(&mut self, event: CombatEvent);
}

/// Sink that drops everything; the engine's default
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHistory;

impl HistorySink for NoopHistory {
    fn record(&mut self, _event: CombatEvent) {}
}

/// Sink that keeps every event in memory, for tests and replay views
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    events: Vec<CombatEvent>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[CombatEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl HistorySink for MemoryHistory {
    fn record(&mut self, event: CombatEvent) {
        self.events.push(event);
    }
}
