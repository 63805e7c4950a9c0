//! Action counters accumulated over the agent's lifetime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of agent action that moves a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Harvest,
    Plant,
    Water,
    Weed,
    PestTreatment,
    Fertilize,
    Steal,
    Help,
    /// Sell transactions, counted per species sold.
    Sell,
    /// Gold received from selling.
    SellGold,
    TaskClaim,
}

/// Structured record of something a dependent loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPerformed {
    pub kind: ActionKind,
    pub quantity: u64,
}

impl ActionPerformed {
    #[must_use]
    pub const fn new(kind: ActionKind, quantity: u64) -> Self {
        Self { kind, quantity }
    }
}

/// Durable statistics record.
///
/// Counters only grow; [`StatsRecord::reset`] is the single exception.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsRecord {
    pub harvest_count: u64,
    pub plant_count: u64,
    pub water_count: u64,
    pub weed_count: u64,
    pub insect_count: u64,
    pub fertilize_count: u64,
    pub steal_count: u64,
    pub help_count: u64,
    pub sell_count: u64,
    pub sell_gold: u64,
    pub task_count: u64,
    pub last_update: Option<DateTime<Utc>>,
}

impl StatsRecord {
    fn counter_mut(&mut self, kind: ActionKind) -> &mut u64 {
        match kind {
            ActionKind::Harvest => &mut self.harvest_count,
            ActionKind::Plant => &mut self.plant_count,
            ActionKind::Water => &mut self.water_count,
            ActionKind::Weed => &mut self.weed_count,
            ActionKind::PestTreatment => &mut self.insect_count,
            ActionKind::Fertilize => &mut self.fertilize_count,
            ActionKind::Steal => &mut self.steal_count,
            ActionKind::Help => &mut self.help_count,
            ActionKind::Sell => &mut self.sell_count,
            ActionKind::SellGold => &mut self.sell_gold,
            ActionKind::TaskClaim => &mut self.task_count,
        }
    }

    /// Current value of the counter for `kind`.
    #[must_use]
    pub const fn counter(&self, kind: ActionKind) -> u64 {
        match kind {
            ActionKind::Harvest => self.harvest_count,
            ActionKind::Plant => self.plant_count,
            ActionKind::Water => self.water_count,
            ActionKind::Weed => self.weed_count,
            ActionKind::PestTreatment => self.insect_count,
            ActionKind::Fertilize => self.fertilize_count,
            ActionKind::Steal => self.steal_count,
            ActionKind::Help => self.help_count,
            ActionKind::Sell => self.sell_count,
            ActionKind::SellGold => self.sell_gold,
            ActionKind::TaskClaim => self.task_count,
        }
    }

    /// Add an action's quantity to its counter and stamp the record.
    pub fn apply(&mut self, action: ActionPerformed, now: DateTime<Utc>) {
        let counter = self.counter_mut(action.kind);
        *counter = counter.saturating_add(action.quantity);
        self.last_update = Some(now);
    }

    /// Zero every counter and stamp the record.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        *self = Self {
            last_update: Some(now),
            ..Self::default()
        };
    }

    /// Whether every counter is zero.
    #[must_use]
    pub fn is_zeroed(&self) -> bool {
        Self {
            last_update: self.last_update,
            ..Self::default()
        } == *self
    }
}
