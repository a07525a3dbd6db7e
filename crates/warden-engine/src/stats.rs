//! Per-player validator statistics for the operator query surface.

use dashmap::DashMap;
use rustc_hash::FxHashMap;
use warden_model::{BatchVerdict, PlayerId, ValidatorKind, ViolationKind};

/// Counters for one validator on one player.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ValidatorStat {
    /// Times this validator ran.
    pub runs: u64,
    /// Violations it produced.
    pub violations: u64,
    /// Confidence of its most recent result.
    pub last_confidence: f64,
}

/// Aggregated statistics for one player.
#[derive(Debug, Clone, Default)]
pub struct PlayerValidatorStats {
    /// Per-validator counters.
    pub per_validator: FxHashMap<ValidatorKind, ValidatorStat>,
    /// Validation batches processed.
    pub batches: u64,
    /// Synthetic failure results observed (panics, deadline overruns).
    pub failures: u64,
}

/// Concurrent stats store, updated after every batch.
pub struct StatsStore {
    players: DashMap<PlayerId, PlayerValidatorStats>,
}

impl StatsStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            players: DashMap::new(),
        }
    }

    /// Folds one verdict into the player's counters.
    pub fn record(&self, verdict: &BatchVerdict) {
        let mut entry = self.players.entry(verdict.player_id).or_default();
        entry.batches += 1;
        for result in &verdict.results {
            let stat = entry.per_validator.entry(result.validator).or_default();
            stat.runs += 1;
            stat.violations += result.violations.len() as u64;
            stat.last_confidence = result.confidence;
            if result
                .violations
                .iter()
                .any(|v| v.kind == ViolationKind::SystemAnomaly)
            {
                entry.failures += 1;
            }
        }
    }

    /// Snapshot of one player's stats.
    pub fn get(&self, player_id: PlayerId) -> Option<PlayerValidatorStats> {
        self.players.get(&player_id).map(|s| s.clone())
    }

    /// Drops a player's stats (on disconnect).
    pub fn forget(&self, player_id: PlayerId) {
        self.players.remove(&player_id);
    }
}

impl Default for StatsStore {
    fn default() -> Self {
        Self::new()
    }
}
