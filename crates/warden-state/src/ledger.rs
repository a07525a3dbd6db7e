//! The per-player suspicion ledger.

use warden_model::EscalationState;

/// Accumulated, decaying record of a player's violation history.
///
/// The ledger is data only: every mutation goes through the escalation
/// state machine in `warden-engine`, which is the single writer per
/// player. The `epoch` counter increments on every mutation so a stale
/// concurrent update can be detected and retried rather than silently
/// overwriting a transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuspicionLedger {
    /// Current suspicion score (decayed lazily against `last_violation_ms`).
    pub score: f64,
    /// Total violations ever recorded.
    pub violation_count: u64,
    /// Current escalation state.
    pub state: EscalationState,
    /// When the last state transition happened, ms.
    pub last_transition_ms: u64,
    /// When the last violation was recorded, ms.
    pub last_violation_ms: u64,
    /// Mutation counter for race detection.
    pub epoch: u64,
}

impl SuspicionLedger {
    /// A fresh, clean ledger.
    pub fn new(now_ms: u64) -> Self {
        Self {
            score: 0.0,
            violation_count: 0,
            state: EscalationState::Clean,
            last_transition_ms: now_ms,
            last_violation_ms: now_ms,
            epoch: 0,
        }
    }

    /// The score after applying linear time decay up to `now_ms`.
    /// The stored score is untouched; decay is materialized by the
    /// escalation machine when it next writes.
    pub fn decayed_score(&self, now_ms: u64, decay_per_second: f64) -> f64 {
        let elapsed_s = now_ms.saturating_sub(self.last_violation_ms) as f64 / 1_000.0;
        (self.score - elapsed_s * decay_per_second).max(0.0)
    }
}
