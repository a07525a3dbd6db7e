//! Enforcement outputs handed to the host, and the escalation states they
//! derive from.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::event::PlayerId;
use crate::violation::Evidence;

// ---------------------------------------------------------------------------
// Escalation states
// ---------------------------------------------------------------------------

/// Escalation ladder for a player's suspicion ledger.
///
/// Transitions move forward (`Clean → Warned → Quarantined → TempBanned →
/// PermBanned`) as the suspicion score crosses thresholds; `Warned` and
/// `Quarantined` decay back to `Clean` after a violation-free period.
/// `PermBanned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EscalationState {
    /// No outstanding suspicion.
    #[default]
    Clean,
    /// Below the quarantine threshold but above zero.
    Warned,
    /// Restricted pending investigation.
    Quarantined,
    /// Temporarily removed; releases back to Quarantined when the ban
    /// duration elapses.
    TempBanned,
    /// Permanently removed. Never decays.
    PermBanned,
}

impl EscalationState {
    /// Forward ordering on the ladder (Clean = 0 … PermBanned = 4).
    pub fn rank(self) -> u8 {
        match self {
            Self::Clean => 0,
            Self::Warned => 1,
            Self::Quarantined => 2,
            Self::TempBanned => 3,
            Self::PermBanned => 4,
        }
    }

    /// `true` for the terminal state.
    pub fn is_terminal(self) -> bool {
        self == Self::PermBanned
    }
}

// ---------------------------------------------------------------------------
// Enforcement
// ---------------------------------------------------------------------------

/// The abstract enforcement action the host should execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EnforcementAction {
    /// No action required.
    None,
    /// Send the player a warning message.
    Warn,
    /// Restrict the player pending investigation.
    Quarantine,
    /// Remove the player for a bounded duration.
    TempBan {
        /// Ban length in milliseconds.
        duration_ms: u64,
    },
    /// Remove the player permanently.
    PermBan,
}

/// One enforcement decision for the host to execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnforcementDecision {
    /// Player the decision applies to.
    pub player_id: PlayerId,
    /// What to do.
    pub action: EnforcementAction,
    /// Human-readable reason (shown to operators, not players).
    pub reason: String,
    /// Evidence supporting the decision.
    pub evidence: Vec<Evidence>,
}

/// A corrective state the host should apply to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackCommand {
    /// Player to correct.
    pub player_id: PlayerId,
    /// Position to snap the client to, in blocks.
    pub target_position: DVec3,
    /// Velocity to snap the client to, in blocks/s.
    pub target_velocity: DVec3,
}

// ---------------------------------------------------------------------------
// Query projections
// ---------------------------------------------------------------------------

/// Read-only projection of a player's ledger for operator commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspicionState {
    /// Player identifier.
    pub player_id: PlayerId,
    /// Current decayed suspicion score.
    pub score: f64,
    /// Total violations recorded.
    pub violation_count: u64,
    /// Current escalation state.
    pub state: EscalationState,
    /// When the last state transition happened, in milliseconds.
    pub last_transition_ms: u64,
}
