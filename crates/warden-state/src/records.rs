//! History record types stored per player.

use glam::DVec3;
use warden_model::{ActionKind, PacketKind};

/// One recorded movement step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementRecord {
    /// Event timestamp, ms.
    pub timestamp_ms: u64,
    /// Start of the step, blocks.
    pub from: DVec3,
    /// End of the step, blocks.
    pub to: DVec3,
    /// Claimed grounded flag.
    pub on_ground: bool,
    /// Wall-clock length of the step, ms.
    pub dt_ms: u64,
    /// Overall speed across the step, blocks/s.
    pub speed: f64,
}

/// One captured packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketRecord {
    /// Capture timestamp, ms.
    pub timestamp_ms: u64,
    /// Packet class.
    pub kind: PacketKind,
    /// Estimated size, bytes.
    pub size: u32,
}

/// One behavior sample (discrete action).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BehaviorSample {
    /// Action timestamp, ms.
    pub timestamp_ms: u64,
    /// What the player did.
    pub kind: ActionKind,
    /// Where, blocks.
    pub position: DVec3,
}

/// One entry in the causal action log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CausalAction {
    /// Action timestamp, ms.
    pub timestamp_ms: u64,
    /// What the player did.
    pub kind: ActionKind,
    /// Where, blocks.
    pub position: DVec3,
}

/// One (expected, actual) velocity pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityRecord {
    /// Report timestamp, ms.
    pub timestamp_ms: u64,
    /// Server-predicted velocity, blocks/s.
    pub expected: DVec3,
    /// Client-reported velocity, blocks/s.
    pub actual: DVec3,
}

/// A derived cause→effect edge between consecutive logged actions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CausalEdge {
    /// Earlier action.
    pub cause: ActionKind,
    /// Later action.
    pub effect: ActionKind,
    /// Time between them, ms.
    pub gap_ms: u64,
}
