//! Telemetry events delivered by the host game server. The host owns all
//! packet decoding; every event arrives already typed.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Stable player identifier assigned by the host.
pub type PlayerId = u64;

// ---------------------------------------------------------------------------
// Action and packet kinds
// ---------------------------------------------------------------------------

/// Discrete player actions reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Melee or ranged attack on an entity.
    Attack,
    /// Damage was dealt to another entity.
    DamageDealt,
    /// The player died.
    Death,
    /// A block was broken.
    BreakBlock,
    /// A block was placed.
    BlockPlace,
    /// An item entered the player's inventory.
    ItemPickup,
    /// An item was crafted.
    Craft,
    /// An item was dropped.
    ItemDrop,
    /// The player interacted with a block or entity.
    Interact,
    /// The player jumped.
    Jump,
    /// The player was teleported by the server.
    Teleport,
    /// A chat message was sent.
    Chat,
    /// The player moved (synthesized from movement telemetry for the
    /// behavior stream).
    Move,
}

impl ActionKind {
    /// Coarse category used for context-switch analysis in the behavior
    /// validator.
    pub fn category(self) -> ActionCategory {
        match self {
            Self::Attack | Self::DamageDealt | Self::Death => ActionCategory::Combat,
            Self::BreakBlock | Self::BlockPlace => ActionCategory::Building,
            Self::ItemPickup | Self::Craft | Self::ItemDrop => ActionCategory::Inventory,
            Self::Interact | Self::Chat => ActionCategory::Social,
            Self::Jump | Self::Teleport | Self::Move => ActionCategory::Movement,
        }
    }
}

/// Coarse grouping of [`ActionKind`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionCategory {
    Combat,
    Building,
    Inventory,
    Social,
    Movement,
}

/// Network packet classes reported by the capture layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PacketKind {
    /// Position/look update.
    Movement,
    /// Arm swing / use-item.
    Swing,
    /// Entity interaction (attack or use).
    UseEntity,
    /// Block dig start/stop/abort.
    Dig,
    /// Block placement.
    Place,
    /// Held-item slot change.
    HeldItem,
    /// Inventory click.
    Window,
    /// Keep-alive response.
    KeepAlive,
    /// Chat message.
    Chat,
    /// Client settings or plugin channel.
    Settings,
    /// Player ability toggle (fly, sprint).
    Abilities,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// One reported movement step: the client claims it moved from `from` to
/// `to` over the wall-clock interval ending at `timestamp_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementEvent {
    /// Player identifier.
    pub player_id: PlayerId,
    /// Event timestamp in milliseconds since an arbitrary host epoch.
    pub timestamp_ms: u64,
    /// Position at the start of the step, in blocks.
    pub from: DVec3,
    /// Claimed position at the end of the step, in blocks.
    pub to: DVec3,
    /// Whether the client claims to be standing on solid ground.
    pub on_ground: bool,
}

/// A discrete player action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    /// Player identifier.
    pub player_id: PlayerId,
    /// What the player did.
    pub kind: ActionKind,
    /// Event timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// Where the action happened, in blocks.
    pub position: DVec3,
    /// Target entity id, when the action has one.
    pub target: Option<u64>,
}

/// A captured network packet (metadata only; content stays with the host).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketEvent {
    /// Player identifier.
    pub player_id: PlayerId,
    /// Packet class.
    pub kind: PacketKind,
    /// Capture timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// Estimated serialized size in bytes.
    pub estimated_size: u32,
}

/// Server-predicted vs client-reported velocity for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityEvent {
    /// Player identifier.
    pub player_id: PlayerId,
    /// Event timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// Velocity the server expects (knockback, gravity), blocks/s.
    pub expected: DVec3,
    /// Velocity the client reported, blocks/s.
    pub actual: DVec3,
}

/// Any telemetry event the engine accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    /// A movement step.
    Movement(MovementEvent),
    /// A discrete action.
    Action(ActionEvent),
    /// A captured packet.
    Packet(PacketEvent),
    /// A velocity report.
    Velocity(VelocityEvent),
    /// Run every validator against the player's current state.
    Comprehensive {
        /// Player identifier.
        player_id: PlayerId,
        /// Timestamp in milliseconds.
        timestamp_ms: u64,
    },
}

impl TelemetryEvent {
    /// The player this event belongs to.
    pub fn player_id(&self) -> PlayerId {
        match self {
            Self::Movement(e) => e.player_id,
            Self::Action(e) => e.player_id,
            Self::Packet(e) => e.player_id,
            Self::Velocity(e) => e.player_id,
            Self::Comprehensive { player_id, .. } => *player_id,
        }
    }

    /// The event timestamp in milliseconds.
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            Self::Movement(e) => e.timestamp_ms,
            Self::Action(e) => e.timestamp_ms,
            Self::Packet(e) => e.timestamp_ms,
            Self::Velocity(e) => e.timestamp_ms,
            Self::Comprehensive { timestamp_ms, .. } => *timestamp_ms,
        }
    }
}
