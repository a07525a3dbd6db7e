//! Per-player state: bounded histories, entropy profile, causal action
//! log, suspicion ledger, and the concurrent registry that owns them.
//!
//! Player state is treated as an immutable snapshot behind an `Arc`:
//! readers clone the pointer and never observe a partially-applied
//! mutation. All writes go through [`PlayerRegistry::update`], which
//! clones the current snapshot, applies the transformation, validates
//! invariants, and swaps the pointer under the per-key entry lock.

mod entropy;
mod history;
mod ledger;
mod player;
mod records;
mod registry;

pub use entropy::{Ema, EntropyProfile};
pub use history::History;
pub use ledger::SuspicionLedger;
pub use player::{PlayerState, ServerReality};
pub use records::{
    BehaviorSample, CausalAction, CausalEdge, MovementRecord, PacketRecord, VelocityRecord,
};
pub use registry::PlayerRegistry;
