//! The per-player state snapshot.

use glam::DVec3;
use warden_config::{HistoryConfig, PhysicsConfig};
use warden_model::{ActionEvent, ActionKind, MovementEvent, PacketEvent, PlayerId, VelocityEvent};
use warden_physics::{Environment, integrate_step};

use crate::entropy::EntropyProfile;
use crate::history::History;
use crate::ledger::SuspicionLedger;
use crate::records::{
    BehaviorSample, CausalAction, CausalEdge, MovementRecord, PacketRecord, VelocityRecord,
};

// ---------------------------------------------------------------------------
// ServerReality
// ---------------------------------------------------------------------------

/// The server's independently simulated state for one player.
///
/// Advanced with the same physics kernel the movement validator uses, so
/// "reality" and "reconstruction" never disagree about what legal motion
/// looks like. Re-anchored to the last trusted client state when a forced
/// resync fires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerReality {
    /// Simulated position, blocks.
    pub position: DVec3,
    /// Simulated velocity, blocks/s.
    pub velocity: DVec3,
    /// Simulated environment flags.
    pub environment: Environment,
    /// Consecutive over-tolerance divergences observed.
    pub divergence_counter: u32,
    /// When the last forced resync happened, ms.
    pub last_resync_ms: u64,
}

impl ServerReality {
    /// Seeds reality from a first-seen client state.
    pub fn anchored_at(position: DVec3, now_ms: u64) -> Self {
        Self {
            position,
            velocity: DVec3::ZERO,
            environment: Environment::default(),
            divergence_counter: 0,
            last_resync_ms: now_ms,
        }
    }

    /// Advances the simulation by `dt` seconds.
    pub fn advance(&mut self, dt: f64, cfg: &PhysicsConfig) {
        let (pos, vel) = integrate_step(self.position, self.velocity, self.environment, dt, cfg);
        self.position = pos;
        self.velocity = vel;
    }

    /// Records one divergence observation and applies counter/cooldown
    /// bookkeeping. Returns `true` when a forced resync should fire; the
    /// reality is then re-anchored to the trusted state so the next
    /// simulation step starts fresh.
    pub fn observe(
        &mut self,
        diverged: bool,
        trusted_position: DVec3,
        trusted_velocity: DVec3,
        now_ms: u64,
        counter_threshold: u32,
        cooldown_ms: u64,
    ) -> bool {
        if !diverged {
            self.divergence_counter = 0;
            return false;
        }
        self.divergence_counter += 1;
        let cooled = now_ms.saturating_sub(self.last_resync_ms) >= cooldown_ms;
        if self.divergence_counter >= counter_threshold && cooled {
            self.position = trusted_position;
            self.velocity = trusted_velocity;
            self.divergence_counter = 0;
            self.last_resync_ms = now_ms;
            true
        } else {
            false
        }
    }
}

// ---------------------------------------------------------------------------
// PlayerState
// ---------------------------------------------------------------------------

/// Everything the engine knows about one player.
///
/// Snapshots are immutable once published: mutation happens on a clone
/// inside [`crate::PlayerRegistry::update`] and the pointer is swapped
/// atomically.
#[derive(Debug, Clone)]
pub struct PlayerState {
    /// Stable player identifier.
    pub player_id: PlayerId,
    /// When this player was first seen, ms.
    pub created_ms: u64,
    /// Timestamp of the last applied event, ms.
    pub last_event_ms: u64,
    /// Last known position, blocks.
    pub position: DVec3,
    /// Last known velocity, blocks/s.
    pub velocity: DVec3,
    /// Last known environment flags.
    pub environment: Environment,
    /// Movement step history.
    pub movement: History<MovementRecord>,
    /// Packet capture history.
    pub packets: History<PacketRecord>,
    /// Behavior sample history.
    pub behavior: History<BehaviorSample>,
    /// Causal action log.
    pub causal: History<CausalAction>,
    /// (expected, actual) velocity pair window.
    pub velocity_pairs: History<VelocityRecord>,
    /// Derived cause→effect edges (pruned with the log).
    pub causal_edges: Vec<CausalEdge>,
    /// Longitudinal entropy EMAs.
    pub entropy: EntropyProfile,
    /// Suspicion ledger.
    pub ledger: SuspicionLedger,
    /// Server-simulated reality.
    pub reality: ServerReality,
    /// Timestamp of the last server-issued teleport, ms.
    pub last_teleport_ms: Option<u64>,
}

impl PlayerState {
    /// Creates a fresh state for a first-seen player.
    pub fn new(player_id: PlayerId, now_ms: u64, capacities: &HistoryConfig) -> Self {
        Self {
            player_id,
            created_ms: now_ms,
            last_event_ms: now_ms,
            position: DVec3::ZERO,
            velocity: DVec3::ZERO,
            environment: Environment::default(),
            movement: History::new(capacities.movement),
            packets: History::new(capacities.packets),
            behavior: History::new(capacities.behavior),
            causal: History::new(capacities.causal),
            velocity_pairs: History::new(capacities.velocity),
            causal_edges: Vec::new(),
            entropy: EntropyProfile::new(),
            ledger: SuspicionLedger::new(now_ms),
            reality: ServerReality::anchored_at(DVec3::ZERO, now_ms),
            last_teleport_ms: None,
        }
    }

    /// Applies a movement event: appends the record and rolls forward the
    /// last-known kinematic state.
    pub fn record_movement(&mut self, ev: &MovementEvent) {
        let dt_ms = ev
            .timestamp_ms
            .saturating_sub(self.last_event_ms)
            .max(1);
        let dt_s = dt_ms as f64 / 1_000.0;
        let delta = ev.to - ev.from;
        let speed = delta.length() / dt_s;

        self.movement.push(MovementRecord {
            timestamp_ms: ev.timestamp_ms,
            from: ev.from,
            to: ev.to,
            on_ground: ev.on_ground,
            dt_ms,
            speed,
        });

        self.position = ev.to;
        self.velocity = delta / dt_s;
        self.environment.grounded = ev.on_ground;
        self.last_event_ms = ev.timestamp_ms;
    }

    /// Applies a packet event.
    pub fn record_packet(&mut self, ev: &PacketEvent) {
        self.packets.push(PacketRecord {
            timestamp_ms: ev.timestamp_ms,
            kind: ev.kind,
            size: ev.estimated_size,
        });
        self.last_event_ms = self.last_event_ms.max(ev.timestamp_ms);
    }

    /// Applies a velocity report.
    pub fn record_velocity(&mut self, ev: &VelocityEvent) {
        self.velocity_pairs.push(VelocityRecord {
            timestamp_ms: ev.timestamp_ms,
            expected: ev.expected,
            actual: ev.actual,
        });
        self.last_event_ms = self.last_event_ms.max(ev.timestamp_ms);
    }

    /// Applies an action event: behavior sample, causal log entry, derived
    /// edge, entropy EMAs, and causal pruning.
    pub fn record_action(&mut self, ev: &ActionEvent, causal_timeout_ms: u64) {
        // Entropy observations against the previous sample.
        if let Some(prev) = self.behavior.back() {
            let gap_ms = ev.timestamp_ms.saturating_sub(prev.timestamp_ms) as f64;
            let displacement = ev.position.distance(prev.position);
            let surprise = self.kind_surprise_bits(ev.kind);
            self.entropy.observe(gap_ms, displacement, surprise);
        }

        self.behavior.push(BehaviorSample {
            timestamp_ms: ev.timestamp_ms,
            kind: ev.kind,
            position: ev.position,
        });

        if let Some(prev) = self.causal.back() {
            self.causal_edges.push(CausalEdge {
                cause: prev.kind,
                effect: ev.kind,
                gap_ms: ev.timestamp_ms.saturating_sub(prev.timestamp_ms),
            });
        }
        self.causal.push(CausalAction {
            timestamp_ms: ev.timestamp_ms,
            kind: ev.kind,
            position: ev.position,
        });

        if ev.kind == ActionKind::Teleport {
            self.last_teleport_ms = Some(ev.timestamp_ms);
        }

        self.prune_causal(ev.timestamp_ms, causal_timeout_ms);
        self.last_event_ms = self.last_event_ms.max(ev.timestamp_ms);
    }

    /// Drops causal entries older than the timeout window, keeping edges
    /// in lockstep.
    fn prune_causal(&mut self, now_ms: u64, timeout_ms: u64) {
        let cutoff = now_ms.saturating_sub(timeout_ms);
        let before = self.causal.len();
        self.causal
            .evict_front_while(|a| a.timestamp_ms < cutoff);
        let dropped = before - self.causal.len();
        if dropped > 0 && !self.causal_edges.is_empty() {
            let keep_from = dropped.min(self.causal_edges.len());
            self.causal_edges.drain(..keep_from);
        }
        // Edges can never outnumber actions - 1.
        let max_edges = self.causal.len().saturating_sub(1);
        if self.causal_edges.len() > max_edges {
            let excess = self.causal_edges.len() - max_edges;
            self.causal_edges.drain(..excess);
        }
    }

    /// −log2 of the estimated probability of `kind` given the current
    /// behavior history.
    fn kind_surprise_bits(&self, kind: ActionKind) -> f64 {
        let total = self.behavior.len();
        if total == 0 {
            return 0.0;
        }
        let count = self.behavior.iter().filter(|s| s.kind == kind).count();
        // Laplace-smoothed so unseen kinds stay finite.
        let p = (count as f64 + 1.0) / (total as f64 + 2.0);
        -p.log2()
    }

    /// Invariant check applied after every mutation. A `false` here means
    /// the snapshot is corrupt and must be replaced.
    pub fn invariants_hold(&self) -> bool {
        self.movement.len() <= self.movement.capacity()
            && self.packets.len() <= self.packets.capacity()
            && self.behavior.len() <= self.behavior.capacity()
            && self.causal.len() <= self.causal.capacity()
            && self.velocity_pairs.len() <= self.velocity_pairs.capacity()
            && self.causal_edges.len() <= self.causal.len().max(1)
            && self.ledger.score.is_finite()
            && self.ledger.score >= 0.0
            && self.position.is_finite()
            && self.velocity.is_finite()
    }
}
