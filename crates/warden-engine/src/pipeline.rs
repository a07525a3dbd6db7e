//! The event pipeline and engine facade.
//!
//! Events fan out across a worker pool, routed by player id so one
//! player's events are always applied by the same worker in arrival
//! order (single logical writer per key), while distinct players proceed
//! in parallel. Disconnects travel through the same per-worker queue, so
//! in-flight events for the player drain before the state is evicted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use dashmap::DashMap;
use warden_config::WardenConfig;
use warden_model::{
    EscalationState, PlayerId, SuspicionState, TelemetryEvent, ThreatLevel, ValidationDetail,
};
use warden_physics::{Environment, OpenWorld, WorldProbe};
use warden_state::{PlayerRegistry, ServerReality};
use warden_validators::measure_divergence;

use crate::dispatch::{EnforcementDispatcher, EngineOutput};
use crate::error::PipelineError;
use crate::escalation::apply_violation_batch;
use crate::orchestrator::ValidationOrchestrator;
use crate::rollback::RollbackEngine;
use crate::stats::{PlayerValidatorStats, StatsStore};

/// A message on a worker's queue.
enum WorkerMsg {
    /// Validate and commit one event.
    Event(TelemetryEvent),
    /// Drain point reached: evict the player's state.
    Disconnect(PlayerId),
}

/// Everything the workers share.
struct EngineCore {
    config: WardenConfig,
    registry: PlayerRegistry,
    orchestrator: ValidationOrchestrator,
    rollback: RollbackEngine,
    stats: StatsStore,
    dispatcher: EnforcementDispatcher,
    /// Players for whom no further events may be dispatched.
    disconnected: DashMap<PlayerId, ()>,
    /// Escalation races observed (stale epoch recomputed under the lock).
    race_retries: AtomicU64,
    /// Events dropped because a worker queue was full.
    dropped_events: AtomicU64,
}

impl EngineCore {
    /// Validates one event and commits its effects atomically.
    fn process(&self, event: TelemetryEvent) {
        let player_id = event.player_id();
        let now_ms = event.timestamp_ms();

        // 1. Pre-event snapshot.
        let snapshot = self.registry.get_or_create(player_id, now_ms);

        // 2. Fan-out / fan-in.
        let verdict = self.orchestrator.run(&snapshot, &event, now_ms);

        let wants_rollback = verdict.results.iter().any(|r| match r.detail {
            ValidationDetail::Velocity {
                freeze_recommended, ..
            } => freeze_recommended,
            ValidationDetail::Divergence {
                rollback_recommended,
                ..
            } => rollback_recommended,
            _ => false,
        });

        // 3. Commit event + ledger in one atomic registry update. The
        // epoch check surfaces concurrent writers: the closure always
        // recomputes from the state under the lock, so a race is retried
        // by construction, never dropped.
        let expected_epoch = snapshot.ledger.epoch;
        let mut outcome = None;
        let new_state = self.registry.update(player_id, now_ms, |s| {
            if s.ledger.epoch != expected_epoch {
                self.race_retries.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(player_id, "escalation race detected; recomputing under lock");
            }

            self.commit_event(s, &event, now_ms);
            outcome = Some(apply_violation_batch(
                &mut s.ledger,
                &verdict.violations,
                now_ms,
                &self.config.escalation,
            ));
        });

        // 4. Enforcement and rollback outputs.
        if let Some(outcome) = outcome
            && let Some(decision) =
                EnforcementDispatcher::build_decision(player_id, &outcome, &verdict.violations)
        {
            self.dispatcher.dispatch_decision(decision);
        }
        if wants_rollback
            && let Some(command) = self.rollback.rollback(
                player_id,
                new_state.reality.position,
                new_state.reality.velocity,
            )
        {
            self.dispatcher.dispatch_rollback(command);
        }

        // 5. Bookkeeping.
        self.stats.record(&verdict);
        if verdict.threat >= ThreatLevel::High {
            tracing::warn!(
                player_id,
                threat = ?verdict.threat,
                violations = verdict.violations.len(),
                confidence = verdict.confidence,
                "validation batch flagged"
            );
        } else if !verdict.violations.is_empty() || self.config.debug.log_clean_batches {
            tracing::debug!(
                player_id,
                threat = ?verdict.threat,
                violations = verdict.violations.len(),
                "validation batch"
            );
        }
    }

    /// Applies one event's state effects inside the registry update.
    fn commit_event(&self, s: &mut warden_state::PlayerState, event: &TelemetryEvent, now_ms: u64) {
        match event {
            TelemetryEvent::Movement(ev) => {
                let first = s.movement.is_empty();
                let dt_s =
                    ev.timestamp_ms.saturating_sub(s.last_event_ms).max(1) as f64 / 1_000.0;

                // Mirror the divergence validator's verdict for counter
                // bookkeeping, against the same pre-commit state.
                let diverged = if first {
                    false
                } else {
                    let reported_velocity = (ev.to - ev.from) / dt_s;
                    let reported_env = Environment {
                        grounded: ev.on_ground,
                        ..s.environment
                    };
                    measure_divergence(
                        &s.reality,
                        ev.to,
                        reported_velocity,
                        reported_env,
                        dt_s,
                        &self.config.divergence,
                        &self.config.physics,
                    )
                    .total
                        > self.config.divergence.tolerance
                };

                s.record_movement(ev);

                if first {
                    // First step anchors the simulated reality.
                    s.reality = ServerReality::anchored_at(ev.to, now_ms);
                    s.reality.environment = s.environment;
                } else {
                    s.reality.advance(dt_s, &self.config.physics);
                    let anchor_pos = s.reality.position;
                    let anchor_vel = s.reality.velocity;
                    s.reality.observe(
                        diverged,
                        anchor_pos,
                        anchor_vel,
                        now_ms,
                        self.config.divergence.counter_threshold,
                        self.config.divergence.resync_cooldown_ms,
                    );
                    if !diverged {
                        // Trusted step: reality tracks the client so honest
                        // drift never accumulates.
                        s.reality.position = s.position;
                        s.reality.velocity = s.velocity;
                        s.reality.environment = s.environment;
                    }
                }
            }
            TelemetryEvent::Action(ev) => {
                s.record_action(ev, self.config.causal.timeout_ms);
            }
            TelemetryEvent::Packet(ev) => {
                s.record_packet(ev);
            }
            TelemetryEvent::Velocity(ev) => {
                s.record_velocity(ev);
            }
            TelemetryEvent::Comprehensive { .. } => {}
        }
    }

    /// Evicts a player once their queued events have drained.
    fn finish_disconnect(&self, player_id: PlayerId) {
        self.registry.evict(player_id);
        self.rollback.forget(player_id);
        self.stats.forget(player_id);
        tracing::info!(player_id, "player state evicted after disconnect");
    }
}

// ---------------------------------------------------------------------------
// WardenEngine
// ---------------------------------------------------------------------------

/// The engine facade hosts interact with.
pub struct WardenEngine {
    core: Arc<EngineCore>,
    worker_txs: Vec<Sender<WorkerMsg>>,
    output_rx: Receiver<EngineOutput>,
    workers: Vec<JoinHandle<()>>,
}

impl WardenEngine {
    /// Builds an engine with the given configuration and world probe.
    pub fn new(config: WardenConfig, probe: Arc<dyn WorldProbe>) -> Self {
        let worker_count = if config.pipeline.workers == 0 {
            (num_cpus::get().max(2) - 1).max(1)
        } else {
            config.pipeline.workers
        };

        let (output_tx, output_rx) = bounded(config.pipeline.decision_capacity);
        let orchestrator = ValidationOrchestrator::new(&config, probe);
        let registry = PlayerRegistry::new(config.history.clone());

        let core = Arc::new(EngineCore {
            orchestrator,
            registry,
            rollback: RollbackEngine::new(),
            stats: StatsStore::new(),
            dispatcher: EnforcementDispatcher::new(output_tx),
            disconnected: DashMap::new(),
            race_retries: AtomicU64::new(0),
            dropped_events: AtomicU64::new(0),
            config,
        });

        let mut worker_txs = Vec::with_capacity(worker_count);
        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let (tx, rx) = bounded::<WorkerMsg>(core.config.pipeline.queue_capacity);
            let core = Arc::clone(&core);
            let handle = std::thread::Builder::new()
                .name(format!("warden-worker-{i}"))
                .spawn(move || {
                    while let Ok(msg) = rx.recv() {
                        match msg {
                            WorkerMsg::Event(event) => core.process(event),
                            WorkerMsg::Disconnect(player_id) => {
                                core.finish_disconnect(player_id);
                            }
                        }
                    }
                })
                .expect("failed to spawn warden worker thread");
            worker_txs.push(tx);
            workers.push(handle);
        }

        Self {
            core,
            worker_txs,
            output_rx,
            workers,
        }
    }

    /// An engine with default configuration and no collision geometry.
    pub fn with_defaults() -> Self {
        Self::new(WardenConfig::default(), Arc::new(OpenWorld))
    }

    /// Fixed event routing: one worker per player keeps per-player order.
    fn worker_for(&self, player_id: PlayerId) -> usize {
        (player_id % self.worker_txs.len() as u64) as usize
    }

    /// Submits one telemetry event for asynchronous validation.
    pub fn submit(&self, event: TelemetryEvent) -> Result<(), PipelineError> {
        let player_id = event.player_id();
        if self.core.disconnected.contains_key(&player_id) {
            return Err(PipelineError::Disconnected(player_id));
        }
        let idx = self.worker_for(player_id);
        match self.worker_txs[idx].try_send(WorkerMsg::Event(event)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.core.dropped_events.fetch_add(1, Ordering::Relaxed);
                Err(PipelineError::QueueFull(player_id))
            }
            Err(TrySendError::Disconnected(_)) => Err(PipelineError::ShutDown),
        }
    }

    /// Validates one event synchronously on the calling thread.
    ///
    /// For hosts that drive the engine from their own tick loop (and for
    /// tests); the asynchronous path and this one share all state.
    pub fn process_sync(&self, event: TelemetryEvent) -> Result<(), PipelineError> {
        let player_id = event.player_id();
        if self.core.disconnected.contains_key(&player_id) {
            return Err(PipelineError::Disconnected(player_id));
        }
        self.core.process(event);
        Ok(())
    }

    /// Marks a player disconnected. Queued events drain first; the state
    /// is evicted afterwards.
    pub fn disconnect(&self, player_id: PlayerId) {
        self.core.disconnected.insert(player_id, ());
        let idx = self.worker_for(player_id);
        if self.worker_txs[idx]
            .send(WorkerMsg::Disconnect(player_id))
            .is_err()
        {
            // Workers already gone; evict inline.
            self.core.finish_disconnect(player_id);
        }
    }

    /// Clears the disconnected mark when a player rejoins.
    pub fn reconnect(&self, player_id: PlayerId) {
        self.core.disconnected.remove(&player_id);
    }

    /// Evicts players idle longer than `idle_ms` before `now_ms`.
    /// Returns the evicted ids. Call periodically from the host tick.
    pub fn evict_idle(&self, now_ms: u64, idle_ms: u64) -> Vec<PlayerId> {
        let evicted = self.core.registry.evict_idle(now_ms, idle_ms);
        for id in &evicted {
            self.core.rollback.forget(*id);
            self.core.stats.forget(*id);
        }
        evicted
    }

    /// Drains all pending engine outputs. Call once per host tick.
    pub fn drain_outputs(&self) -> Vec<EngineOutput> {
        let mut outputs = Vec::new();
        while let Ok(output) = self.output_rx.try_recv() {
            outputs.push(output);
        }
        outputs
    }

    // -- Query surface ------------------------------------------------------

    /// Read-only projection of a player's suspicion ledger.
    pub fn suspicion_state(&self, player_id: PlayerId) -> Option<SuspicionState> {
        let snapshot = self.core.registry.snapshot(player_id)?;
        Some(SuspicionState {
            player_id,
            score: snapshot.ledger.score,
            violation_count: snapshot.ledger.violation_count,
            state: snapshot.ledger.state,
            last_transition_ms: snapshot.ledger.last_transition_ms,
        })
    }

    /// Players currently in the Quarantined state.
    pub fn active_quarantines(&self) -> Vec<PlayerId> {
        self.core
            .registry
            .player_ids()
            .into_iter()
            .filter(|id| {
                self.core
                    .registry
                    .snapshot(*id)
                    .is_some_and(|s| s.ledger.state == EscalationState::Quarantined)
            })
            .collect()
    }

    /// Per-validator statistics for one player.
    pub fn validator_stats(&self, player_id: PlayerId) -> Option<PlayerValidatorStats> {
        self.core.stats.get(player_id)
    }

    /// Escalation races observed so far (recomputed, never dropped).
    pub fn race_retries(&self) -> u64 {
        self.core.race_retries.load(Ordering::Relaxed)
    }

    /// Events dropped on full worker queues so far.
    pub fn dropped_events(&self) -> u64 {
        self.core.dropped_events.load(Ordering::Relaxed)
    }

    /// Tracked player count.
    pub fn player_count(&self) -> usize {
        self.core.registry.len()
    }

    /// Stops the workers and waits for them to drain.
    pub fn shutdown(mut self) {
        self.worker_txs.clear();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WardenEngine {
    fn drop(&mut self) {
        // Close the queues so workers exit their recv loop.
        self.worker_txs.clear();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use warden_model::{
        EnforcementAction, MovementEvent, TelemetryEvent, VelocityEvent,
    };

    fn engine() -> WardenEngine {
        let config = WardenConfig {
            pipeline: warden_config::PipelineConfig {
                workers: 2,
                // Generous deadline: CI machines are slow and a deadline
                // overrun would add SystemAnomaly noise to assertions.
                validator_deadline_ms: 1_000,
                ..Default::default()
            },
            ..Default::default()
        };
        WardenEngine::new(config, Arc::new(OpenWorld))
    }

    fn walk_step(player: u64, ts: u64, from_x: f64, to_x: f64) -> TelemetryEvent {
        TelemetryEvent::Movement(MovementEvent {
            player_id: player,
            timestamp_ms: ts,
            from: DVec3::new(from_x, 64.0, 0.0),
            to: DVec3::new(to_x, 64.0, 0.0),
            on_ground: true,
        })
    }

    /// A blatant speedhack step: 5 blocks in one tick.
    fn hack_step(player: u64, ts: u64, from_x: f64) -> TelemetryEvent {
        walk_step(player, ts, from_x, from_x + 5.0)
    }

    #[test]
    fn test_honest_player_stays_clean() {
        let engine = engine();
        let mut x = 0.0;
        for i in 1..=40u64 {
            engine
                .process_sync(walk_step(1, i * 50, x, x + 0.2))
                .unwrap();
            x += 0.2;
        }
        let state = engine.suspicion_state(1).expect("state");
        assert_eq!(state.state, EscalationState::Clean);
        assert_eq!(state.violation_count, 0);
        assert!(engine.drain_outputs().is_empty());
    }

    #[test]
    fn test_speed_hacker_escalates_to_quarantine_then_ban() {
        let engine = engine();
        let mut x = 0.0;
        let mut quarantined_at = None;
        let mut perm_banned_at = None;

        for i in 1..=20u64 {
            engine.process_sync(hack_step(1, i * 50, x)).unwrap();
            x += 5.0;
            let state = engine.suspicion_state(1).unwrap();
            if state.state == EscalationState::Quarantined && quarantined_at.is_none() {
                quarantined_at = Some(i);
            }
            if state.state == EscalationState::PermBanned {
                perm_banned_at = Some(i);
                break;
            }
        }

        assert!(quarantined_at.is_some(), "player never quarantined");
        assert!(perm_banned_at.is_some(), "player never perm banned");
        assert!(quarantined_at.unwrap() < perm_banned_at.unwrap());

        // The decisions were emitted in escalation order.
        let outputs = engine.drain_outputs();
        let actions: Vec<EnforcementAction> = outputs
            .iter()
            .filter_map(|o| match o {
                EngineOutput::Decision(d) => Some(d.action.clone()),
                _ => None,
            })
            .collect();
        assert!(actions.contains(&EnforcementAction::Quarantine));
        assert!(actions.contains(&EnforcementAction::PermBan));

        // PermBan is terminal: further events change nothing.
        engine.process_sync(hack_step(1, 10_000, x)).unwrap();
        assert_eq!(
            engine.suspicion_state(1).unwrap().state,
            EscalationState::PermBanned
        );
    }

    #[test]
    fn test_quarantine_query_lists_player() {
        let engine = engine();
        let mut x = 0.0;
        // Two hack steps put the score past 25 but under the ban band.
        for i in 1..=2u64 {
            engine.process_sync(hack_step(1, i * 50, x)).unwrap();
            x += 5.0;
        }
        assert_eq!(
            engine.suspicion_state(1).unwrap().state,
            EscalationState::Quarantined
        );
        assert_eq!(engine.active_quarantines(), vec![1]);
        // An honest second player never shows up.
        engine.process_sync(walk_step(2, 50, 0.0, 0.2)).unwrap();
        assert!(!engine.active_quarantines().contains(&2));
    }

    #[test]
    fn test_desync_emits_rollback_command() {
        let engine = engine();
        // Anchor movement state first.
        engine.process_sync(walk_step(1, 50, 0.0, 0.2)).unwrap();
        // Sustained, systematic velocity desync.
        for i in 1..=30u64 {
            engine
                .process_sync(TelemetryEvent::Velocity(VelocityEvent {
                    player_id: 1,
                    timestamp_ms: 50 + i * 50,
                    expected: DVec3::new(3.0, 0.0, 0.0),
                    actual: DVec3::new(9.0, 0.0, 0.0),
                }))
                .unwrap();
        }
        let outputs = engine.drain_outputs();
        assert!(
            outputs
                .iter()
                .any(|o| matches!(o, EngineOutput::Rollback(_))),
            "expected at least one rollback, got {outputs:?}"
        );
    }

    #[test]
    fn test_disconnect_evicts_state_and_blocks_events() {
        let engine = engine();
        engine.submit(walk_step(1, 50, 0.0, 0.2)).unwrap();
        engine.disconnect(1);

        // Give the worker time to drain the queue and evict.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while engine.player_count() > 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(engine.player_count(), 0);
        assert!(engine.suspicion_state(1).is_none());

        // Further events are refused until reconnect.
        let err = engine.submit(walk_step(1, 200, 0.0, 0.2)).unwrap_err();
        assert_eq!(err, PipelineError::Disconnected(1));

        engine.reconnect(1);
        assert!(engine.submit(walk_step(1, 300, 0.0, 0.2)).is_ok());
    }

    #[test]
    fn test_async_pipeline_processes_many_players() {
        let engine = engine();
        for player in 1..=8u64 {
            let mut x = 0.0;
            for i in 1..=10u64 {
                engine.submit(walk_step(player, i * 50, x, x + 0.2)).unwrap();
                x += 0.2;
            }
        }

        // Wait until every player's 10 events are committed.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        loop {
            let done = (1..=8u64).all(|p| {
                engine
                    .validator_stats(p)
                    .is_some_and(|s| s.batches == 10)
            });
            if done || std::time::Instant::now() > deadline {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        for player in 1..=8u64 {
            let stats = engine.validator_stats(player).expect("stats");
            assert_eq!(stats.batches, 10, "player {player}");
            let state = engine.suspicion_state(player).expect("state");
            assert_eq!(state.state, EscalationState::Clean);
        }
        assert_eq!(engine.race_retries(), 0);
    }

    #[test]
    fn test_validator_stats_track_runs() {
        let engine = engine();
        engine.process_sync(walk_step(1, 50, 0.0, 0.2)).unwrap();
        engine.process_sync(walk_step(1, 100, 0.2, 0.4)).unwrap();
        let stats = engine.validator_stats(1).expect("stats");
        assert_eq!(stats.batches, 2);
        let movement = stats.per_validator[&warden_model::ValidatorKind::Movement];
        assert_eq!(movement.runs, 2);
    }
}
