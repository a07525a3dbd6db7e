//! The validation orchestrator: fan the event out to the applicable
//! validator subset, fan the results back in, merge.
//!
//! Validators run concurrently on scoped threads and none observes
//! another's output for the same event. A validator that panics or
//! overruns its deadline is replaced by a synthetic low-confidence
//! `SystemAnomaly` result — fail-closed, never batch-aborting.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use warden_config::WardenConfig;
use warden_model::{BatchVerdict, TelemetryEvent, ValidationResult, ValidatorKind};
use warden_physics::WorldProbe;
use warden_state::PlayerState;
use warden_validators::{
    BehaviorValidator, CausalValidator, MovementValidator, PacketFlowValidator,
    RealityDivergenceValidator, SignatureTable, Validator, VelocityValidator,
};

/// Owns the validator set and runs it against events.
pub struct ValidationOrchestrator {
    validators: Vec<Arc<dyn Validator>>,
    deadline: Duration,
}

impl ValidationOrchestrator {
    /// Builds the full validator set from configuration.
    pub fn new(config: &WardenConfig, probe: Arc<dyn WorldProbe>) -> Self {
        let validators: Vec<Arc<dyn Validator>> = vec![
            Arc::new(MovementValidator::new(
                config.movement.clone(),
                config.physics.clone(),
                probe,
            )),
            Arc::new(VelocityValidator::new(
                config.velocity.clone(),
                config.physics.clone(),
            )),
            Arc::new(PacketFlowValidator::new(
                config.packet.clone(),
                SignatureTable::builtin(),
            )),
            Arc::new(BehaviorValidator::new(config.behavior.clone())),
            Arc::new(CausalValidator::new(config.causal.clone())),
            Arc::new(RealityDivergenceValidator::new(
                config.divergence.clone(),
                config.physics.clone(),
            )),
        ];
        Self {
            validators,
            deadline: Duration::from_millis(config.pipeline.validator_deadline_ms),
        }
    }

    /// The validator kinds that apply to one event class.
    fn applicable(&self, event: &TelemetryEvent) -> Vec<Arc<dyn Validator>> {
        let wanted: &[ValidatorKind] = match event {
            TelemetryEvent::Movement(_) => {
                &[ValidatorKind::Movement, ValidatorKind::Divergence]
            }
            TelemetryEvent::Velocity(_) => &[ValidatorKind::Velocity],
            TelemetryEvent::Packet(_) => &[ValidatorKind::Packet],
            TelemetryEvent::Action(_) => &[ValidatorKind::Behavior, ValidatorKind::Causal],
            TelemetryEvent::Comprehensive { .. } => &ValidatorKind::ALL,
        };
        self.validators
            .iter()
            .filter(|v| wanted.contains(&v.kind()))
            .cloned()
            .collect()
    }

    /// Runs the applicable validators for one event and merges their
    /// results into a [`BatchVerdict`].
    pub fn run(
        &self,
        state: &Arc<PlayerState>,
        event: &TelemetryEvent,
        now_ms: u64,
    ) -> BatchVerdict {
        let subset = self.applicable(event);
        let player_id = event.player_id();
        let timestamp_ms = event.timestamp_ms();

        let results: Vec<ValidationResult> = if subset.len() == 1 {
            // Single validator: no point paying for a thread.
            vec![self.run_one(subset[0].as_ref(), state, event, now_ms)]
        } else {
            // Fan-out on scoped threads; the join at scope exit is the
            // fan-in barrier.
            std::thread::scope(|scope| {
                let handles: Vec<_> = subset
                    .iter()
                    .map(|validator| {
                        scope.spawn(move || self.run_one(validator.as_ref(), state, event, now_ms))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|h| match h.join() {
                        Ok(result) => result,
                        // A panic inside run_one is already converted; a
                        // panic in the scaffolding itself lands here.
                        Err(_) => ValidationResult::failure(
                            ValidatorKind::Movement,
                            "validator thread panicked",
                            timestamp_ms,
                            player_id,
                        ),
                    })
                    .collect()
            })
        };

        BatchVerdict::merge(player_id, timestamp_ms, results)
    }

    /// Runs one validator with panic isolation and the deadline check.
    fn run_one(
        &self,
        validator: &dyn Validator,
        state: &PlayerState,
        event: &TelemetryEvent,
        now_ms: u64,
    ) -> ValidationResult {
        let kind = validator.kind();
        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| validator.validate(state, event, now_ms)));
        let elapsed = start.elapsed();

        match outcome {
            Ok(result) if elapsed <= self.deadline => result,
            Ok(_) => {
                tracing::warn!(
                    ?kind,
                    elapsed_us = elapsed.as_micros() as u64,
                    "validator exceeded its deadline; treating as failure"
                );
                ValidationResult::failure(
                    kind,
                    format!("deadline exceeded after {} µs", elapsed.as_micros()),
                    event.timestamp_ms(),
                    event.player_id(),
                )
            }
            Err(_) => {
                tracing::warn!(?kind, "validator panicked; treating as failure");
                ValidationResult::failure(
                    kind,
                    "validator panicked",
                    event.timestamp_ms(),
                    event.player_id(),
                )
            }
        }
    }

    /// The configured per-validator deadline.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use warden_model::{MovementEvent, PacketEvent, PacketKind, ViolationKind};
    use warden_physics::OpenWorld;
    use warden_state::PlayerRegistry;

    fn orchestrator() -> ValidationOrchestrator {
        ValidationOrchestrator::new(&WardenConfig::default(), Arc::new(OpenWorld))
    }

    #[test]
    fn test_movement_event_dispatches_movement_and_divergence() {
        let orch = orchestrator();
        let registry = PlayerRegistry::new(Default::default());
        let state = registry.get_or_create(1, 0);
        let ev = TelemetryEvent::Movement(MovementEvent {
            player_id: 1,
            timestamp_ms: 50,
            from: DVec3::new(0.0, 64.0, 0.0),
            to: DVec3::new(0.2, 64.0, 0.0),
            on_ground: true,
        });
        let verdict = orch.run(&state, &ev, 50);
        let kinds: Vec<_> = verdict.results.iter().map(|r| r.validator).collect();
        assert!(kinds.contains(&ValidatorKind::Movement));
        assert!(kinds.contains(&ValidatorKind::Divergence));
        assert_eq!(kinds.len(), 2);
    }

    #[test]
    fn test_packet_event_dispatches_single_validator() {
        let orch = orchestrator();
        let registry = PlayerRegistry::new(Default::default());
        let state = registry.get_or_create(1, 0);
        let ev = TelemetryEvent::Packet(PacketEvent {
            player_id: 1,
            kind: PacketKind::Movement,
            timestamp_ms: 50,
            estimated_size: 40,
        });
        let verdict = orch.run(&state, &ev, 50);
        assert_eq!(verdict.results.len(), 1);
        assert_eq!(verdict.results[0].validator, ValidatorKind::Packet);
    }

    #[test]
    fn test_comprehensive_dispatches_all_six() {
        let orch = orchestrator();
        let registry = PlayerRegistry::new(Default::default());
        let state = registry.get_or_create(1, 0);
        let ev = TelemetryEvent::Comprehensive {
            player_id: 1,
            timestamp_ms: 100,
        };
        let verdict = orch.run(&state, &ev, 100);
        assert_eq!(verdict.results.len(), 6);
        // Fresh player: everything clean, confidence 1.
        assert!(verdict.violations.is_empty());
        assert_eq!(verdict.confidence, 1.0);
    }

    #[test]
    fn test_verdict_confidence_never_exceeds_min_component() {
        let orch = orchestrator();
        let registry = PlayerRegistry::new(Default::default());
        // Seed a prior step so speed checks have a time base.
        let state = registry.update(1, 0, |s| {
            s.record_movement(&MovementEvent {
                player_id: 1,
                timestamp_ms: 0,
                from: DVec3::new(0.0, 64.0, 0.0),
                to: DVec3::new(0.0, 64.0, 0.0),
                on_ground: true,
            });
        });
        let ev = TelemetryEvent::Movement(MovementEvent {
            player_id: 1,
            timestamp_ms: 50,
            from: DVec3::new(0.0, 64.0, 0.0),
            to: DVec3::new(5.0, 64.0, 0.0),
            on_ground: true,
        });
        let verdict = orch.run(&state, &ev, 50);
        assert!(!verdict.violations.is_empty());
        let min = verdict
            .results
            .iter()
            .map(|r| r.confidence)
            .fold(1.0, f64::min);
        assert!(verdict.confidence <= min + 1e-12);
        assert!((0.0..=1.0).contains(&verdict.confidence));
    }

    #[test]
    fn test_panicking_validator_becomes_system_anomaly() {
        struct Exploder;
        impl Validator for Exploder {
            fn kind(&self) -> ValidatorKind {
                ValidatorKind::Behavior
            }
            fn validate(
                &self,
                _state: &PlayerState,
                _event: &TelemetryEvent,
                _now_ms: u64,
            ) -> ValidationResult {
                panic!("boom");
            }
        }

        let orch = ValidationOrchestrator {
            validators: vec![Arc::new(Exploder)],
            deadline: Duration::from_millis(5),
        };
        let registry = PlayerRegistry::new(Default::default());
        let state = registry.get_or_create(1, 0);
        let ev = TelemetryEvent::Action(warden_model::ActionEvent {
            player_id: 1,
            kind: warden_model::ActionKind::Attack,
            timestamp_ms: 10,
            position: DVec3::ZERO,
            target: None,
        });
        let verdict = orch.run(&state, &ev, 10);
        assert_eq!(verdict.results.len(), 1);
        assert_eq!(
            verdict.violations[0].kind,
            ViolationKind::SystemAnomaly
        );
        assert!(verdict.confidence <= 0.1);
    }

    #[test]
    fn test_deadline_overrun_becomes_system_anomaly() {
        struct Sleeper;
        impl Validator for Sleeper {
            fn kind(&self) -> ValidatorKind {
                ValidatorKind::Packet
            }
            fn validate(
                &self,
                _state: &PlayerState,
                _event: &TelemetryEvent,
                _now_ms: u64,
            ) -> ValidationResult {
                std::thread::sleep(Duration::from_millis(20));
                ValidationResult::clean(ValidatorKind::Packet, warden_model::ValidationDetail::None)
            }
        }

        let orch = ValidationOrchestrator {
            validators: vec![Arc::new(Sleeper)],
            deadline: Duration::from_millis(5),
        };
        let registry = PlayerRegistry::new(Default::default());
        let state = registry.get_or_create(1, 0);
        let ev = TelemetryEvent::Packet(PacketEvent {
            player_id: 1,
            kind: PacketKind::KeepAlive,
            timestamp_ms: 10,
            estimated_size: 8,
        });
        let verdict = orch.run(&state, &ev, 10);
        assert_eq!(verdict.violations.len(), 1);
        assert_eq!(verdict.violations[0].kind, ViolationKind::SystemAnomaly);
    }
}
