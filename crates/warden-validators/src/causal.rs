//! Causal-chain validation: every effect needs a valid, preceding cause.
//!
//! A static prerequisite table drives the checks: picking an item up
//! requires a recent block break, crafting requires a recent pickup, and
//! so on. Temporal inversions, post-teleport movement inside the settle
//! window, and per-kind frequency ceilings are rejected independently.

use warden_config::CausalConfig;
use warden_model::{
    ActionEvent, ActionKind, Evidence, TelemetryEvent, ValidationDetail, ValidationResult,
    ValidatorKind, Violation, ViolationKind,
};
use warden_state::PlayerState;

use crate::Validator;

/// Causal-chain validator.
pub struct CausalValidator {
    cfg: CausalConfig,
}

/// Static prerequisite table: which action kinds must precede `kind`
/// within the causal timeout window. `None` means unconstrained.
fn prerequisites(kind: ActionKind) -> Option<&'static [ActionKind]> {
    match kind {
        ActionKind::ItemPickup => Some(&[ActionKind::BreakBlock]),
        ActionKind::Craft => Some(&[ActionKind::ItemPickup]),
        ActionKind::DamageDealt => Some(&[ActionKind::Attack]),
        ActionKind::Death => Some(&[ActionKind::DamageDealt]),
        ActionKind::BlockPlace => Some(&[ActionKind::ItemPickup]),
        _ => None,
    }
}

impl CausalValidator {
    /// Creates a validator with the given thresholds.
    pub fn new(cfg: CausalConfig) -> Self {
        Self { cfg }
    }

    /// Frequency ceiling for a kind, if one is configured.
    fn frequency_ceiling(&self, kind: ActionKind) -> Option<f64> {
        match kind {
            ActionKind::Attack => Some(self.cfg.max_attacks_per_sec),
            ActionKind::BlockPlace => Some(self.cfg.max_places_per_sec),
            ActionKind::BreakBlock => Some(self.cfg.max_breaks_per_sec),
            ActionKind::Interact => Some(self.cfg.max_interacts_per_sec),
            _ => None,
        }
    }

    fn validate_action(&self, state: &PlayerState, ev: &ActionEvent) -> ValidationResult {
        let mut violations = Vec::new();

        // Temporal ordering: an action may never precede its predecessor.
        if let Some(last) = state.causal.back()
            && ev.timestamp_ms < last.timestamp_ms
        {
            violations.push(Violation::new(
                ViolationKind::TemporalInversion,
                0.9,
                vec![Evidence::timing(
                    format!(
                        "{:?} at {} ms precedes the previous {:?} at {} ms",
                        ev.kind, ev.timestamp_ms, last.kind, last.timestamp_ms
                    ),
                    ev.timestamp_ms as f64,
                    0.9,
                )],
                ev.timestamp_ms,
                ev.player_id,
            ));
        }

        // Prerequisite lookup within the causal window.
        if let Some(required) = prerequisites(ev.kind) {
            let cutoff = ev.timestamp_ms.saturating_sub(self.cfg.timeout_ms);
            let satisfied = state.causal.iter().any(|a| {
                a.timestamp_ms >= cutoff
                    && a.timestamp_ms <= ev.timestamp_ms
                    && required.contains(&a.kind)
            });
            if !satisfied {
                violations.push(Violation::new(
                    ViolationKind::CausalViolation,
                    0.8,
                    vec![Evidence::pattern(
                        format!(
                            "{:?} with no {:?} in the preceding {} s",
                            ev.kind,
                            required,
                            self.cfg.timeout_ms / 1_000
                        ),
                        format!("{:?}", ev.kind),
                        0.8,
                    )],
                    ev.timestamp_ms,
                    ev.player_id,
                ));
            }
        }

        // Movement immediately after a teleport must wait out the settle
        // window.
        if ev.kind == ActionKind::Move
            && let Some(teleport_ms) = state.last_teleport_ms
            && ev.timestamp_ms.saturating_sub(teleport_ms) < self.cfg.teleport_settle_ms
        {
            violations.push(Violation::new(
                ViolationKind::CausalViolation,
                0.7,
                vec![Evidence::timing(
                    format!(
                        "movement {} ms after teleport (settle window {} ms)",
                        ev.timestamp_ms.saturating_sub(teleport_ms),
                        self.cfg.teleport_settle_ms
                    ),
                    ev.timestamp_ms.saturating_sub(teleport_ms) as f64,
                    0.7,
                )],
                ev.timestamp_ms,
                ev.player_id,
            ));
        }

        // Per-kind frequency ceiling over the trailing second.
        if let Some(ceiling) = self.frequency_ceiling(ev.kind) {
            let cutoff = ev.timestamp_ms.saturating_sub(1_000);
            let count = state
                .causal
                .iter()
                .filter(|a| a.kind == ev.kind && a.timestamp_ms > cutoff)
                .count()
                + 1; // the incoming action
            if count as f64 > ceiling {
                violations.push(Violation::new(
                    ViolationKind::CausalViolation,
                    ((count as f64 / ceiling - 1.0) * 2.0).clamp(0.6, 0.95),
                    vec![Evidence {
                        kind: warden_model::EvidenceKind::Statistic,
                        value: warden_model::EvidenceValue::Integer(count as i64),
                        confidence: 0.8,
                        description: format!(
                            "{count} {:?} actions in one second, ceiling {ceiling}",
                            ev.kind
                        ),
                    }],
                    ev.timestamp_ms,
                    ev.player_id,
                ));
            }
        }

        let confidence = violations
            .iter()
            .fold(1.0_f64, |c, v| c * (1.0 - 0.35 * v.confidence))
            .max(0.1);

        ValidationResult::flagged(
            ValidatorKind::Causal,
            violations,
            confidence,
            ValidationDetail::Causal {
                chain_len: state.causal.len() + 1,
                edge_count: state.causal_edges.len(),
            },
        )
    }
}

impl Validator for CausalValidator {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Causal
    }

    fn validate(
        &self,
        state: &PlayerState,
        event: &TelemetryEvent,
        _now_ms: u64,
    ) -> ValidationResult {
        match event {
            TelemetryEvent::Action(ev) => self.validate_action(state, ev),
            TelemetryEvent::Comprehensive { .. } => ValidationResult::clean(
                ValidatorKind::Causal,
                ValidationDetail::Causal {
                    chain_len: state.causal.len(),
                    edge_count: state.causal_edges.len(),
                },
            ),
            _ => ValidationResult::clean(ValidatorKind::Causal, ValidationDetail::None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use warden_config::HistoryConfig;

    fn validator() -> CausalValidator {
        CausalValidator::new(CausalConfig::default())
    }

    fn action_event(ts: u64, kind: ActionKind) -> ActionEvent {
        ActionEvent {
            player_id: 1,
            kind,
            timestamp_ms: ts,
            position: DVec3::ZERO,
            target: None,
        }
    }

    fn state_with_actions(actions: &[(u64, ActionKind)]) -> PlayerState {
        let mut s = PlayerState::new(1, 0, &HistoryConfig::default());
        for (ts, kind) in actions {
            s.record_action(&action_event(*ts, *kind), 30_000);
        }
        s
    }

    #[test]
    fn test_pickup_after_break_is_valid() {
        let v = validator();
        let state = state_with_actions(&[(1_000, ActionKind::BreakBlock)]);
        let ev = TelemetryEvent::Action(action_event(1_400, ActionKind::ItemPickup));
        let result = v.validate(&state, &ev, 1_400);
        assert!(result.valid, "{:?}", result.violations);
    }

    #[test]
    fn test_pickup_without_break_is_flagged() {
        let v = validator();
        let state = state_with_actions(&[(1_000, ActionKind::Move)]);
        let ev = TelemetryEvent::Action(action_event(1_400, ActionKind::ItemPickup));
        let result = v.validate(&state, &ev, 1_400);
        assert!(
            result
                .violations
                .iter()
                .any(|v| v.kind == ViolationKind::CausalViolation),
            "{:?}",
            result.violations
        );
    }

    #[test]
    fn test_stale_prerequisite_outside_window_rejected() {
        let v = validator();
        // Break happened 40 s ago: outside the 30 s causal window.
        let state = state_with_actions(&[(0, ActionKind::BreakBlock)]);
        let ev = TelemetryEvent::Action(action_event(40_000, ActionKind::ItemPickup));
        let result = v.validate(&state, &ev, 40_000);
        assert!(!result.valid, "{:?}", result.violations);
    }

    #[test]
    fn test_temporal_inversion_flagged() {
        let v = validator();
        let state = state_with_actions(&[(2_000, ActionKind::Attack)]);
        // Timestamped before the previous action.
        let ev = TelemetryEvent::Action(action_event(1_500, ActionKind::Attack));
        let result = v.validate(&state, &ev, 2_100);
        assert!(
            result
                .violations
                .iter()
                .any(|v| v.kind == ViolationKind::TemporalInversion),
            "{:?}",
            result.violations
        );
    }

    #[test]
    fn test_movement_inside_teleport_settle_flagged() {
        let v = validator();
        let state = state_with_actions(&[(1_000, ActionKind::Teleport)]);
        let ev = TelemetryEvent::Action(action_event(1_200, ActionKind::Move));
        let result = v.validate(&state, &ev, 1_200);
        assert!(!result.valid, "{:?}", result.violations);

        // After the settle window the same movement is fine.
        let late = TelemetryEvent::Action(action_event(1_700, ActionKind::Move));
        let result = v.validate(&state, &late, 1_700);
        assert!(result.valid, "{:?}", result.violations);
    }

    #[test]
    fn test_attack_frequency_ceiling() {
        let v = validator();
        // 20 attacks in the trailing second; ceiling is 15/s. Interleave
        // damage so prerequisites stay satisfied.
        let actions: Vec<_> = (0..20u64).map(|i| (i * 45, ActionKind::Attack)).collect();
        let state = state_with_actions(&actions);
        let ev = TelemetryEvent::Action(action_event(900, ActionKind::Attack));
        let result = v.validate(&state, &ev, 900);
        assert!(
            result
                .violations
                .iter()
                .any(|v| v.kind == ViolationKind::CausalViolation
                    && v.evidence.iter().any(|e| e.description.contains("ceiling"))),
            "{:?}",
            result.violations
        );
    }

    #[test]
    fn test_full_chain_break_pickup_craft_place() {
        let v = validator();
        let state = state_with_actions(&[
            (0, ActionKind::BreakBlock),
            (400, ActionKind::ItemPickup),
            (900, ActionKind::Craft),
        ]);
        let ev = TelemetryEvent::Action(action_event(1_500, ActionKind::BlockPlace));
        let result = v.validate(&state, &ev, 1_500);
        assert!(result.valid, "{:?}", result.violations);
        match result.detail {
            ValidationDetail::Causal {
                chain_len,
                edge_count,
            } => {
                assert_eq!(chain_len, 4);
                assert_eq!(edge_count, 2);
            }
            other => panic!("unexpected detail {other:?}"),
        }
    }
}
