//! Translates escalation transitions into enforcement decisions and
//! delivers engine outputs to the host over an explicit bounded channel.

use crossbeam_channel::{Sender, TrySendError};
use warden_model::{
    EnforcementDecision, Evidence, PlayerId, RollbackCommand, Violation,
};

use crate::escalation::EscalationOutcome;

/// Evidence entries attached to a decision are capped to keep the
/// operator view readable.
const MAX_DECISION_EVIDENCE: usize = 8;

/// Anything the engine hands back to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineOutput {
    /// An enforcement decision to execute.
    Decision(EnforcementDecision),
    /// A client state correction to apply.
    Rollback(RollbackCommand),
}

/// Sends engine outputs to the host-owned channel.
///
/// Delivery is best-effort: a full channel drops the output with an error
/// log rather than stalling the validation pipeline. Keeping the game
/// responsive wins over delivering one decision late; the dropped-output
/// counter is the operational alert hook.
pub struct EnforcementDispatcher {
    tx: Sender<EngineOutput>,
}

impl EnforcementDispatcher {
    /// Wraps a host-owned sender.
    pub fn new(tx: Sender<EngineOutput>) -> Self {
        Self { tx }
    }

    /// Builds the decision for a forward escalation transition.
    pub fn build_decision(
        player_id: PlayerId,
        outcome: &EscalationOutcome,
        violations: &[Violation],
    ) -> Option<EnforcementDecision> {
        let action = outcome.action.clone()?;

        let kinds: Vec<String> = violations
            .iter()
            .map(|v| format!("{:?}", v.kind))
            .collect();
        let reason = format!(
            "suspicion score {:.1} moved {:?} -> {:?} ({})",
            outcome.score,
            outcome.from,
            outcome.to,
            if kinds.is_empty() {
                "no new violations".to_string()
            } else {
                kinds.join(", ")
            }
        );

        let evidence: Vec<Evidence> = violations
            .iter()
            .flat_map(|v| v.evidence.iter().cloned())
            .take(MAX_DECISION_EVIDENCE)
            .collect();

        Some(EnforcementDecision {
            player_id,
            action,
            reason,
            evidence,
        })
    }

    /// Sends a decision to the host.
    pub fn dispatch_decision(&self, decision: EnforcementDecision) {
        tracing::warn!(
            player_id = decision.player_id,
            action = ?decision.action,
            reason = %decision.reason,
            "enforcement decision"
        );
        self.send(EngineOutput::Decision(decision));
    }

    /// Sends a rollback command to the host.
    pub fn dispatch_rollback(&self, command: RollbackCommand) {
        self.send(EngineOutput::Rollback(command));
    }

    fn send(&self, output: EngineOutput) {
        match self.tx.try_send(output) {
            Ok(()) => {}
            Err(TrySendError::Full(output)) => {
                tracing::error!(?output, "output channel full; dropping engine output");
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!("output channel disconnected; host is gone");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_model::{EnforcementAction, EscalationState, ViolationKind};

    fn outcome(action: Option<EnforcementAction>) -> EscalationOutcome {
        EscalationOutcome {
            from: EscalationState::Clean,
            to: EscalationState::Quarantined,
            score: 30.0,
            action,
        }
    }

    #[test]
    fn test_build_decision_includes_reason_and_evidence() {
        let violation = Violation::new(
            ViolationKind::SpeedHack,
            0.9,
            vec![Evidence::measurement("speed", 40.0, 0.9)],
            0,
            1,
        );
        let decision = EnforcementDispatcher::build_decision(
            1,
            &outcome(Some(EnforcementAction::Quarantine)),
            &[violation],
        )
        .expect("decision for forward transition");
        assert_eq!(decision.action, EnforcementAction::Quarantine);
        assert!(decision.reason.contains("SpeedHack"));
        assert_eq!(decision.evidence.len(), 1);
    }

    #[test]
    fn test_no_decision_without_action() {
        assert!(EnforcementDispatcher::build_decision(1, &outcome(None), &[]).is_none());
    }

    #[test]
    fn test_dispatch_delivers_to_channel() {
        let (tx, rx) = crossbeam_channel::bounded(4);
        let dispatcher = EnforcementDispatcher::new(tx);
        dispatcher.dispatch_rollback(RollbackCommand {
            player_id: 3,
            target_position: glam::DVec3::ZERO,
            target_velocity: glam::DVec3::ZERO,
        });
        match rx.try_recv().expect("one output") {
            EngineOutput::Rollback(cmd) => assert_eq!(cmd.player_id, 3),
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn test_full_channel_drops_instead_of_blocking() {
        let (tx, _rx) = crossbeam_channel::bounded(1);
        let dispatcher = EnforcementDispatcher::new(tx);
        for _ in 0..3 {
            dispatcher.dispatch_rollback(RollbackCommand {
                player_id: 3,
                target_position: glam::DVec3::ZERO,
                target_velocity: glam::DVec3::ZERO,
            });
        }
        // No deadlock, no panic: extra outputs were dropped.
    }
}
