//! The suspicion ledger update and escalation state machine.
//!
//! One function, [`apply_violation_batch`], is the single mutation path
//! for a player's ledger: decay, score accumulation, and the state
//! transition all happen in it, and the engine calls it only inside the
//! registry's per-player entry lock. Thresholds are evaluated in
//! descending order so the most severe applicable action wins.

use warden_config::EscalationConfig;
use warden_model::{EnforcementAction, EscalationState, Violation};
use warden_state::SuspicionLedger;

/// What one batch application did to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct EscalationOutcome {
    /// State before the batch.
    pub from: EscalationState,
    /// State after the batch.
    pub to: EscalationState,
    /// Score after decay and accumulation.
    pub score: f64,
    /// The enforcement action a forward transition calls for, if any.
    pub action: Option<EnforcementAction>,
}

impl EscalationOutcome {
    /// `true` if the batch moved the player up the ladder.
    pub fn escalated(&self) -> bool {
        self.to.rank() > self.from.rank()
    }
}

/// Applies one violation batch to a ledger.
///
/// Ordering inside the update:
/// 1. Materialize time decay (score decay; Warned/Quarantined fall back
///    to Clean after the violation-free window; TempBanned releases to
///    Quarantined when its duration elapses).
/// 2. Accumulate the batch's severities.
/// 3. Evaluate thresholds descending and transition forward if a higher
///    state applies. PermBanned is terminal and short-circuits.
pub fn apply_violation_batch(
    ledger: &mut SuspicionLedger,
    violations: &[Violation],
    now_ms: u64,
    cfg: &EscalationConfig,
) -> EscalationOutcome {
    let from = ledger.state;

    if from == EscalationState::PermBanned {
        // Terminal: the score no longer matters.
        ledger.epoch += 1;
        return EscalationOutcome {
            from,
            to: from,
            score: ledger.score,
            action: None,
        };
    }

    // 1. Decay.
    ledger.score = ledger.decayed_score(now_ms, cfg.decay_per_second);
    let quiet_ms = now_ms.saturating_sub(ledger.last_violation_ms);
    match ledger.state {
        EscalationState::Warned | EscalationState::Quarantined
            if quiet_ms >= cfg.clean_after_ms =>
        {
            tracing::info!(
                state = ?ledger.state,
                quiet_s = quiet_ms / 1_000,
                "suspicion decayed; returning player to Clean"
            );
            ledger.state = EscalationState::Clean;
            ledger.last_transition_ms = now_ms;
        }
        EscalationState::TempBanned
            if now_ms.saturating_sub(ledger.last_transition_ms) >= cfg.temp_ban_duration_ms =>
        {
            ledger.state = EscalationState::Quarantined;
            ledger.last_transition_ms = now_ms;
        }
        _ => {}
    }

    // 2. Accumulate.
    let added: f64 = violations.iter().map(|v| v.severity).sum();
    if !violations.is_empty() {
        ledger.score += added;
        ledger.violation_count += violations.len() as u64;
        ledger.last_violation_ms = now_ms;
    }

    // 3. Transition, most severe threshold first.
    let target = if ledger.score >= cfg.perm_ban_threshold {
        EscalationState::PermBanned
    } else if ledger.score >= cfg.temp_ban_threshold {
        EscalationState::TempBanned
    } else if ledger.score >= cfg.quarantine_threshold {
        EscalationState::Quarantined
    } else if ledger.score > 0.0 {
        EscalationState::Warned
    } else {
        EscalationState::Clean
    };

    let mut action = None;
    if target.rank() > ledger.state.rank() {
        action = Some(match target {
            EscalationState::Warned => EnforcementAction::Warn,
            EscalationState::Quarantined => EnforcementAction::Quarantine,
            EscalationState::TempBanned => EnforcementAction::TempBan {
                duration_ms: cfg.temp_ban_duration_ms,
            },
            EscalationState::PermBanned => EnforcementAction::PermBan,
            EscalationState::Clean => unreachable!("Clean outranks nothing"),
        });
        ledger.state = target;
        ledger.last_transition_ms = now_ms;
    }

    ledger.epoch += 1;

    EscalationOutcome {
        from,
        to: ledger.state,
        score: ledger.score,
        action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_model::ViolationKind;

    fn cfg() -> EscalationConfig {
        EscalationConfig::default()
    }

    fn violation(kind: ViolationKind, confidence: f64) -> Violation {
        Violation::new(kind, confidence, vec![], 0, 1)
    }

    /// Batch worth exactly `severity` points.
    fn batch(severity: f64) -> Vec<Violation> {
        // SpeedHack has base severity 10; confidence scales it.
        vec![violation(ViolationKind::SpeedHack, severity / 10.0)]
    }

    #[test]
    fn test_first_violation_warns() {
        let mut ledger = SuspicionLedger::new(0);
        let outcome = apply_violation_batch(&mut ledger, &batch(5.0), 1_000, &cfg());
        assert_eq!(outcome.from, EscalationState::Clean);
        assert_eq!(outcome.to, EscalationState::Warned);
        assert_eq!(outcome.action, Some(EnforcementAction::Warn));
    }

    #[test]
    fn test_crossing_25_quarantines() {
        let mut ledger = SuspicionLedger::new(0);
        apply_violation_batch(&mut ledger, &batch(10.0), 100, &cfg());
        apply_violation_batch(&mut ledger, &batch(10.0), 200, &cfg());
        // Third batch crosses 25.
        let outcome = apply_violation_batch(&mut ledger, &batch(10.0), 300, &cfg());
        assert_eq!(outcome.to, EscalationState::Quarantined);
        assert_eq!(outcome.action, Some(EnforcementAction::Quarantine));
    }

    #[test]
    fn test_crossing_100_perm_bans_terminally() {
        let mut ledger = SuspicionLedger::new(0);
        let big: Vec<Violation> = (0..10).flat_map(|_| batch(10.0)).collect();
        let outcome = apply_violation_batch(&mut ledger, &big, 100, &cfg());
        assert_eq!(outcome.to, EscalationState::PermBanned);
        assert_eq!(outcome.action, Some(EnforcementAction::PermBan));

        // Terminal: decades of quiet change nothing.
        let later = apply_violation_batch(&mut ledger, &[], u64::MAX / 2, &cfg());
        assert_eq!(later.to, EscalationState::PermBanned);
        assert!(later.action.is_none());
    }

    #[test]
    fn test_most_severe_threshold_wins() {
        // One enormous batch jumps straight past Quarantine and TempBan.
        let mut ledger = SuspicionLedger::new(0);
        let big: Vec<Violation> = (0..12).flat_map(|_| batch(10.0)).collect();
        let outcome = apply_violation_batch(&mut ledger, &big, 100, &cfg());
        assert_eq!(outcome.to, EscalationState::PermBanned);
    }

    #[test]
    fn test_score_monotonic_without_decay_window() {
        let mut ledger = SuspicionLedger::new(0);
        let mut last = 0.0;
        // Batches 50 ms apart: decay (0.05/s) is negligible but nonzero,
        // so allow for it while requiring net growth.
        for i in 1..=10u64 {
            let outcome = apply_violation_batch(&mut ledger, &batch(5.0), i * 50, &cfg());
            assert!(
                outcome.score > last,
                "score {} did not grow past {last}",
                outcome.score
            );
            last = outcome.score;
        }
    }

    #[test]
    fn test_warned_decays_to_clean_after_quiet_period() {
        let mut ledger = SuspicionLedger::new(0);
        apply_violation_batch(&mut ledger, &batch(5.0), 1_000, &cfg());
        assert_eq!(ledger.state, EscalationState::Warned);

        // 6 minutes of silence (clean_after is 5 minutes).
        let outcome = apply_violation_batch(&mut ledger, &[], 361_000, &cfg());
        assert_eq!(outcome.to, EscalationState::Clean);
        assert!(outcome.action.is_none());
    }

    #[test]
    fn test_no_redundant_transition_when_already_quarantined() {
        let mut ledger = SuspicionLedger::new(0);
        let big: Vec<Violation> = (0..3).flat_map(|_| batch(10.0)).collect();
        let first = apply_violation_batch(&mut ledger, &big, 100, &cfg());
        assert_eq!(first.to, EscalationState::Quarantined);

        // Another small batch keeps the score in the quarantine band:
        // no second Quarantine action.
        let second = apply_violation_batch(&mut ledger, &batch(5.0), 200, &cfg());
        assert_eq!(second.to, EscalationState::Quarantined);
        assert!(second.action.is_none());
        assert!(!second.escalated());
    }

    #[test]
    fn test_temp_ban_releases_to_quarantine_after_duration() {
        let mut ledger = SuspicionLedger::new(0);
        let big: Vec<Violation> = (0..6).flat_map(|_| batch(10.0)).collect();
        let banned = apply_violation_batch(&mut ledger, &big, 1_000, &cfg());
        assert_eq!(banned.to, EscalationState::TempBanned);

        // 25 hours later, an empty batch releases the ban.
        let day_later = 1_000 + 25 * 60 * 60 * 1_000;
        let outcome = apply_violation_batch(&mut ledger, &[], day_later, &cfg());
        assert_eq!(outcome.to, EscalationState::Quarantined);
    }

    #[test]
    fn test_epoch_increments_on_every_application() {
        let mut ledger = SuspicionLedger::new(0);
        let start = ledger.epoch;
        apply_violation_batch(&mut ledger, &[], 100, &cfg());
        apply_violation_batch(&mut ledger, &batch(5.0), 200, &cfg());
        assert_eq!(ledger.epoch, start + 2);
    }
}
