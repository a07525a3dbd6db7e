//! Behavior-pattern validation: entropy, human-likeness, repetition, and
//! the specialized kill-aura / scaffold sequence detectors.

use rustc_hash::FxHashMap;
use warden_config::BehaviorConfig;
use warden_model::{
    ActionEvent, ActionKind, Evidence, TelemetryEvent, ValidationDetail, ValidationResult,
    ValidatorKind, Violation, ViolationKind,
};
use warden_state::{BehaviorSample, PlayerState};

use crate::Validator;

/// Window scanned for scaffold place/move ratio, ms.
const SCAFFOLD_WINDOW_MS: u64 = 2_000;

/// Behavior-pattern validator.
pub struct BehaviorValidator {
    cfg: BehaviorConfig,
}

impl BehaviorValidator {
    /// Creates a validator with the given thresholds.
    pub fn new(cfg: BehaviorConfig) -> Self {
        Self { cfg }
    }

    fn validate_action(&self, state: &PlayerState, ev: &ActionEvent) -> ValidationResult {
        let mut samples: Vec<BehaviorSample> = state.behavior.iter().copied().collect();
        samples.push(BehaviorSample {
            timestamp_ms: ev.timestamp_ms,
            kind: ev.kind,
            position: ev.position,
        });

        let entropy = normalized_entropy(&samples);
        let human_likeness = human_likeness(&samples, &self.cfg);
        let enough = samples.len() >= self.cfg.min_samples;

        let mut violations = Vec::new();

        if enough && entropy < self.cfg.entropy_threshold {
            violations.push(Violation::new(
                ViolationKind::BehaviorAnomaly,
                ((self.cfg.entropy_threshold - entropy) / self.cfg.entropy_threshold)
                    .clamp(0.5, 0.9),
                vec![Evidence::statistic(
                    format!(
                        "action entropy {entropy:.2} below automation threshold {:.2} over {} samples",
                        self.cfg.entropy_threshold,
                        samples.len()
                    ),
                    entropy,
                    0.7,
                )],
                ev.timestamp_ms,
                ev.player_id,
            ));
        }

        if enough && human_likeness < self.cfg.human_likeness_threshold {
            violations.push(Violation::new(
                ViolationKind::BehaviorAnomaly,
                ((self.cfg.human_likeness_threshold - human_likeness)
                    / self.cfg.human_likeness_threshold)
                    .clamp(0.5, 0.85),
                vec![Evidence::statistic(
                    format!("human-likeness composite {human_likeness:.2}"),
                    human_likeness,
                    0.65,
                )],
                ev.timestamp_ms,
                ev.player_id,
            ));
        }

        // Macro loops: long history cycling over very few action kinds.
        let distinct = distinct_kinds(&samples).max(1);
        let repetition = samples.len() as f64 / distinct as f64;
        if enough && repetition > self.cfg.repetition_threshold {
            violations.push(Violation::new(
                ViolationKind::MacroPattern,
                0.7,
                vec![Evidence::statistic(
                    format!("repetition ratio {repetition:.1} across {distinct} action kinds"),
                    repetition,
                    0.7,
                )],
                ev.timestamp_ms,
                ev.player_id,
            ));
        }

        if let Some(v) = self.detect_killaura(&samples, ev) {
            violations.push(v);
        }
        if let Some(v) = self.detect_scaffold(&samples, ev) {
            violations.push(v);
        }

        let anomaly_score = ((violations.len() as f64 / 3.0).min(1.0)
            + (1.0 - entropy)
            + (1.0 - human_likeness))
            / 3.0;

        let confidence = violations
            .iter()
            .fold(1.0_f64, |c, v| c * (1.0 - 0.3 * v.confidence))
            .max(0.1);

        ValidationResult::flagged(
            ValidatorKind::Behavior,
            violations,
            confidence,
            ValidationDetail::Behavior {
                entropy,
                human_likeness,
                anomaly_score,
            },
        )
    }

    /// Kill-aura: an inhumanly dense run of attacks in a short window.
    fn detect_killaura(&self, samples: &[BehaviorSample], ev: &ActionEvent) -> Option<Violation> {
        let cutoff = ev.timestamp_ms.saturating_sub(self.cfg.killaura_window_ms);
        let window: Vec<&BehaviorSample> =
            samples.iter().filter(|s| s.timestamp_ms >= cutoff).collect();
        if window.is_empty() {
            return None;
        }

        let attacks: Vec<&&BehaviorSample> = window
            .iter()
            .filter(|s| s.kind == ActionKind::Attack)
            .collect();
        if attacks.len() < self.cfg.killaura_min_attacks {
            return None;
        }

        let ratio = attacks.len() as f64 / window.len() as f64;
        if ratio <= self.cfg.killaura_attack_ratio {
            return None;
        }

        let gaps: Vec<u64> = attacks
            .windows(2)
            .map(|w| w[1].timestamp_ms.saturating_sub(w[0].timestamp_ms))
            .collect();
        let mean_gap = gaps.iter().sum::<u64>() as f64 / gaps.len().max(1) as f64;
        if mean_gap >= self.cfg.killaura_gap_ms as f64 {
            return None;
        }

        Some(Violation::new(
            ViolationKind::KillAura,
            (0.6 + 0.4 * ratio).min(1.0),
            vec![
                Evidence::statistic(
                    format!(
                        "{} attacks ({:.0}% of actions) within {} ms",
                        attacks.len(),
                        ratio * 100.0,
                        self.cfg.killaura_window_ms
                    ),
                    ratio,
                    0.9,
                ),
                Evidence::timing("mean attack gap".to_string(), mean_gap, 0.85),
            ],
            ev.timestamp_ms,
            ev.player_id,
        ))
    }

    /// Scaffold: block placement dominating the movement stream.
    fn detect_scaffold(&self, samples: &[BehaviorSample], ev: &ActionEvent) -> Option<Violation> {
        let cutoff = ev.timestamp_ms.saturating_sub(SCAFFOLD_WINDOW_MS);
        let window: Vec<&BehaviorSample> =
            samples.iter().filter(|s| s.timestamp_ms >= cutoff).collect();

        let places = window
            .iter()
            .filter(|s| s.kind == ActionKind::BlockPlace)
            .count();
        if places < 3 {
            return None;
        }
        let moves = window
            .iter()
            .filter(|s| s.kind == ActionKind::Move)
            .count()
            .max(1);

        let ratio = places as f64 / moves as f64;
        if ratio <= self.cfg.scaffold_place_ratio {
            return None;
        }

        Some(Violation::new(
            ViolationKind::Scaffold,
            (0.5 + ratio * 0.2).clamp(0.5, 0.85),
            vec![Evidence::statistic(
                format!("{places} placements against {moves} movement actions"),
                ratio,
                0.65,
            )],
            ev.timestamp_ms,
            ev.player_id,
        ))
    }
}

impl Validator for BehaviorValidator {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Behavior
    }

    fn validate(
        &self,
        state: &PlayerState,
        event: &TelemetryEvent,
        _now_ms: u64,
    ) -> ValidationResult {
        match event {
            TelemetryEvent::Action(ev) => self.validate_action(state, ev),
            TelemetryEvent::Comprehensive { timestamp_ms, .. } => match state.behavior.back() {
                Some(sample) => {
                    let ev = ActionEvent {
                        player_id: state.player_id,
                        kind: sample.kind,
                        timestamp_ms: *timestamp_ms,
                        position: sample.position,
                        target: None,
                    };
                    self.validate_action(state, &ev)
                }
                None => ValidationResult::clean(ValidatorKind::Behavior, ValidationDetail::None),
            },
            _ => ValidationResult::clean(ValidatorKind::Behavior, ValidationDetail::None),
        }
    }
}

/// Shannon entropy of the action-kind distribution, normalized to [0, 1]
/// by the maximum entropy over the observed alphabet.
fn normalized_entropy(samples: &[BehaviorSample]) -> f64 {
    let mut counts: FxHashMap<ActionKind, usize> = FxHashMap::default();
    for s in samples {
        *counts.entry(s.kind).or_default() += 1;
    }
    let k = counts.len();
    if k <= 1 || samples.is_empty() {
        return 0.0;
    }
    let n = samples.len() as f64;
    let h: f64 = counts
        .values()
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.log2()
        })
        .sum();
    (h / (k as f64).log2()).clamp(0.0, 1.0)
}

/// Number of distinct action kinds in the window.
fn distinct_kinds(samples: &[BehaviorSample]) -> usize {
    let mut counts: FxHashMap<ActionKind, ()> = FxHashMap::default();
    for s in samples {
        counts.insert(s.kind, ());
    }
    counts.len()
}

/// Human-likeness composite: timing variance, action variety, natural
/// pauses, and category context switches, each mapped to [0, 1].
fn human_likeness(samples: &[BehaviorSample], cfg: &BehaviorConfig) -> f64 {
    if samples.len() < 2 {
        return 1.0; // not enough signal to accuse anyone
    }

    let gaps: Vec<f64> = samples
        .windows(2)
        .map(|w| w[1].timestamp_ms.saturating_sub(w[0].timestamp_ms) as f64)
        .collect();
    let mean_gap = gaps.iter().sum::<f64>() / gaps.len() as f64;
    let variance = gaps.iter().map(|g| (g - mean_gap).powi(2)).sum::<f64>() / gaps.len() as f64;
    // Coefficient of variation: metronomic streams sit near 0.
    let timing_score = if mean_gap > 0.0 {
        (variance.sqrt() / mean_gap).min(1.0)
    } else {
        0.0
    };

    let variety_score = (distinct_kinds(samples) as f64 / 6.0).min(1.0);

    let pauses = gaps
        .iter()
        .filter(|&&g| g > cfg.natural_pause_ms as f64)
        .count();
    let pause_score = (pauses as f64 / gaps.len() as f64 * 10.0).min(1.0);

    let switches = samples
        .windows(2)
        .filter(|w| w[0].kind.category() != w[1].kind.category())
        .count();
    let switch_score = (switches as f64 / gaps.len() as f64 * 4.0).min(1.0);

    (timing_score + variety_score + pause_score + switch_score) / 4.0
}
