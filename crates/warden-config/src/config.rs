//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WardenConfig {
    /// Movement-physics model constants.
    pub physics: PhysicsConfig,
    /// Movement validator thresholds.
    pub movement: MovementConfig,
    /// Velocity validator thresholds.
    pub velocity: VelocityConfig,
    /// Packet-flow validator thresholds.
    pub packet: PacketConfig,
    /// Behavior validator thresholds.
    pub behavior: BehaviorConfig,
    /// Causal-chain validator thresholds.
    pub causal: CausalConfig,
    /// Reality-divergence validator thresholds.
    pub divergence: DivergenceConfig,
    /// Suspicion ledger & escalation thresholds.
    pub escalation: EscalationConfig,
    /// Per-player history capacities.
    pub history: HistoryConfig,
    /// Event pipeline sizing.
    pub pipeline: PipelineConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Constants of the closed-form movement model. Positions in blocks,
/// speeds in blocks/second.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Downward acceleration in blocks/s².
    pub gravity: f64,
    /// Initial upward velocity of a legal jump, blocks/s.
    pub jump_impulse: f64,
    /// Maximum falling speed in blocks/s.
    pub terminal_velocity: f64,
    /// Walking speed ceiling in blocks/s.
    pub walk_speed: f64,
    /// Sprinting speed ceiling in blocks/s.
    pub sprint_speed: f64,
    /// Flying speed ceiling in blocks/s (creative-style flight).
    pub fly_speed: f64,
    /// Maximum step-up height in blocks.
    pub step_height: f64,
    /// Per-second horizontal velocity retention in air (0..1).
    pub air_drag: f64,
    /// Per-second horizontal velocity retention on ground (0..1).
    pub ground_friction: f64,
    /// Per-second velocity retention in fluids (0..1).
    pub fluid_drag: f64,
    /// Nominal server tick length in milliseconds.
    pub tick_ms: u64,
    /// Fall distance in blocks beyond which landing deals damage.
    pub fall_damage_threshold: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 32.0,
            jump_impulse: 8.4,
            terminal_velocity: 78.4,
            walk_speed: 4.317,
            sprint_speed: 5.612,
            fly_speed: 10.92,
            step_height: 0.6,
            air_drag: 0.91,
            ground_friction: 0.546,
            fluid_drag: 0.5,
            tick_ms: 50,
            fall_damage_threshold: 3.0,
        }
    }
}

/// Movement validator thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MovementConfig {
    /// Multiplier applied to the mode speed ceiling before flagging.
    pub speed_tolerance: f64,
    /// Sub-steps per tick for path reconstruction. Clamped to >= 100.
    pub subtick_steps: usize,
    /// Reconstruction divergence tolerance in sub-tick mode, blocks.
    pub divergence_tolerance_subtick: f64,
    /// Reconstruction divergence tolerance in whole-tick mode, blocks.
    pub divergence_tolerance_whole: f64,
    /// Whether to run the sub-tick reconstruction (whole-tick otherwise).
    pub subtick_mode: bool,
    /// Floor applied to the multiplicative confidence penalty.
    pub confidence_floor: f64,
    /// Per-check confidence penalty weights; confidence is the product of
    /// `(1 - weight)` over triggered checks.
    pub penalty_speed: f64,
    pub penalty_fly: f64,
    pub penalty_phase: f64,
    pub penalty_timer: f64,
    pub penalty_scaffold: f64,
    pub penalty_nofall: f64,
    pub penalty_divergence: f64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            speed_tolerance: 1.1,
            subtick_steps: 100,
            divergence_tolerance_subtick: 0.01,
            divergence_tolerance_whole: 0.1,
            subtick_mode: true,
            confidence_floor: 0.1,
            penalty_speed: 0.35,
            penalty_fly: 0.4,
            penalty_phase: 0.5,
            penalty_timer: 0.35,
            penalty_scaffold: 0.3,
            penalty_nofall: 0.3,
            penalty_divergence: 0.4,
        }
    }
}

/// Velocity validator thresholds. Each check is independently gated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VelocityConfig {
    /// Samples kept in the (expected, actual) sliding window.
    pub window: usize,
    /// Hard ceiling on reported velocity magnitude, blocks/s.
    pub max_magnitude: f64,
    /// Relative deviation from the windowed moving average that counts as
    /// a sudden change.
    pub sudden_change_threshold: f64,
    /// Relative mismatch tolerance for knockback impulses.
    pub knockback_tolerance: f64,
    /// Fraction of the window that must exceed tolerance to call the
    /// desync systematic.
    pub desync_ratio: f64,
    /// Per-sample normalized deviation above which a sample counts toward
    /// the desync ratio.
    pub desync_tolerance: f64,
    /// Tolerance on the per-tick gravity step of Δy, blocks/s.
    pub gravity_step_tolerance: f64,
    /// Check gates.
    pub check_magnitude: bool,
    pub check_sudden_change: bool,
    pub check_knockback: bool,
    pub check_desync: bool,
    pub check_gravity: bool,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            window: 40,
            max_magnitude: 40.0,
            sudden_change_threshold: 0.5,
            knockback_tolerance: 0.25,
            desync_ratio: 0.7,
            desync_tolerance: 0.3,
            gravity_step_tolerance: 0.2,
            check_magnitude: true,
            check_sudden_change: true,
            check_knockback: true,
            check_desync: true,
            check_gravity: true,
        }
    }
}

/// Packet-flow validator thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PacketConfig {
    /// Hard ceiling on packets per second (nominal 20 TPS clients send
    /// well under this).
    pub max_packets_per_second: f64,
    /// Nominal tick length used for compression-ratio analysis, ms.
    pub nominal_tick_ms: u64,
    /// Relative fingerprint divergence that triggers a violation.
    pub fingerprint_divergence: f64,
    /// Packets observed before the established fingerprint is trusted.
    pub fingerprint_min_samples: usize,
    /// Recent-window length for rate and sequence analysis.
    pub analysis_window: usize,
}

impl Default for PacketConfig {
    fn default() -> Self {
        Self {
            max_packets_per_second: 30.0,
            nominal_tick_ms: 50,
            fingerprint_divergence: 0.3,
            fingerprint_min_samples: 100,
            analysis_window: 64,
        }
    }
}

/// Behavior validator thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Normalized Shannon entropy below which automation is suspected.
    pub entropy_threshold: f64,
    /// Human-likeness composite below which a violation fires.
    pub human_likeness_threshold: f64,
    /// `history_len / distinct_kinds` ratio above which a macro loop is
    /// suspected.
    pub repetition_threshold: f64,
    /// Minimum samples before entropy/human-likeness are evaluated.
    pub min_samples: usize,
    /// Kill-aura: fraction of recent actions that are attacks.
    pub killaura_attack_ratio: f64,
    /// Kill-aura: analysis window, ms.
    pub killaura_window_ms: u64,
    /// Kill-aura: minimum attacks inside the window.
    pub killaura_min_attacks: usize,
    /// Kill-aura: attack gap below which cadence is inhuman, ms.
    pub killaura_gap_ms: u64,
    /// Scaffold: block-place to movement ratio.
    pub scaffold_place_ratio: f64,
    /// Gap length that counts as a natural pause, ms.
    pub natural_pause_ms: u64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            entropy_threshold: 0.35,
            human_likeness_threshold: 0.4,
            repetition_threshold: 25.0,
            min_samples: 16,
            killaura_attack_ratio: 0.6,
            killaura_window_ms: 1_000,
            killaura_min_attacks: 8,
            killaura_gap_ms: 100,
            scaffold_place_ratio: 0.3,
            natural_pause_ms: 1_000,
        }
    }
}

/// Causal-chain validator thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CausalConfig {
    /// Window inside which a prerequisite must have occurred, ms.
    pub timeout_ms: u64,
    /// Maximum retained chain length.
    pub max_chain_len: usize,
    /// Minimum settle time after a teleport before movement is legal, ms.
    pub teleport_settle_ms: u64,
    /// Per-kind frequency ceilings, actions per second.
    pub max_attacks_per_sec: f64,
    pub max_places_per_sec: f64,
    pub max_breaks_per_sec: f64,
    pub max_interacts_per_sec: f64,
}

impl Default for CausalConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_chain_len: 1_000,
            teleport_settle_ms: 500,
            max_attacks_per_sec: 15.0,
            max_places_per_sec: 10.0,
            max_breaks_per_sec: 12.0,
            max_interacts_per_sec: 20.0,
        }
    }
}

/// Reality-divergence validator thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DivergenceConfig {
    /// Weight of the position-distance component.
    pub position_weight: f64,
    /// Weight of the velocity-distance component.
    pub velocity_weight: f64,
    /// Weight per mismatched environment flag.
    pub flag_weight: f64,
    /// Weighted divergence above which a violation fires.
    pub tolerance: f64,
    /// Consecutive divergences before a rollback is recommended.
    pub counter_threshold: u32,
    /// Minimum gap between forced resyncs, ms.
    pub resync_cooldown_ms: u64,
    /// Ensemble weights for the three deterministic predictors.
    pub weight_dead_reckon: f64,
    pub weight_integrated: f64,
    pub weight_last_trusted: f64,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            position_weight: 1.0,
            velocity_weight: 0.5,
            flag_weight: 0.25,
            tolerance: 0.5,
            counter_threshold: 5,
            resync_cooldown_ms: 5_000,
            weight_dead_reckon: 0.5,
            weight_integrated: 0.3,
            weight_last_trusted: 0.2,
        }
    }
}

/// Suspicion ledger & escalation thresholds. Zero-tolerance defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EscalationConfig {
    /// Score at or above which a player is quarantined.
    pub quarantine_threshold: f64,
    /// Score at or above which a temp ban is issued.
    pub temp_ban_threshold: f64,
    /// Temp ban length, ms (default 24 hours).
    pub temp_ban_duration_ms: u64,
    /// Score at or above which a permanent ban is issued. Non-reversible.
    pub perm_ban_threshold: f64,
    /// Score decay in points per second absent new violations.
    pub decay_per_second: f64,
    /// Violation-free period after which Warned/Quarantined decays to
    /// Clean, ms.
    pub clean_after_ms: u64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            quarantine_threshold: 25.0,
            temp_ban_threshold: 50.0,
            temp_ban_duration_ms: 24 * 60 * 60 * 1_000,
            perm_ban_threshold: 100.0,
            decay_per_second: 0.05,
            clean_after_ms: 300_000,
        }
    }
}

/// Per-player bounded history capacities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Movement records retained.
    pub movement: usize,
    /// Packet records retained.
    pub packets: usize,
    /// Behavior samples retained.
    pub behavior: usize,
    /// Causal actions retained.
    pub causal: usize,
    /// (expected, actual) velocity pairs retained.
    pub velocity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            movement: 1_000,
            packets: 1_000,
            behavior: 1_000,
            causal: 1_000,
            velocity: 256,
        }
    }
}

/// Event pipeline sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker thread count. 0 = derive from CPU count.
    pub workers: usize,
    /// Bounded event queue capacity per worker.
    pub queue_capacity: usize,
    /// Bounded outbound decision channel capacity.
    pub decision_capacity: usize,
    /// Per-validator deadline, ms. Overruns become SystemAnomaly.
    pub validator_deadline_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_capacity: 1_024,
            decision_capacity: 256,
            validator_deadline_ms: 5,
        }
    }
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Log every batch verdict, not only flagged ones.
    pub log_clean_batches: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_clean_batches: false,
        }
    }
}

// --- Load / Save / Reload ---

impl WardenConfig {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("warden.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: WardenConfig =
                ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = WardenConfig::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `warden.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("warden.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("warden.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: WardenConfig =
            ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
