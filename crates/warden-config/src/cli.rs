//! Command-line argument parsing for the Warden engine.

use std::path::PathBuf;

use clap::Parser;

use crate::WardenConfig;

/// Warden command-line arguments.
///
/// CLI values override settings loaded from `warden.ron`.
#[derive(Parser, Debug)]
#[command(name = "warden", about = "Warden cheat-detection engine")]
pub struct CliArgs {
    /// Worker thread count (0 = derive from CPU count).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Suspicion score at which a player is quarantined.
    #[arg(long)]
    pub quarantine_threshold: Option<f64>,

    /// Suspicion score at which a player is permanently banned.
    #[arg(long)]
    pub perm_ban_threshold: Option<f64>,

    /// Sub-tick reconstruction steps per tick.
    #[arg(long)]
    pub subtick_steps: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl WardenConfig {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(workers) = args.workers {
            self.pipeline.workers = workers;
        }
        if let Some(threshold) = args.quarantine_threshold {
            self.escalation.quarantine_threshold = threshold;
        }
        if let Some(threshold) = args.perm_ban_threshold {
            self.escalation.perm_ban_threshold = threshold;
        }
        if let Some(steps) = args.subtick_steps {
            self.movement.subtick_steps = steps;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
