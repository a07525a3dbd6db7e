//! Synthetic-traffic demo: feeds a mix of honest and cheating players
//! through the engine and prints the enforcement decisions it reaches.
//!
//! Run with `cargo run -p warden-demo -- --ticks 400`.

use std::sync::Arc;

use clap::Parser;
use glam::DVec3;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use warden_config::{CliArgs, WardenConfig};
use warden_engine::{EngineOutput, WardenEngine};
use warden_model::{ActionEvent, ActionKind, MovementEvent, TelemetryEvent};
use warden_physics::FlatFloor;

/// Demo-specific arguments layered over the engine CLI.
#[derive(Parser, Debug)]
#[command(name = "warden-demo", about = "Warden synthetic traffic demo")]
struct DemoArgs {
    /// Simulated server ticks to run.
    #[arg(long, default_value_t = 400)]
    ticks: u64,

    /// Honest players to simulate.
    #[arg(long, default_value_t = 6)]
    honest: u64,

    /// RNG seed for reproducible runs.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[command(flatten)]
    engine: CliArgs,
}

/// Player ids: honest players take 1..=honest, cheaters sit above them.
const FLOOR_Y: f64 = 64.0;

fn main() {
    let args = DemoArgs::parse();

    let config_dir = args
        .engine
        .config
        .clone()
        .or_else(|| dirs::config_dir().map(|d| d.join("warden")))
        .unwrap_or_else(|| std::path::PathBuf::from("."));
    let mut config = WardenConfig::load_or_create(&config_dir).unwrap_or_default();
    config.apply_cli_overrides(&args.engine);

    warden_log::init_logging(None, cfg!(debug_assertions), Some(&config));

    let engine = WardenEngine::new(config, Arc::new(FlatFloor { floor_y: FLOOR_Y }));
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(args.seed);

    let speedhacker = args.honest + 1;
    let killaura_bot = args.honest + 2;
    tracing::info!(
        honest = args.honest,
        speedhacker,
        killaura_bot,
        ticks = args.ticks,
        "starting synthetic traffic"
    );

    let mut positions: Vec<DVec3> = (0..=args.honest + 2)
        .map(|i| DVec3::new(i as f64 * 10.0, FLOOR_Y, 0.0))
        .collect();

    let mut decisions = 0u64;
    let mut rollbacks = 0u64;

    for tick in 1..=args.ticks {
        let now_ms = tick * 50;

        // Honest players wander at walking speed.
        for player in 1..=args.honest {
            let from = positions[player as usize];
            let step = DVec3::new(
                rng.gen_range(-0.2..0.2),
                0.0,
                rng.gen_range(-0.2..0.2),
            );
            let to = from + step;
            positions[player as usize] = to;
            submit(&engine, TelemetryEvent::Movement(MovementEvent {
                player_id: player,
                timestamp_ms: now_ms,
                from,
                to,
                on_ground: true,
            }));

            // Occasional organic actions.
            if rng.gen_bool(0.1) {
                let kind = match rng.gen_range(0..4) {
                    0 => ActionKind::BreakBlock,
                    1 => ActionKind::Jump,
                    2 => ActionKind::Interact,
                    _ => ActionKind::Move,
                };
                submit(&engine, TelemetryEvent::Action(ActionEvent {
                    player_id: player,
                    kind,
                    timestamp_ms: now_ms + 1,
                    position: to,
                    target: None,
                }));
            }
        }

        // The speedhacker covers 4 blocks per tick.
        let from = positions[speedhacker as usize];
        let to = from + DVec3::new(4.0, 0.0, 0.0);
        positions[speedhacker as usize] = to;
        submit(&engine, TelemetryEvent::Movement(MovementEvent {
            player_id: speedhacker,
            timestamp_ms: now_ms,
            from,
            to,
            on_ground: true,
        }));

        // The kill-aura bot attacks every 25 ms.
        for burst in 0..2u64 {
            submit(&engine, TelemetryEvent::Action(ActionEvent {
                player_id: killaura_bot,
                kind: ActionKind::Attack,
                timestamp_ms: now_ms + burst * 25,
                position: positions[killaura_bot as usize],
                target: Some(999),
            }));
        }

        for output in engine.drain_outputs() {
            match output {
                EngineOutput::Decision(decision) => {
                    decisions += 1;
                    tracing::info!(
                        player_id = decision.player_id,
                        action = ?decision.action,
                        reason = %decision.reason,
                        "decision"
                    );
                }
                EngineOutput::Rollback(command) => {
                    rollbacks += 1;
                    tracing::info!(player_id = command.player_id, "rollback");
                }
            }
        }
    }

    // Let queued events drain before the summary.
    std::thread::sleep(std::time::Duration::from_millis(200));
    for output in engine.drain_outputs() {
        if matches!(output, EngineOutput::Decision(_)) {
            decisions += 1;
        } else {
            rollbacks += 1;
        }
    }

    for player in [speedhacker, killaura_bot] {
        if let Some(state) = engine.suspicion_state(player) {
            tracing::info!(
                player_id = player,
                score = state.score,
                state = ?state.state,
                violations = state.violation_count,
                "final suspicion"
            );
        }
    }
    tracing::info!(
        decisions,
        rollbacks,
        players = engine.player_count(),
        dropped = engine.dropped_events(),
        "demo finished"
    );
}

fn submit(engine: &WardenEngine, event: TelemetryEvent) {
    if let Err(err) = engine.submit(event) {
        tracing::debug!(%err, "event not submitted");
    }
}
