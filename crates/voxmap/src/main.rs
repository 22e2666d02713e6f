//! Voxmap - Art-Net volumetric display receiver
//!
//! Loads a display configuration, listens for Art-Net on every configured
//! endpoint and reports what the voxel buffer receives.

#![warn(missing_docs)]

mod logging_setup;
mod signal;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use voxmap_control::IngestEngine;
use voxmap_core::{DisplayConfig, DisplayModel};

/// Interval between status lines
const REPORT_INTERVAL: Duration = Duration::from_secs(5);
/// Upper bound on a single wait for buffer updates
const UPDATE_WAIT: Duration = Duration::from_millis(250);

/// Art-Net receiver for volumetric LED displays.
#[derive(Parser, Debug)]
#[command(name = "voxmap", version)]
#[command(about = "Maps Art-Net universes onto the voxels of one or more LED cubes")]
struct Args {
    /// Path to the display configuration (JSON).
    config: PathBuf,

    /// Log level, overriding the configuration file (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = DisplayConfig::load(&args.config)
        .with_context(|| format!("Failed to load display configuration {:?}", args.config))?;
    if let Some(level) = args.log_level {
        config.log.level = level;
    }

    // Keep the guard alive for the whole run so buffered file logs are flushed
    let _log_guard = logging_setup::init(&config.log)?;

    info!("Voxmap v{} starting", env!("CARGO_PKG_VERSION"));
    info!("{}", config_summary(&args.config, &config));

    let model = DisplayModel::new(&config).context("Invalid cube geometry")?;
    let (min, max) = model.bounds();
    info!(
        "{} voxels in {} cube(s), bounds {:?} .. {:?}",
        model.voxel_count(),
        model.topologies().len(),
        min,
        max
    );

    let running = signal::setup_ctrl_c_handler()?;
    let mut engine = IngestEngine::start(&config).context("Failed to start Art-Net listeners")?;

    run(&engine, &model, &running);

    engine.stop();
    info!("Voxmap stopped");
    Ok(())
}

fn config_summary(path: &Path, config: &DisplayConfig) -> String {
    format!(
        "Display configuration {:?}: {} cube(s), {} listener(s), {} universes per layer, layer span {}",
        path,
        config.cubes.len(),
        config.listener_count(),
        config.universes_per_layer,
        config.layer_span
    )
}

/// Report buffer activity until shutdown is requested or every listener has stopped
fn run(engine: &IngestEngine, model: &DisplayModel, running: &AtomicBool) {
    let buffer = engine.buffer();
    let mut seen = buffer.generation();
    let mut frames = 0u64;
    let mut last_report = Instant::now();

    while running.load(Ordering::SeqCst) {
        if engine.all_stopped() {
            tracing::warn!("All Art-Net listeners have stopped");
            return;
        }

        let generation = buffer.wait_for_update(seen, UPDATE_WAIT);
        if generation != seen {
            frames += 1;
            seen = generation;
        }

        if last_report.elapsed() >= REPORT_INTERVAL {
            let lit = model.visible_frame(buffer).len();
            info!(
                "{} updates in the last {:?}, {} of {} voxels lit",
                frames,
                last_report.elapsed(),
                lit,
                model.voxel_count()
            );
            for (worker, stats) in engine.workers().iter().zip(engine.stats()) {
                info!(
                    "  {} [{:?}]: {} packets, {} dmx, {} sync, {} malformed, {} oversized, {} unroutable, {} pixels",
                    worker.local_addr(),
                    worker.state(),
                    stats.packets,
                    stats.dmx_packets,
                    stats.sync_packets,
                    stats.malformed,
                    stats.oversized,
                    stats.unroutable,
                    stats.pixels_written
                );
            }
            frames = 0;
            last_report = Instant::now();
        }
    }

    info!("Shutdown requested");
}
