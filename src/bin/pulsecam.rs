//! End-to-end demo: drives the full pipeline against the synthetic camera
//! and detector, prints live readings, and dumps the session summary.
//!
//!   cargo run --bin pulsecam -- --frames 400 --scene-bpm 72

use std::fs::File;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use pulsecam::input::{SyntheticProvider, SyntheticScene};
use pulsecam::render::load_font;
use pulsecam::{PulseConfig, SessionManager};

#[derive(Parser, Debug)]
#[command(name = "pulsecam", about = "synthetic camera pulse estimation demo")]
struct Args {
    /// Capture device id to open
    #[arg(long, default_value_t = 0)]
    camera: u32,

    /// Lower BPM band limit
    #[arg(long, default_value_t = 50.0)]
    bpm_min: f64,

    /// Upper BPM band limit
    #[arg(long, default_value_t = 180.0)]
    bpm_max: f64,

    /// Frames to process before stopping
    #[arg(long, default_value_t = 400)]
    frames: usize,

    /// Frame index at which the face lock engages
    #[arg(long, default_value_t = 30)]
    lock_after: usize,

    /// Simulated heart rate of the synthetic scene
    #[arg(long, default_value_t = 72.0)]
    scene_bpm: f64,

    /// TTF/OTF font for frame text annotations
    #[arg(long)]
    font: Option<PathBuf>,

    /// Write the raw signal to this file before stopping
    #[arg(long)]
    export: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let scene = SyntheticScene {
        bpm: args.scene_bpm,
        ..SyntheticScene::default()
    };
    let provider = SyntheticProvider::new(scene);
    let detectors = provider.detector_provider();

    let mut manager = SessionManager::new(
        Box::new(provider),
        Box::new(detectors),
        PulseConfig::from_env(),
    );
    if let Some(path) = &args.font {
        let data = std::fs::read(path).with_context(|| format!("reading font {path:?}"))?;
        if let Some(font) = load_font(data) {
            manager = manager.with_font(font);
        }
    }

    let session_id = manager.start(args.camera, Some((args.bpm_min, args.bpm_max)))?;
    info!("started session {session_id}");

    for i in 0..args.frames {
        if i == args.lock_after {
            let state = manager.toggle_lock()?;
            println!("frame {i:4}: lock engaged, state {state:?}");
        }
        match manager.process_frame()? {
            Some(result) => {
                if i % 30 == 0 {
                    match result.bpm {
                        Some(bpm) => println!(
                            "frame {i:4}: {bpm:6.1} bpm  quality {:.2}",
                            result.quality
                        ),
                        None => println!(
                            "frame {i:4}: collecting  quality {:.2}",
                            result.quality
                        ),
                    }
                }
            }
            None => thread::sleep(Duration::from_millis(10)),
        }
    }

    if let Some(stats) = manager.current_stats() {
        println!("stats: {}", serde_json::to_string_pretty(&stats)?);
    }

    if let Some(path) = &args.export {
        let rows = manager.export_signal(File::create(path)?)?;
        println!("exported {rows} samples to {path:?}");
    }

    match manager.stop() {
        Some(summary) => println!("summary: {}", serde_json::to_string_pretty(&summary)?),
        None => println!("no BPM readings were recorded"),
    }
    Ok(())
}
