use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec2;
use strata_core::schedule::FixedInterval;
use strata_shared::heightfield::is_sentinel;
use strata_stream::config::load_or_create;
use strata_stream::realize::NullRealizer;
use strata_stream::{ChunkStreamer, StreamEvent};
use tracing::{info, warn};

const FRAME: Duration = Duration::from_millis(16);
const REPORT_INTERVAL_SECS: f32 = 2.0;

struct WalkerOptions {
    config_path: PathBuf,
    steps: u32,
    speed: f32,
    heading_degrees: f32,
}

fn main() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();

    let mut options = WalkerOptions {
        config_path: PathBuf::from("world.toml"),
        steps: 600,
        speed: 40.0,
        heading_degrees: 30.0,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let Some(value) = args.next() else {
                    eprintln!("--config expects a path argument");
                    std::process::exit(2);
                };
                options.config_path = PathBuf::from(value);
            }
            "--steps" => options.steps = parse_arg("--steps", args.next()),
            "--speed" => options.speed = parse_arg("--speed", args.next()),
            "--heading" => options.heading_degrees = parse_arg("--heading", args.next()),
            "--help" | "-h" => {
                println!(
                    "Usage: terrain_walker [--config <path>] [--steps <u32>] [--speed <units/s>] [--heading <degrees>]"
                );
                return;
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        eprintln!("\nShutdown signal received, stopping walk...");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl+C handler: {err}");
    }

    if let Err(err) = run(options, running) {
        eprintln!("terrain_walker failed: {err}");
        std::process::exit(1);
    }
}

fn parse_arg<T: std::str::FromStr>(flag: &str, value: Option<String>) -> T
where
    T::Err: std::fmt::Display,
{
    let Some(value) = value else {
        eprintln!("{flag} expects a value");
        std::process::exit(2);
    };
    match value.parse::<T>() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("invalid value '{value}' for {flag}: {err}");
            std::process::exit(2);
        }
    }
}

fn run(options: WalkerOptions, running: Arc<AtomicBool>) -> Result<(), String> {
    let config = load_or_create(&options.config_path);
    let mut streamer =
        ChunkStreamer::new(&config, NullRealizer::new()).map_err(|err| err.to_string())?;

    let heading = options.heading_degrees.to_radians();
    let direction = Vec2::new(heading.cos(), heading.sin());
    let mut viewer = Vec2::ZERO;
    let mut report = FixedInterval::new(REPORT_INTERVAL_SECS);
    let mut last_frame = Instant::now();
    let (mut ready, mut swaps, mut evicted) = (0usize, 0usize, 0usize);

    info!(
        "Walking {} steps at {} units/s from the origin",
        options.steps, options.speed
    );

    for _ in 0..options.steps {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        std::thread::sleep(FRAME);
        let now = Instant::now();
        let dt = now.duration_since(last_frame).as_secs_f32();
        last_frame = now;

        viewer += direction * options.speed * dt;
        for event in streamer.update(dt, viewer) {
            match event {
                StreamEvent::ChunkReady { .. } => ready += 1,
                StreamEvent::MeshSwapped { .. } => swaps += 1,
                StreamEvent::ChunkEvicted { .. } => evicted += 1,
            }
        }

        if report.tick(dt) {
            let height = streamer.height_at_world(viewer);
            let ground = if is_sentinel(height) {
                "pending".to_string()
            } else {
                format!("{height:.1} ({:.1} deg)", streamer.inclination_at_world(viewer))
            };
            info!(
                "Viewer at ({:.0}, {:.0}) chunk {:?}: ground {ground}, {} resident, {} ready",
                viewer.x,
                viewer.y,
                streamer.viewer_chunk(),
                streamer.resident_count(),
                streamer.ready_count()
            );
        }
    }

    streamer.drain_blocking(Duration::from_secs(5));
    let stats = streamer.stats();
    info!(
        "Walk finished: {ready} chunks ready, {swaps} mesh swaps, {evicted} evictions, {} generation runs, {} stale results",
        stats.generation_runs, stats.stale_results
    );
    Ok(())
}
