//! # Shade Control Unit
//!
//! Control loop for the motorized shade actuator, running against the
//! simulated plant. The binary wires the drivers to the controller,
//! starts a pump thread that steps the plant physics and watches the
//! end stop, and accepts commands on stdin (`<topic> [payload]`, e.g.
//! `move 120`, `turn up`, `stop`).
//!
//! With the `rt` feature the loop thread is memory-locked, optionally
//! pinned and FIFO-scheduled before entering the loop.

use std::io::BufRead;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use clap::Parser;
use shade_common::command::ShadeCommand;
use shade_common::hal::RotationSink;
use shade_common::params::LogWriteback;
use shade_common::telemetry::LogTelemetry;
use shade_control_unit::config::{LoadedConfig, load_config};
use shade_control_unit::controller::MotionController;
use shade_control_unit::cycle::{Event, TickRunner, rt_setup};
use shade_control_unit::rotation::RotationAccumulator;
use shade_hal::{SimIndicator, SimPir, SimPlant, SimPlantConfig};
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Shade Control Unit — actuator control loop
#[derive(Parser, Debug)]
#[command(name = "shade_control_unit")]
#[command(version)]
#[command(about = "Position-tracking control loop for the shade actuator")]
struct Args {
    /// Path to the control configuration TOML.
    #[arg(default_value = "config/control.toml")]
    config: PathBuf,

    /// Run a bounded number of ticks, then exit (simulation runs).
    #[arg(long)]
    ticks: Option<u64>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("Shade Control Unit v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Shade Control Unit shutdown complete");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = if args.config.exists() {
        load_config(&args.config)?
    } else {
        warn!(
            "config '{}' not found, using shipped defaults",
            args.config.display()
        );
        LoadedConfig {
            control: Default::default(),
            params: Default::default(),
        }
    };
    let interval = Duration::from_millis(loaded.control.tick_interval_ms);
    info!(
        "Config OK: tick_interval={}ms, automate={}",
        loaded.control.tick_interval_ms, loaded.params.automate,
    );

    rt_setup(loaded.control.rt_cpu_core, loaded.control.rt_priority)?;

    // Drivers. The simulated encoder is mounted mirror-wise like the
    // shipped hardware, which the default invert_encoder undoes.
    let accumulator = Arc::new(RotationAccumulator::new(loaded.params.invert_encoder));
    let sink: Arc<dyn RotationSink> = accumulator.clone();
    let plant_config = SimPlantConfig {
        winding_length: loaded.params.winding_length,
        invert_output: loaded.params.invert_encoder,
        ..SimPlantConfig::default()
    };
    let (mut plant, motor) = SimPlant::new(plant_config, sink);

    let controller = MotionController::new(
        loaded.params,
        accumulator,
        Box::new(motor),
        Box::new(SimPir::new(0)),
        Box::new(SimIndicator::new()),
        Box::new(LogTelemetry),
        Box::new(LogWriteback),
    );

    let (tx, rx) = mpsc::channel();
    let shutdown = Arc::new(AtomicBool::new(false));

    let s = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        s.store(true, Ordering::SeqCst);
    })?;

    // Pump thread: step the plant physics and watch the end stop.
    let pump = {
        let tx = tx.clone();
        let shutdown = shutdown.clone();
        std::thread::spawn(move || {
            let mut was_hit = false;
            while !shutdown.load(Ordering::Relaxed) {
                plant.step(interval);
                let hit = plant.end_stop_hit();
                if hit && !was_hit && tx.send(Event::EndStop).is_err() {
                    break;
                }
                was_hit = hit;
                std::thread::sleep(interval);
            }
        })
    };

    // Stdin command shell: `<topic> [payload]` per line.
    {
        let tx = tx.clone();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let (topic, payload) = match line.split_once(char::is_whitespace) {
                    Some((t, p)) => (t, p),
                    None => (line, ""),
                };
                let event = match topic {
                    "ping" => Some(Event::Ping),
                    _ => ShadeCommand::parse(topic, payload).map(Event::Command),
                };
                match event {
                    Some(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    None => warn!(topic, "unknown command"),
                }
            }
        });
    }

    // The loop owns the session: announce it before the first tick.
    let _ = tx.send(Event::Online);

    let mut runner = TickRunner::new(controller, rx, interval);
    match args.ticks {
        Some(ticks) => runner.run_for(ticks, &shutdown),
        None => runner.run(&shutdown),
    }

    shutdown.store(true, Ordering::SeqCst);
    let _ = pump.join();
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
