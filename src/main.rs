use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use threadcanvas::Config;
use threadcanvas::config::{BackendKind, OverflowPolicy};

#[derive(Parser, Debug)]
#[command(name = "threadcanvas")]
#[command(
    version,
    about = "Multi-producer drawing canvas demo with a paced render loop"
)]
struct Cli {
    /// Config file (defaults to ~/.config/threadcanvas/config.toml)
    #[arg(long, short = 'c', value_name = "PATH")]
    config: Option<PathBuf>,

    /// Number of producer threads
    #[arg(long, short = 'p', value_name = "N")]
    producers: Option<usize>,

    /// Queue capacity
    #[arg(long, value_name = "N")]
    capacity: Option<usize>,

    /// Target frames per second (0 = unpaced)
    #[arg(long, value_name = "FPS")]
    fps: Option<u32>,

    /// Stop after this many frames (0 = no limit)
    #[arg(long, short = 'f', value_name = "N")]
    frames: Option<u64>,

    /// Stop after this many seconds (0 = no limit)
    #[arg(long, short = 'd', value_name = "SECS")]
    duration: Option<u64>,

    /// Drawables per locked batch
    #[arg(long, short = 'b', value_name = "N")]
    batch_size: Option<usize>,

    /// Behavior when the queue is full
    #[arg(long, value_enum)]
    overflow: Option<OverflowPolicy>,

    /// Drawing backend
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,

    /// Write the first N frames as PNG files (cairo backend)
    #[arg(long, value_name = "N")]
    record_frames: Option<u64>,

    /// Directory for recorded frames
    #[arg(long, value_name = "DIR")]
    record_dir: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long, action = ArgAction::SetTrue)]
    print_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(producers) = self.producers {
            config.demo.producers = producers;
        }
        if let Some(capacity) = self.capacity {
            config.canvas.capacity = capacity;
        }
        if let Some(fps) = self.fps {
            config.canvas.fps = fps;
        }
        if let Some(frames) = self.frames {
            config.demo.frames = frames;
        }
        if let Some(duration) = self.duration {
            config.demo.duration_secs = duration;
        }
        if let Some(batch_size) = self.batch_size {
            config.demo.batch_size = batch_size;
        }
        if let Some(overflow) = self.overflow {
            config.canvas.overflow = overflow;
        }
        if let Some(backend) = self.backend {
            config.demo.backend = backend;
        }
        if let Some(record_frames) = self.record_frames {
            config.demo.record_frames = record_frames;
        }
        if let Some(dir) = &self.record_dir {
            config.demo.record_dir = Some(dir.clone());
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    cli.apply(&mut config);
    config.validate_and_clamp();

    if cli.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let stop = Arc::new(AtomicBool::new(false));
    let mut signals =
        Signals::new([SIGTERM, SIGINT]).context("Failed to register signal handler")?;
    let signal_stop = stop.clone();
    // Runs until process exit; it only flips the stop flag.
    thread::spawn(move || {
        for sig in signals.forever() {
            log::info!(
                "Received {} - stopping",
                if sig == SIGTERM { "SIGTERM" } else { "SIGINT" }
            );
            signal_stop.store(true, Ordering::Release);
        }
    });

    if config.demo.frames == 0 && config.demo.duration_secs == 0 {
        log::info!("Running until interrupted (Ctrl+C to stop)");
    }

    let summary = threadcanvas::demo::run(&config, &stop)?;
    print!("{summary}");

    if let Some(error) = summary.fatal {
        return Err(anyhow::anyhow!("Render backend failed: {error}"));
    }
    Ok(())
}
