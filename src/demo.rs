//! Producer/consumer demo driven by the `threadcanvas` binary.
//!
//! Several producer threads submit random shapes in locked batches while the
//! render thread draws them. Each producer draws in its own high-contrast
//! color, so batch contiguity is visible in recorded frames.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rand::Rng;

use crate::canvas::{Canvas, CanvasBuilder};
use crate::config::{BackendKind, Config};
use crate::draw::{Color, Drawable, Shape, Transform};
use crate::render::{LogBackend, RenderEvent, RenderStats, StopReason};

/// How often the supervising thread checks the stop conditions.
const SUPERVISE_INTERVAL: Duration = Duration::from_millis(50);

/// Tag layout: producer id in the high 32 bits, sequence number in the low 32.
pub fn make_tag(producer: u32, seq: u32) -> u64 {
    ((producer as u64) << 32) | seq as u64
}

/// Producer id encoded by [`make_tag`].
pub fn tag_producer(tag: u64) -> u32 {
    (tag >> 32) as u32
}

/// A random shape inside a `width` x `height` canvas.
///
/// Sizes below one pixel (or NaN) are treated as one pixel.
pub fn random_drawable<R: Rng>(
    rng: &mut R,
    color: Color,
    width: f64,
    height: f64,
) -> Drawable {
    let width = width.max(1.0);
    let height = height.max(1.0);
    let x = rng.random_range(0.0..width);
    let y = rng.random_range(0.0..height);
    let size = rng.random_range(4.0..(width.min(height) / 8.0).max(5.0));

    let shape = match rng.random_range(0..6) {
        0 => Shape::Circle {
            center: (0.0, 0.0),
            radius: size / 2.0,
            sides: rng.random_range(3..32),
        },
        1 => Shape::Triangle {
            vertices: [(0.0, -size / 2.0), (size / 2.0, size / 2.0), (-size / 2.0, size / 2.0)],
        },
        2 => Shape::Rectangle {
            x: -size / 2.0,
            y: -size / 4.0,
            width: size,
            height: size / 2.0,
            filled: rng.random_bool(0.7),
        },
        3 => Shape::Polyline {
            points: (0..rng.random_range(2..6))
                .map(|_| (rng.random_range(-size..size), rng.random_range(-size..size)))
                .collect(),
            thickness: rng.random_range(1.0..4.0),
        },
        4 => {
            let vertices = vec![(0.0, 0.0), (size, 0.0), (size, size), (0.0, size)];
            let colors = (0..vertices.len())
                .map(|i| Color::high_contrast(i as u32 + 1))
                .collect();
            Shape::ColoredPolygon { vertices, colors }
        }
        _ => Shape::ProgressBar {
            x: 0.0,
            y: 0.0,
            width: size * 2.0,
            height: size / 4.0,
            progress: rng.random_range(0.0..=1.0),
        },
    };

    let transform = Transform::translated(x, y).with_rotation(rng.random_range(0.0..360.0));
    Drawable::new(shape, color).with_transform(transform)
}

/// What one producer thread managed to submit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerReport {
    pub id: u32,
    pub submitted: u64,
    pub batches: u64,
}

/// Submits batches of random shapes until `stop` is set or the canvas closes.
pub fn run_producer(
    canvas: &Canvas,
    id: u32,
    batch_size: usize,
    (width, height): (f64, f64),
    stop: &AtomicBool,
) -> ProducerReport {
    let mut rng = rand::rng();
    let color = Color::high_contrast(id);
    let mut report = ProducerReport {
        id,
        ..ProducerReport::default()
    };
    let mut seq: u32 = 0;

    'produce: while !stop.load(Ordering::Acquire) {
        let Ok(mut batch) = canvas.batch() else {
            break;
        };
        for _ in 0..batch_size {
            let drawable = random_drawable(&mut rng, color, width, height).with_tag(make_tag(id, seq));
            seq = seq.wrapping_add(1);
            if batch.push(drawable).is_err() {
                report.submitted += batch.len() as u64;
                break 'produce;
            }
        }
        report.submitted += batch.finish() as u64;
        report.batches += 1;
        // One batch per frame.
        canvas.sleep();
    }

    debug!(
        "Producer {} done: {} drawable(s) in {} batch(es)",
        id, report.submitted, report.batches
    );
    report
}

/// Outcome of a demo run.
#[derive(Debug, Clone)]
pub struct Summary {
    pub backend: &'static str,
    pub reason: StopReason,
    pub elapsed: Duration,
    pub stats: RenderStats,
    pub producers: Vec<ProducerReport>,
    pub draw_failures: usize,
    pub fatal: Option<String>,
}

impl Summary {
    pub fn submitted(&self) -> u64 {
        self.producers.iter().map(|p| p.submitted).sum()
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "threadcanvas summary")?;
        writeln!(f, "  backend:    {}", self.backend)?;
        writeln!(f, "  stopped:    {:?} after {:.2?}", self.reason, self.elapsed)?;
        writeln!(f, "  frames:     {}", self.stats.frames)?;
        writeln!(f, "  submitted:  {}", self.submitted())?;
        writeln!(f, "  drawn:      {}", self.stats.drawn)?;
        writeln!(f, "  failed:     {}", self.stats.failed)?;
        writeln!(f, "  discarded:  {}", self.stats.discarded)?;
        writeln!(f, "  evicted:    {}", self.stats.evicted)?;
        if let Some(error) = &self.fatal {
            writeln!(f, "  fatal:      {error}")?;
        }
        for producer in &self.producers {
            writeln!(
                f,
                "  producer {:>2}: {} drawable(s), {} batch(es)",
                producer.id, producer.submitted, producer.batches
            )?;
        }
        Ok(())
    }
}

/// Runs producers against a fresh canvas until a stop condition is met.
///
/// Stops on the configured frame limit, the configured duration, a fatal
/// backend error, or when `stop` is set (e.g. by a signal handler).
pub fn run(config: &Config, stop: &AtomicBool) -> Result<Summary> {
    let (canvas, backend) = build_canvas(config)?;
    let demo = &config.demo;
    let size = (config.canvas.width as f64, config.canvas.height as f64);
    let deadline =
        (demo.duration_secs > 0).then(|| Instant::now() + Duration::from_secs(demo.duration_secs));

    info!(
        "Running {} producer(s), batch size {}, backend {}",
        demo.producers, demo.batch_size, backend
    );

    let started = Instant::now();
    let mut draw_failures = 0;
    let mut fatal = None;

    let producers = thread::scope(|scope| {
        let handles: Vec<_> = (0..demo.producers)
            .map(|id| {
                let canvas = &canvas;
                let batch_size = demo.batch_size;
                scope.spawn(move || run_producer(canvas, id as u32, batch_size, size, stop))
            })
            .collect();

        loop {
            match canvas.recv_event_timeout(SUPERVISE_INTERVAL) {
                Some(RenderEvent::DrawFailed { .. }) => draw_failures += 1,
                Some(RenderEvent::Fatal { error, .. }) => fatal = Some(error.to_string()),
                Some(RenderEvent::Stopped { .. }) => break,
                None => {}
            }
            if stop.load(Ordering::Acquire) {
                info!("Stop requested");
                break;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                info!("Duration limit reached");
                break;
            }
        }

        stop.store(true, Ordering::Release);
        canvas.shutdown();

        handles
            .into_iter()
            .filter_map(|handle| match handle.join() {
                Ok(report) => Some(report),
                Err(_) => {
                    warn!("Producer thread panicked");
                    None
                }
            })
            .collect::<Vec<_>>()
    });

    for event in canvas.poll_events() {
        match event {
            RenderEvent::DrawFailed { .. } => draw_failures += 1,
            RenderEvent::Fatal { error, .. } => fatal = Some(error.to_string()),
            RenderEvent::Stopped { .. } => {}
        }
    }

    Ok(Summary {
        backend,
        reason: canvas.stop_reason().unwrap_or(StopReason::Shutdown),
        elapsed: started.elapsed(),
        stats: canvas.stats(),
        producers,
        draw_failures,
        fatal,
    })
}

fn build_canvas(config: &Config) -> Result<(Canvas, &'static str)> {
    let builder = CanvasBuilder::from_config(&config.canvas).frame_limit(config.demo.frames);

    match config.demo.backend {
        BackendKind::Log => {
            if config.demo.record_frames > 0 {
                warn!("record_frames is ignored by the log backend");
            }
            let canvas = builder
                .build(LogBackend::new())
                .context("Failed to start canvas")?;
            Ok((canvas, "log"))
        }
        BackendKind::Cairo => build_cairo_canvas(builder, config),
    }
}

#[cfg(feature = "cairo")]
fn build_cairo_canvas(builder: CanvasBuilder, config: &Config) -> Result<(Canvas, &'static str)> {
    use crate::render::CairoBackend;

    let width = config.canvas.width as i32;
    let height = config.canvas.height as i32;
    let [r, g, b, a] = config.canvas.background;
    let background = Color::new(r, g, b, a);
    let record_frames = config.demo.record_frames;
    let record_dir = config
        .demo
        .record_dir
        .clone()
        .unwrap_or_else(|| std::path::PathBuf::from("."));

    let canvas = builder
        .build_with(move || {
            CairoBackend::new(width, height, background)
                .map(|backend| backend.record_frames(record_dir, record_frames))
        })
        .context("Failed to start canvas")?;
    Ok((canvas, "cairo"))
}

#[cfg(not(feature = "cairo"))]
fn build_cairo_canvas(_builder: CanvasBuilder, _config: &Config) -> Result<(Canvas, &'static str)> {
    anyhow::bail!("The cairo backend is not available; rebuild with `--features cairo`")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip_producer_id() {
        let tag = make_tag(7, 42);
        assert_eq!(tag_producer(tag), 7);
        assert_eq!(tag & 0xffff_ffff, 42);
    }

    #[test]
    fn random_drawables_stay_near_the_canvas() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            let drawable = random_drawable(&mut rng, Color::high_contrast(1), 200.0, 100.0);
            let (x, y) = drawable.transform().translate;
            assert!((0.0..200.0).contains(&x));
            assert!((0.0..100.0).contains(&y));
            assert!(!drawable.world_vertices().is_empty());
        }
    }

    #[test]
    fn degenerate_canvas_size_is_clamped() {
        let mut rng = rand::rng();
        for (width, height) in [(0.0, 0.0), (-5.0, 10.0), (f64::NAN, 3.0)] {
            let drawable = random_drawable(&mut rng, Color::high_contrast(2), width, height);
            let (x, y) = drawable.transform().translate;
            assert!((0.0..1.0).contains(&x));
            assert!((0.0..height.max(1.0)).contains(&y));
        }
    }

    #[test]
    fn run_stops_at_frame_limit_and_reports_producers() {
        let mut config = Config::default();
        config.canvas.fps = 200;
        config.demo.producers = 3;
        config.demo.frames = 5;
        let stop = AtomicBool::new(false);

        let summary = run(&config, &stop).unwrap();

        assert_eq!(summary.reason, StopReason::FrameLimit);
        assert_eq!(summary.stats.frames, 5);
        assert_eq!(summary.producers.len(), 3);
        assert_eq!(
            summary.submitted(),
            summary.stats.drawn + summary.stats.failed + summary.stats.discarded
        );
        assert!(summary.to_string().contains("frames:     5"));
    }

    #[test]
    fn preset_stop_flag_ends_run_immediately() {
        let config = Config::default();
        let stop = AtomicBool::new(true);
        let summary = run(&config, &stop).unwrap();
        assert_eq!(summary.reason, StopReason::Shutdown);
    }
}
