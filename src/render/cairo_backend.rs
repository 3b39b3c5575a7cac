//! Cairo image-surface backend with optional PNG frame recording.
//!
//! Cairo objects are not `Send`, so this backend is built on the render
//! thread through [`CanvasBuilder::build_with`](crate::canvas::CanvasBuilder::build_with).

use std::fs::{self, File};
use std::path::PathBuf;

use cairo::{Context, Format, ImageSurface};

use super::backend::{BackendError, DrawBackend};
use crate::draw::{Color, Drawable, Shape};

/// Rasterizes drawables into an ARGB32 surface, one frame at a time.
pub struct CairoBackend {
    surface: ImageSurface,
    /// Open only between `begin_frame` and `end_frame`.
    ctx: Option<Context>,
    background: Color,
    record_dir: PathBuf,
    record_remaining: u64,
    recorded: Vec<PathBuf>,
}

impl CairoBackend {
    /// Creates a `width` x `height` surface painted with `background` each frame.
    pub fn new(width: i32, height: i32, background: Color) -> Result<Self, BackendError> {
        let surface = ImageSurface::create(Format::ARgb32, width, height)
            .map_err(|e| BackendError::Fatal(format!("cannot create surface: {e}")))?;
        Ok(Self {
            surface,
            ctx: None,
            background,
            record_dir: PathBuf::from("."),
            record_remaining: 0,
            recorded: Vec::new(),
        })
    }

    /// Writes the next `frames` frames as `frame_NNNNNN.png` into `dir`.
    pub fn record_frames(mut self, dir: PathBuf, frames: u64) -> Self {
        self.record_dir = dir;
        self.record_remaining = frames;
        self
    }

    /// Paths of PNG files written so far.
    pub fn recorded(&self) -> &[PathBuf] {
        &self.recorded
    }

    pub fn surface(&self) -> &ImageSurface {
        &self.surface
    }

    fn context(&mut self) -> Result<Context, BackendError> {
        if let Some(ctx) = &self.ctx {
            return Ok(ctx.clone());
        }
        let ctx = Context::new(&self.surface)
            .map_err(|e| BackendError::Fatal(format!("cannot create context: {e}")))?;
        self.ctx = Some(ctx.clone());
        Ok(ctx)
    }

    fn save_frame(&mut self, frame: u64) -> Result<(), BackendError> {
        fs::create_dir_all(&self.record_dir)
            .map_err(|e| BackendError::Draw(format!("cannot create record dir: {e}")))?;
        let path = self.record_dir.join(format!("frame_{frame:06}.png"));
        self.surface.flush();
        let mut file = File::create(&path)
            .map_err(|e| BackendError::Draw(format!("cannot create {}: {e}", path.display())))?;
        self.surface
            .write_to_png(&mut file)
            .map_err(|e| BackendError::Draw(format!("cannot write {}: {e}", path.display())))?;
        log::debug!("Recorded {}", path.display());
        self.recorded.push(path);
        Ok(())
    }
}

fn set_color(ctx: &Context, color: Color) {
    ctx.set_source_rgba(color.r, color.g, color.b, color.a);
}

/// Builds the drawable's outline as the current path. Returns false when it has no vertices.
fn trace_path(ctx: &Context, drawable: &Drawable, close: bool) -> bool {
    let vertices = drawable.world_vertices();
    let Some((&(x0, y0), rest)) = vertices.split_first() else {
        return false;
    };
    ctx.new_path();
    ctx.move_to(x0, y0);
    for &(x, y) in rest {
        ctx.line_to(x, y);
    }
    if close {
        ctx.close_path();
    }
    true
}

impl DrawBackend for CairoBackend {
    fn begin_frame(&mut self, _frame: u64) -> Result<(), BackendError> {
        let ctx = self.context()?;
        let _ = ctx.save();
        ctx.set_operator(cairo::Operator::Source);
        set_color(&ctx, self.background);
        let paint = ctx.paint();
        let _ = ctx.restore();
        paint.map_err(|e| BackendError::Fatal(format!("cannot clear surface: {e}")))
    }

    fn draw(&mut self, drawable: Drawable) -> Result<(), BackendError> {
        let ctx = self.context()?;
        let result = match drawable.shape() {
            Shape::Polyline { thickness, .. } => {
                if !trace_path(&ctx, &drawable, false) {
                    return Ok(());
                }
                set_color(&ctx, drawable.color());
                ctx.set_line_width(*thickness * drawable.transform().scale);
                ctx.set_line_cap(cairo::LineCap::Round);
                ctx.set_line_join(cairo::LineJoin::Round);
                ctx.stroke()
            }
            Shape::Rectangle { filled: false, .. } => {
                trace_path(&ctx, &drawable, true);
                set_color(&ctx, drawable.color());
                ctx.set_line_width(1.0);
                ctx.stroke()
            }
            Shape::ColoredPolygon { .. } => {
                // Cairo has no per-vertex shading on paths; use the first vertex color.
                trace_path(&ctx, &drawable, true);
                set_color(&ctx, drawable.vertex_color(0));
                ctx.fill()
            }
            Shape::ProgressBar { progress, .. } => {
                trace_path(&ctx, &drawable, true);
                let color = drawable.color();
                set_color(&ctx, color.with_alpha(color.a * 0.25));
                ctx.fill().and_then(|()| {
                    let Some(bounds) = drawable.bounds() else {
                        return Ok(());
                    };
                    let filled = bounds.width() * progress.clamp(0.0, 1.0);
                    ctx.rectangle(bounds.min.0, bounds.min.1, filled, bounds.height());
                    set_color(&ctx, color);
                    ctx.fill()
                })
            }
            Shape::Triangle { .. } | Shape::Rectangle { .. } | Shape::Circle { .. } => {
                trace_path(&ctx, &drawable, true);
                set_color(&ctx, drawable.color());
                ctx.fill()
            }
        };

        result.map_err(|e| match e {
            cairo::Error::NoMemory | cairo::Error::SurfaceFinished => {
                BackendError::Fatal(e.to_string())
            }
            other => BackendError::Draw(format!("{} failed: {other}", drawable.shape().name())),
        })
    }

    fn end_frame(&mut self, frame: u64) -> Result<(), BackendError> {
        // Release the context so the surface data is exclusively ours again.
        self.ctx = None;
        if self.record_remaining == 0 {
            return Ok(());
        }
        self.record_remaining -= 1;
        self.save_frame(frame)
    }

    fn name(&self) -> &str {
        "cairo"
    }
}
