//! Thread-safe drawing canvas with a paced, single-threaded render loop.
//!
//! Any number of producer threads submit [`Drawable`]s to a [`Canvas`].
//! Submissions pass an owner-tracking producer lock and land in a bounded
//! FIFO queue; one render thread drains the queue once per frame period and
//! hands each drawable, in order, to a [`DrawBackend`].
//!
//! ```no_run
//! use threadcanvas::draw::{Drawable, Shape, RED};
//! use threadcanvas::{Canvas, LogBackend};
//!
//! let canvas = Canvas::builder().fps(30).build(LogBackend::new())?;
//! canvas.submit(Drawable::new(
//!     Shape::Circle { center: (40.0, 40.0), radius: 10.0, sides: 24 },
//!     RED,
//! ))?;
//! canvas.shutdown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod canvas;
pub mod config;
pub mod demo;
pub mod draw;
pub mod render;
pub mod sync;
pub mod timer;

pub use canvas::{Batch, Canvas, CanvasBuilder, CanvasError};
pub use config::Config;
pub use draw::{Color, Drawable, Shape};
pub use render::{
    BackendError, DrawBackend, LogBackend, LoopState, RecordingBackend, RenderEvent, RenderStats,
    StopReason,
};
pub use sync::{BoundedQueue, LockError, ProducerLock, QueueClosed, TryPushError};
pub use timer::FrameTimer;
