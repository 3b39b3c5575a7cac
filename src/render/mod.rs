//! Consumer side: the render loop and the drawing backends it feeds.

pub mod backend;
#[cfg(feature = "cairo")]
pub mod cairo_backend;
pub(crate) mod render_loop;

pub use backend::{BackendError, DrawBackend, LogBackend, RecordedFrame, RecordingBackend};
#[cfg(feature = "cairo")]
pub use cairo_backend::CairoBackend;
pub use render_loop::{LoopState, RenderEvent, RenderStats, StopReason};
