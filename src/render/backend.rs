//! Drawing backend seam used by the render loop.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::draw::Drawable;

/// Errors reported by a [`DrawBackend`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Drawing one item failed; the rest of the batch still gets drawn.
    #[error("draw failed: {0}")]
    Draw(String),

    /// The backend can no longer render (e.g. context lost); the loop stops.
    #[error("backend lost: {0}")]
    Fatal(String),
}

impl BackendError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, BackendError::Fatal(_))
    }
}

/// Receiver of drawables on the render thread.
///
/// The render loop calls `begin_frame`, then `draw` once per drained item in
/// submission order, then `end_frame`. All calls happen on the render thread.
pub trait DrawBackend {
    fn begin_frame(&mut self, _frame: u64) -> Result<(), BackendError> {
        Ok(())
    }

    fn draw(&mut self, drawable: Drawable) -> Result<(), BackendError>;

    fn end_frame(&mut self, _frame: u64) -> Result<(), BackendError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "backend"
    }
}

impl<B: DrawBackend + ?Sized> DrawBackend for Box<B> {
    fn begin_frame(&mut self, frame: u64) -> Result<(), BackendError> {
        (**self).begin_frame(frame)
    }

    fn draw(&mut self, drawable: Drawable) -> Result<(), BackendError> {
        (**self).draw(drawable)
    }

    fn end_frame(&mut self, frame: u64) -> Result<(), BackendError> {
        (**self).end_frame(frame)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Backend that only logs draw calls.
#[derive(Debug, Default)]
pub struct LogBackend {
    drawn: u64,
}

impl LogBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drawn(&self) -> u64 {
        self.drawn
    }
}

impl DrawBackend for LogBackend {
    fn draw(&mut self, drawable: Drawable) -> Result<(), BackendError> {
        self.drawn += 1;
        log::trace!(
            "draw #{} {} tag={} color={:?}",
            self.drawn,
            drawable.shape().name(),
            drawable.tag(),
            drawable.color()
        );
        Ok(())
    }

    fn end_frame(&mut self, frame: u64) -> Result<(), BackendError> {
        log::trace!("frame {} done ({} drawn so far)", frame, self.drawn);
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Drawables received during one frame.
#[derive(Debug, Clone, Default)]
pub struct RecordedFrame {
    pub frame: u64,
    pub drawables: Vec<Drawable>,
}

/// Backend that keeps everything it receives, grouped per frame.
///
/// Clones share the same recording, so one clone can be moved into the
/// canvas while another is inspected from the owning thread.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    frames: Arc<Mutex<Vec<RecordedFrame>>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames recorded so far, including empty ones.
    pub fn frames(&self) -> Vec<RecordedFrame> {
        self.frames.lock().clone()
    }

    /// All drawables in draw order, across frames.
    pub fn drawn(&self) -> Vec<Drawable> {
        self.frames
            .lock()
            .iter()
            .flat_map(|frame| frame.drawables.iter().cloned())
            .collect()
    }

    pub fn drawn_count(&self) -> usize {
        self.frames.lock().iter().map(|f| f.drawables.len()).sum()
    }
}

impl DrawBackend for RecordingBackend {
    fn begin_frame(&mut self, frame: u64) -> Result<(), BackendError> {
        self.frames.lock().push(RecordedFrame {
            frame,
            drawables: Vec::new(),
        });
        Ok(())
    }

    fn draw(&mut self, drawable: Drawable) -> Result<(), BackendError> {
        let mut frames = self.frames.lock();
        match frames.last_mut() {
            Some(current) => current.drawables.push(drawable),
            None => frames.push(RecordedFrame {
                frame: 0,
                drawables: vec![drawable],
            }),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::{RED, Shape};

    fn dot(tag: u64) -> Drawable {
        Drawable::new(
            Shape::Circle {
                center: (0.0, 0.0),
                radius: 1.0,
                sides: 8,
            },
            RED,
        )
        .with_tag(tag)
    }

    #[test]
    fn recording_groups_by_frame() {
        let mut backend = RecordingBackend::new();
        let observer = backend.clone();

        backend.begin_frame(1).unwrap();
        backend.draw(dot(1)).unwrap();
        backend.draw(dot(2)).unwrap();
        backend.end_frame(1).unwrap();
        backend.begin_frame(2).unwrap();
        backend.end_frame(2).unwrap();

        let frames = observer.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].drawables.len(), 2);
        assert!(frames[1].drawables.is_empty());
        assert_eq!(
            observer.drawn().iter().map(Drawable::tag).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn boxed_backend_forwards_calls() {
        let mut backend: Box<dyn DrawBackend> = Box::new(LogBackend::new());
        assert_eq!(backend.name(), "log");
        backend.draw(dot(0)).unwrap();
        assert!(!BackendError::Draw("x".into()).is_fatal());
        assert!(BackendError::Fatal("x".into()).is_fatal());
    }
}
