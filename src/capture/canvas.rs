//! Stream capture off a compositing surface

use super::frame::{Frame, FrameSource};
use super::stream::MediaStream;
use crate::compositor::SharedSurface;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Target frame rate for surface capture
pub const DEFAULT_CAPTURE_FPS: u32 = 60;

/// Capture `surface` as a video-only stream sampled at up to `fps` frames per second
pub fn capture_surface(surface: SharedSurface, fps: u32) -> MediaStream {
    MediaStream::new(Arc::new(SurfaceCapture::new(surface, fps)), false)
}

struct SurfaceCapture {
    surface: SharedSurface,
    frame_period: Duration,
    last: Mutex<Option<(Instant, Arc<Frame>)>>,
}

impl SurfaceCapture {
    fn new(surface: SharedSurface, fps: u32) -> Self {
        Self {
            surface,
            frame_period: Duration::from_secs(1) / fps.max(1),
            last: Mutex::new(None),
        }
    }
}

impl FrameSource for SurfaceCapture {
    fn current_frame(&self) -> Option<Arc<Frame>> {
        let mut last = self.last.lock();
        if let Some((taken_at, frame)) = last.as_ref() {
            if taken_at.elapsed() < self.frame_period {
                return Some(frame.clone());
            }
        }

        let frame = Arc::new(self.surface.lock().snapshot());
        *last = Some((Instant::now(), frame.clone()));
        Some(frame)
    }
}
