//! Live media streams
//!
//! A [`MediaStream`] is a cheap, cloneable handle around a video frame source
//! plus an audio flag. Releasing any clone releases the stream for all of them.

use super::frame::{Frame, FrameSource};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct MediaStream {
    id: Uuid,
    video: Arc<dyn FrameSource>,
    has_audio: bool,
    active: Arc<AtomicBool>,
}

impl MediaStream {
    pub fn new(video: Arc<dyn FrameSource>, has_audio: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            video,
            has_audio,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn has_audio(&self) -> bool {
        self.has_audio
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop all tracks. Safe to call more than once.
    pub fn release(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.video.stop();
            tracing::debug!("Released media stream {}", self.id);
        }
    }
}

impl FrameSource for MediaStream {
    fn current_frame(&self) -> Option<Arc<Frame>> {
        if !self.is_active() {
            return None;
        }
        self.video.current_frame()
    }

    fn stop(&self) {
        self.release();
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("has_audio", &self.has_audio)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingSource {
        stops: AtomicUsize,
    }

    impl FrameSource for CountingSource {
        fn current_frame(&self) -> Option<Arc<Frame>> {
            Some(Arc::new(Frame::filled(1, 1, [9, 9, 9, 255])))
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_release_is_shared_and_idempotent() {
        let source = Arc::new(CountingSource {
            stops: AtomicUsize::new(0),
        });
        let stream = MediaStream::new(source.clone(), true);
        let clone = stream.clone();

        assert!(clone.current_frame().is_some());
        stream.release();
        stream.release();

        assert!(!clone.is_active());
        assert!(clone.current_frame().is_none());
        assert_eq!(source.stops.load(Ordering::SeqCst), 1);
        assert_eq!(stream.id(), clone.id());
    }
}
