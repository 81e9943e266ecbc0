//! Live preview sinks

use crate::capture::frame::{Frame, FrameSource};
use crate::capture::stream::MediaStream;
use crate::capture::traits::Resolution;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Shows a live stream while it is being recorded
pub trait PreviewSink: Send + Sync {
    fn set_source(&self, stream: &MediaStream);
}

/// Preview that holds on to the attached stream so it can be sampled
pub struct StreamPreview {
    size: Resolution,
    source: Mutex<Option<MediaStream>>,
}

impl StreamPreview {
    pub fn new(size: Resolution) -> Self {
        Self {
            size,
            source: Mutex::new(None),
        }
    }

    pub fn size(&self) -> Resolution {
        self.size
    }

    /// ID of the stream currently attached
    pub fn stream_id(&self) -> Option<Uuid> {
        self.source.lock().as_ref().map(MediaStream::id)
    }

    /// Latest frame of the attached stream
    pub fn snapshot(&self) -> Option<Arc<Frame>> {
        self.source.lock().as_ref().and_then(|s| s.current_frame())
    }
}

impl PreviewSink for StreamPreview {
    fn set_source(&self, stream: &MediaStream) {
        tracing::debug!("Preview attached to stream {}", stream.id());
        *self.source.lock() = Some(stream.clone());
    }
}
