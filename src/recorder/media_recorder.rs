//! Chunked stream recorder
//!
//! Samples a [`MediaStream`] once per chunk interval, encodes the frame and
//! emits it as a `DataAvailable` event. Stopping emits a final `Stopped`
//! event after every pending chunk.

use super::encoder::{encode_chunk, ChunkEncoding};
use crate::capture::frame::FrameSource;
use crate::capture::stream::MediaStream;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

/// Events emitted by a running recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// One chunk boundary passed; empty when no frame was available
    DataAvailable(Vec<u8>),
    /// The recorder has flushed and will emit nothing else
    Stopped,
}

pub struct Recorder {
    id: Uuid,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl Recorder {
    /// Start recording `stream` on the current tokio runtime
    pub fn start(
        stream: MediaStream,
        encoding: ChunkEncoding,
        interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<RecorderEvent>) {
        let id = Uuid::new_v4();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();

        tokio::spawn(run_recorder(id, stream, encoding, interval, event_tx, stop_rx));

        (
            Self {
                id,
                stop_tx: Some(stop_tx),
            },
            event_rx,
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ask the recorder to stop. The `Stopped` event follows asynchronously.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn run_recorder(
    id: Uuid,
    stream: MediaStream,
    encoding: ChunkEncoding,
    interval: Duration,
    events: mpsc::UnboundedSender<RecorderEvent>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let started = Instant::now();
    let mut ticker = tokio::time::interval_at(started + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!("Recorder {} started ({:?} chunks, {:?})", id, interval, encoding);

    loop {
        tokio::select! {
            biased;
            // Either an explicit stop or the handle being dropped
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                let pts_ms = started.elapsed().as_millis() as u64;
                let data = match stream.current_frame() {
                    // Awaited in place so chunks stay in pts order
                    Some(frame) => {
                        match tokio::task::spawn_blocking(move || encode_chunk(&frame, pts_ms, encoding)).await {
                            Ok(Ok(data)) => data,
                            Ok(Err(e)) => {
                                tracing::warn!("Recorder {} failed to encode chunk: {}", id, e);
                                Vec::new()
                            }
                            Err(e) => {
                                tracing::warn!("Recorder {} encode task failed: {}", id, e);
                                Vec::new()
                            }
                        }
                    }
                    None => Vec::new(),
                };
                if events.send(RecorderEvent::DataAvailable(data)).is_err() {
                    break;
                }
            }
        }
    }

    let _ = events.send(RecorderEvent::Stopped);
    tracing::debug!("Recorder {} stopped", id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::Frame;
    use crate::recorder::encoder::decode_frames;
    use std::sync::Arc;

    struct Solid;

    impl FrameSource for Solid {
        fn current_frame(&self) -> Option<Arc<Frame>> {
            Some(Arc::new(Frame::filled(2, 2, [1, 2, 3, 255])))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_chunks_then_stopped() {
        let stream = MediaStream::new(Arc::new(Solid), false);
        let (mut recorder, mut rx) = Recorder::start(stream, ChunkEncoding::Raw, Duration::from_millis(10));

        for _ in 0..3 {
            match rx.recv().await {
                Some(RecorderEvent::DataAvailable(data)) => assert!(!data.is_empty()),
                other => panic!("unexpected event {:?}", other),
            }
        }

        recorder.stop();
        loop {
            match rx.recv().await {
                Some(RecorderEvent::DataAvailable(_)) => continue,
                Some(RecorderEvent::Stopped) => break,
                None => panic!("channel closed before Stopped"),
            }
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_stream_gives_empty_chunks() {
        let stream = MediaStream::new(Arc::new(Solid), false);
        stream.release();
        let (mut recorder, mut rx) = Recorder::start(stream, ChunkEncoding::Raw, Duration::from_millis(10));

        assert_eq!(rx.recv().await, Some(RecorderEvent::DataAvailable(Vec::new())));
        recorder.stop();
    }

    #[tokio::test]
    async fn test_png_chunks_arrive_in_pts_order() {
        let stream = MediaStream::new(Arc::new(Solid), false);
        let (mut recorder, mut rx) = Recorder::start(stream, ChunkEncoding::Png, Duration::from_millis(5));

        let mut artifact = Vec::new();
        for _ in 0..4 {
            match rx.recv().await {
                Some(RecorderEvent::DataAvailable(data)) => artifact.extend(data),
                other => panic!("unexpected event {:?}", other),
            }
        }
        recorder.stop();

        let frames = decode_frames(&artifact).unwrap();
        assert_eq!(frames.len(), 4);
        assert!(frames.windows(2).all(|w| w[0].pts_ms < w[1].pts_ms));
        assert_eq!(frames[0].encoding, ChunkEncoding::Png);
        assert_eq!(frames[0].frame.pixel(1, 1), Some([1, 2, 3, 255]));
    }
}
