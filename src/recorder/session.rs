//! Recording session
//!
//! Wraps a [`Recorder`] in the `Idle → Recording → Finalizing → Stopped`
//! state machine, keeps the ordered chunk sequence and produces the artifact.

use super::encoder::ChunkEncoding;
use super::media_recorder::{Recorder, RecorderEvent};
use super::state::{Artifact, RecordingEvent, RecordingRole, RecordingState};
use crate::capture::stream::MediaStream;
use crate::present::ArtifactSink;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use uuid::Uuid;

/// Default chunk interval
pub const DEFAULT_CHUNK_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordingError {
    #[error("The {0} recording is already in progress")]
    AlreadyRecording(RecordingRole),

    #[error("The {0} recording is not running")]
    NotRecording(RecordingRole),

    #[error("Cannot record the {0} stream: it has been released")]
    InactiveStream(RecordingRole),

    #[error("The {0} recording ended before it was finalized")]
    FinalizeAborted(RecordingRole),
}

/// Mutable session state, protected by `parking_lot::Mutex`
struct SessionInner {
    state: RecordingState,
    generation: u64,
    chunks: Vec<Vec<u8>>,
    recorder: Option<Recorder>,
    stream_id: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
    finalized: Option<watch::Receiver<Option<Artifact>>>,
    artifact: Option<Artifact>,
    /// Set by `abort`: finalize without publishing
    discard: bool,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            state: RecordingState::Idle,
            generation: 0,
            chunks: Vec::new(),
            recorder: None,
            stream_id: None,
            started_at: None,
            finalized: None,
            artifact: None,
            discard: false,
        }
    }
}

pub struct RecordingSession {
    role: RecordingRole,
    label: String,
    encoding: ChunkEncoding,
    sink: Option<Arc<dyn ArtifactSink>>,
    inner: Arc<Mutex<SessionInner>>,
    events: broadcast::Sender<RecordingEvent>,
}

impl RecordingSession {
    pub fn new(role: RecordingRole, label: impl Into<String>, encoding: ChunkEncoding) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            role,
            label: label.into(),
            encoding,
            sink: None,
            inner: Arc::new(Mutex::new(SessionInner::new())),
            events,
        }
    }

    /// Publish finalized artifacts to `sink`; the sink is reset on every start
    pub fn with_sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn role(&self) -> RecordingRole {
        self.role
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> RecordingState {
        self.inner.lock().state
    }

    /// Incremented on every successful start
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// ID of the active recorder, if any
    pub fn recorder_id(&self) -> Option<Uuid> {
        self.inner.lock().recorder.as_ref().map(Recorder::id)
    }

    /// ID of the stream being recorded in the current run
    pub fn stream_id(&self) -> Option<Uuid> {
        self.inner.lock().stream_id
    }

    pub fn chunk_count(&self) -> usize {
        self.inner.lock().chunks.len()
    }

    /// Copy of the chunks accumulated so far, in order
    pub fn chunks(&self) -> Vec<Vec<u8>> {
        self.inner.lock().chunks.clone()
    }

    /// Artifact of the last completed run
    pub fn artifact(&self) -> Option<Artifact> {
        self.inner.lock().artifact.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.events.subscribe()
    }

    /// Start recording `stream`. Idle or Stopped → Recording.
    pub fn start(&self, stream: MediaStream, chunk_interval: Duration) -> Result<(), RecordingError> {
        let mut inner = self.inner.lock();
        if inner.state.is_active() {
            tracing::warn!("Ignoring start: {} recording already in progress", self.role);
            return Err(RecordingError::AlreadyRecording(self.role));
        }
        if !stream.is_active() {
            tracing::warn!("Ignoring start: {} stream has been released", self.role);
            return Err(RecordingError::InactiveStream(self.role));
        }

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.reset() {
                tracing::warn!("Failed to clear previous results: {}", e);
            }
        }

        let stream_id = stream.id();
        let (recorder, recorder_events) = Recorder::start(stream, self.encoding, chunk_interval);
        let (done_tx, done_rx) = watch::channel(None);

        inner.generation += 1;
        inner.state = RecordingState::Recording;
        inner.chunks.clear();
        inner.stream_id = Some(stream_id);
        inner.started_at = Some(Utc::now());
        inner.finalized = Some(done_rx);
        inner.artifact = None;
        inner.discard = false;

        let generation = inner.generation;
        tracing::info!(
            "Started {} recording #{} (recorder {}, {:?} chunks)",
            self.role,
            generation,
            recorder.id(),
            chunk_interval
        );
        inner.recorder = Some(recorder);
        drop(inner);

        let pump = ChunkPump {
            role: self.role,
            label: self.label.clone(),
            encoding: self.encoding,
            generation,
            sink: self.sink.clone(),
            inner: self.inner.clone(),
            events: self.events.clone(),
            done: done_tx,
        };
        tokio::spawn(pump.run(recorder_events));

        let _ = self.events.send(RecordingEvent::Started { generation });
        Ok(())
    }

    /// Stop recording and wait for the artifact.
    ///
    /// Recording → Finalizing → Stopped. Calling it again once stopped
    /// returns the same artifact.
    pub async fn stop(&self) -> Result<Artifact, RecordingError> {
        self.finish(false).await
    }

    /// Stop recording without publishing the result.
    ///
    /// Used to undo a start that could not be completed: the session still
    /// ends Stopped, but the sink never sees the artifact.
    pub async fn abort(&self) -> Result<Artifact, RecordingError> {
        self.finish(true).await
    }

    async fn finish(&self, discard: bool) -> Result<Artifact, RecordingError> {
        let mut finalized = {
            let mut inner = self.inner.lock();
            match inner.state {
                RecordingState::Idle => {
                    tracing::warn!("Ignoring stop: {} recording never started", self.role);
                    return Err(RecordingError::NotRecording(self.role));
                }
                RecordingState::Stopped => {
                    return inner
                        .artifact
                        .clone()
                        .ok_or(RecordingError::NotRecording(self.role));
                }
                RecordingState::Recording => {
                    inner.state = RecordingState::Finalizing;
                    inner.discard = discard;
                    if let Some(recorder) = inner.recorder.as_mut() {
                        recorder.stop();
                    }
                    tracing::debug!("Finalizing {} recording", self.role);
                }
                RecordingState::Finalizing => {}
            }
            inner
                .finalized
                .clone()
                .ok_or(RecordingError::FinalizeAborted(self.role))?
        };

        let artifact = finalized
            .wait_for(Option::is_some)
            .await
            .map_err(|_| RecordingError::FinalizeAborted(self.role))?
            .clone();
        artifact.ok_or(RecordingError::FinalizeAborted(self.role))
    }
}

/// Moves recorder output into the session and finalizes it
struct ChunkPump {
    role: RecordingRole,
    label: String,
    encoding: ChunkEncoding,
    generation: u64,
    sink: Option<Arc<dyn ArtifactSink>>,
    inner: Arc<Mutex<SessionInner>>,
    events: broadcast::Sender<RecordingEvent>,
    done: watch::Sender<Option<Artifact>>,
}

impl ChunkPump {
    async fn run(self, mut recorder_events: mpsc::UnboundedReceiver<RecorderEvent>) {
        while let Some(event) = recorder_events.recv().await {
            match event {
                RecorderEvent::DataAvailable(data) => self.append(data),
                RecorderEvent::Stopped => break,
            }
        }
        self.finalize();
    }

    fn append(&self, data: Vec<u8>) {
        if data.is_empty() {
            return;
        }
        let len = data.len();
        let index = {
            let mut inner = self.inner.lock();
            if inner.generation != self.generation || inner.state != RecordingState::Recording {
                return;
            }
            inner.chunks.push(data);
            inner.chunks.len() - 1
        };
        let _ = self.events.send(RecordingEvent::Chunk { index, len });
    }

    fn finalize(self) {
        let (artifact, discard) = {
            let mut inner = self.inner.lock();
            if inner.generation != self.generation {
                return;
            }
            let chunks = std::mem::take(&mut inner.chunks);
            let chunk_count = chunks.len();
            let artifact = Artifact::new(
                self.role,
                self.encoding.mime_type(),
                chunk_count,
                inner.started_at.unwrap_or_else(Utc::now),
                chunks.concat(),
            );
            // Keep the sequence inspectable after stop
            inner.chunks = chunks;
            inner.state = RecordingState::Stopped;
            inner.recorder = None;
            inner.artifact = Some(artifact.clone());
            (artifact, inner.discard)
        };

        tracing::info!(
            "Finalized {} recording #{}: {} chunks, {} bytes",
            self.role,
            self.generation,
            artifact.chunk_count,
            artifact.len()
        );

        match &self.sink {
            Some(_) if discard => tracing::debug!("Discarded {} recording '{}'", self.role, self.label),
            Some(sink) => {
                if let Err(e) = sink.publish(&artifact, &self.label) {
                    tracing::error!("Failed to publish '{}': {}", self.label, e);
                }
            }
            None => {}
        }

        let _ = self.events.send(RecordingEvent::Stopped {
            chunk_count: artifact.chunk_count,
            byte_len: artifact.len(),
        });
        let _ = self.done.send(Some(artifact));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::{Frame, FrameSource};
    use crate::present::MemorySink;
    use std::sync::atomic::{AtomicU8, Ordering};

    /// Each call yields a frame one shade brighter than the last
    struct Ramp(AtomicU8);

    impl FrameSource for Ramp {
        fn current_frame(&self) -> Option<Arc<Frame>> {
            let shade = self.0.fetch_add(1, Ordering::SeqCst);
            Some(Arc::new(Frame::filled(2, 2, [shade, 0, 0, 255])))
        }
    }

    struct Empty;

    impl FrameSource for Empty {
        fn current_frame(&self) -> Option<Arc<Frame>> {
            None
        }
    }

    fn ramp_stream() -> MediaStream {
        MediaStream::new(Arc::new(Ramp(AtomicU8::new(0))), false)
    }

    async fn wait_for_chunks(rx: &mut broadcast::Receiver<RecordingEvent>, count: usize) {
        let mut seen = 0;
        while seen < count {
            if let RecordingEvent::Chunk { .. } = rx.recv().await.unwrap() {
                seen += 1;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_record_stop() {
        let session = RecordingSession::new(RecordingRole::Raw, "raw", ChunkEncoding::Raw);
        let mut events = session.subscribe();
        assert_eq!(session.state(), RecordingState::Idle);

        session.start(ramp_stream(), DEFAULT_CHUNK_INTERVAL).unwrap();
        assert_eq!(session.state(), RecordingState::Recording);
        wait_for_chunks(&mut events, 3).await;

        let artifact = session.stop().await.unwrap();
        assert_eq!(session.state(), RecordingState::Stopped);
        assert!(artifact.chunk_count >= 3);
        assert_eq!(artifact.chunk_count, session.chunk_count());
        assert_eq!(artifact.bytes(), session.chunks().concat().as_slice());
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_stay_in_temporal_order() {
        let session = RecordingSession::new(RecordingRole::Raw, "raw", ChunkEncoding::Png);
        let mut events = session.subscribe();

        session.start(ramp_stream(), DEFAULT_CHUNK_INTERVAL).unwrap();
        wait_for_chunks(&mut events, 5).await;
        let artifact = session.stop().await.unwrap();

        let frames = artifact.frames().unwrap();
        assert_eq!(frames.len(), artifact.chunk_count);
        for pair in frames.windows(2) {
            assert!(pair[0].pts_ms < pair[1].pts_ms);
            assert!(pair[0].frame.pixel(0, 0).unwrap()[0] < pair[1].frame.pixel(0, 0).unwrap()[0]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let session = RecordingSession::new(RecordingRole::Raw, "raw", ChunkEncoding::Raw);
        let mut events = session.subscribe();
        session.start(ramp_stream(), DEFAULT_CHUNK_INTERVAL).unwrap();
        wait_for_chunks(&mut events, 2).await;

        let first = session.stop().await.unwrap();
        let second = session.stop().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_stops_share_one_artifact() {
        let session = RecordingSession::new(RecordingRole::Raw, "raw", ChunkEncoding::Raw);
        session.start(ramp_stream(), DEFAULT_CHUNK_INTERVAL).unwrap();
        tokio::time::sleep(Duration::from_millis(35)).await;

        let (a, b) = tokio::join!(session.stop(), session.stop());
        assert_eq!(a.unwrap().id, b.unwrap().id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_recording_is_rejected() {
        let session = RecordingSession::new(RecordingRole::Composited, "canvas", ChunkEncoding::Raw);
        session.start(ramp_stream(), DEFAULT_CHUNK_INTERVAL).unwrap();
        let recorder = session.recorder_id();
        let stream = session.stream_id();

        let err = session.start(ramp_stream(), DEFAULT_CHUNK_INTERVAL).unwrap_err();
        assert_eq!(err, RecordingError::AlreadyRecording(RecordingRole::Composited));
        assert_eq!(session.recorder_id(), recorder);
        assert_eq!(session.stream_id(), stream);
        assert_eq!(session.generation(), 1);

        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_before_start_is_conflict() {
        let session = RecordingSession::new(RecordingRole::Raw, "raw", ChunkEncoding::Raw);
        let err = session.stop().await.unwrap_err();
        assert_eq!(err, RecordingError::NotRecording(RecordingRole::Raw));
    }

    #[tokio::test]
    async fn test_released_stream_is_rejected() {
        let session = RecordingSession::new(RecordingRole::Raw, "raw", ChunkEncoding::Raw);
        let stream = ramp_stream();
        stream.release();
        let err = session.start(stream, DEFAULT_CHUNK_INTERVAL).unwrap_err();
        assert_eq!(err, RecordingError::InactiveStream(RecordingRole::Raw));
        assert_eq!(session.state(), RecordingState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_frames_gives_empty_artifact() {
        let session = RecordingSession::new(RecordingRole::Raw, "raw", ChunkEncoding::Png);
        session
            .start(MediaStream::new(Arc::new(Empty), false), DEFAULT_CHUNK_INTERVAL)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let artifact = session.stop().await.unwrap();
        assert!(artifact.is_empty());
        assert_eq!(artifact.chunk_count, 0);
        assert_eq!(session.state(), RecordingState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_resets_chunks_and_sink() {
        let sink = Arc::new(MemorySink::new());
        let session = RecordingSession::new(RecordingRole::Composited, "Download canvas record 1", ChunkEncoding::Raw)
            .with_sink(sink.clone());
        let mut events = session.subscribe();

        session.start(ramp_stream(), DEFAULT_CHUNK_INTERVAL).unwrap();
        wait_for_chunks(&mut events, 3).await;
        let first = session.stop().await.unwrap();

        let published = sink.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "Download canvas record 1");
        assert_eq!(published[0].1.id, first.id);

        session.start(ramp_stream(), DEFAULT_CHUNK_INTERVAL).unwrap();
        assert_eq!(session.generation(), 2);
        assert_eq!(session.chunk_count(), 0);
        assert!(session.artifact().is_none());
        assert!(sink.published().is_empty());
        assert_eq!(sink.reset_count(), 2);

        let second = session.stop().await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(sink.published().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_skips_publish() {
        let sink = Arc::new(MemorySink::new());
        let session = RecordingSession::new(RecordingRole::Composited, "Download canvas record 1", ChunkEncoding::Raw)
            .with_sink(sink.clone());
        let mut events = session.subscribe();

        session.start(ramp_stream(), DEFAULT_CHUNK_INTERVAL).unwrap();
        wait_for_chunks(&mut events, 2).await;

        let artifact = session.abort().await.unwrap();
        assert_eq!(session.state(), RecordingState::Stopped);
        assert_eq!(session.role(), RecordingRole::Composited);
        assert!(artifact.chunk_count >= 2);
        assert!(sink.published().is_empty());

        // A later run publishes again
        session.start(ramp_stream(), DEFAULT_CHUNK_INTERVAL).unwrap();
        wait_for_chunks(&mut events, 1).await;
        session.stop().await.unwrap();
        assert_eq!(sink.published().len(), 1);
    }
}
