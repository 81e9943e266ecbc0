//! Recording state management
//!
//! Defines the recording state machine, the events a recording emits and
//! the finalized artifact.

use super::encoder::{decode_frames, DecodedFrame, EncodeError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Current state of a recording session
///
/// ```text
/// idle → recording → finalizing → stopped
///           ↑                        │
///           └────────── start ───────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// Never started
    #[default]
    Idle,
    /// Accepting chunks
    Recording,
    /// Stop requested, waiting for the recorder to flush
    Finalizing,
    /// Artifact produced
    Stopped,
}

impl RecordingState {
    /// Recording or finalizing
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Recording | Self::Finalizing)
    }
}

/// Which stream a recording session captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingRole {
    /// The camera stream as acquired
    Raw,
    /// The compositing surface (camera + overlay)
    Composited,
}

impl fmt::Display for RecordingRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingRole::Raw => f.write_str("raw"),
            RecordingRole::Composited => f.write_str("composited"),
        }
    }
}

/// Events emitted by a recording session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingEvent {
    /// Recording (re)started
    Started { generation: u64 },
    /// A non-empty chunk was appended
    Chunk { index: usize, len: usize },
    /// Finalized
    Stopped { chunk_count: usize, byte_len: usize },
}

/// The finalized, playable output of one recording run
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub id: Uuid,
    pub role: RecordingRole,
    pub mime_type: String,
    pub chunk_count: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    data: Arc<Vec<u8>>,
}

impl Artifact {
    pub fn new(
        role: RecordingRole,
        mime_type: impl Into<String>,
        chunk_count: usize,
        started_at: DateTime<Utc>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            mime_type: mime_type.into(),
            chunk_count,
            started_at,
            finished_at: Utc::now(),
            data: Arc::new(data),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Decode the recorded frames
    pub fn frames(&self) -> Result<Vec<DecodedFrame>, EncodeError> {
        decode_frames(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_states() {
        assert!(!RecordingState::Idle.is_active());
        assert!(RecordingState::Recording.is_active());
        assert!(RecordingState::Finalizing.is_active());
        assert!(!RecordingState::Stopped.is_active());
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&RecordingState::Finalizing).unwrap();
        assert_eq!(json, "\"finalizing\"");
    }

    #[test]
    fn test_empty_artifact() {
        let artifact = Artifact::new(RecordingRole::Composited, "video/x-ovr", 0, Utc::now(), Vec::new());
        assert!(artifact.is_empty());
        assert!(artifact.frames().unwrap().is_empty());
        assert!(artifact.duration_ms() >= 0);
    }
}
