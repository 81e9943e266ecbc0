//! Recording system module
//!
//! This module implements chunked stream recording:
//! - Recorder samples a stream and emits encoded chunks
//! - RecordingSession drives the recording state machine and finalizes artifacts
//! - Chunk encoding and artifact decoding

pub mod encoder;
pub mod media_recorder;
pub mod session;
pub mod state;

pub use encoder::{decode_frames, ChunkEncoding, DecodedFrame, EncodeError};
pub use media_recorder::{Recorder, RecorderEvent};
pub use session::{RecordingError, RecordingSession, DEFAULT_CHUNK_INTERVAL};
pub use state::{Artifact, RecordingEvent, RecordingRole, RecordingState};
