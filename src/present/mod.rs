//! Presentation sinks
//!
//! Output-only collaborators: live previews and the results area that
//! finalized recordings are published to.

pub mod preview;
pub mod sink;

pub use preview::{PreviewSink, StreamPreview};
pub use sink::{file_href, ArtifactManifest, ArtifactSink, DirectorySink, DownloadLink, MemorySink, SinkError};
