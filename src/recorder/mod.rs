//! Recording system module
//!
//! This module implements the clip recording pipeline:
//! - MediaEncoder trait for turning a combined stream into chunks
//! - RecordingSession to drive the recording lifecycle
//! - FfmpegEncoder as the production encoder

pub mod encoder;
pub mod ffmpeg;
pub mod session;
pub mod state;

pub use encoder::{
    CombinedStream, EncoderControl, EncoderSession, MediaEncoder, RecordingError, RecordingFormat,
    RecordingResult,
};
pub use ffmpeg::FfmpegEncoder;
pub use session::{RecordingEvent, RecordingSession};
pub use state::{Artifact, RecordedChunk, RecordingState};
