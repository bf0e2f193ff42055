//! Encoder capability and recording errors
//!
//! An encoder consumes a combined stream (surface video + source audio) and
//! emits timed binary chunks until it is told to stop and has flushed.

use super::state::RecordedChunk;
use crate::capture::AudioTrack;
use crate::surface::SurfaceStream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Recording-related errors
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Recording already in progress")]
    AlreadyRecording,

    #[error("Not currently recording")]
    NotRecording,

    #[error("No audio/video source: {0}")]
    NoAudioVideoSource(String),

    #[error("Recording failed: no video data was captured")]
    EmptyRecording,

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RecordingResult<T> = Result<T, RecordingError>;

/// Container format of recorded clips
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingFormat {
    #[default]
    Webm,
    Mp4,
}

impl RecordingFormat {
    /// Media type embedded in the artifact
    pub fn mime_type(&self) -> &'static str {
        match self {
            RecordingFormat::Webm => "video/webm",
            RecordingFormat::Mp4 => "video/mp4",
        }
    }

    /// File extension for exported clips
    pub fn extension(&self) -> &'static str {
        match self {
            RecordingFormat::Webm => "webm",
            RecordingFormat::Mp4 => "mp4",
        }
    }

    /// FFmpeg video codec for this format
    pub fn video_codec(&self) -> &'static str {
        match self {
            RecordingFormat::Webm => "libvpx",
            RecordingFormat::Mp4 => "libx264",
        }
    }

    /// FFmpeg audio codec for this format
    pub fn audio_codec(&self) -> &'static str {
        match self {
            RecordingFormat::Webm => "libopus",
            RecordingFormat::Mp4 => "aac",
        }
    }

    /// Format matching a media type, ignoring codec parameters
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        let base = mime_type.split(';').next().unwrap_or("").trim();
        match base {
            "video/webm" => Some(RecordingFormat::Webm),
            "video/mp4" => Some(RecordingFormat::Mp4),
            _ => None,
        }
    }
}

/// Surface video combined with the source's audio tracks
pub struct CombinedStream {
    pub video: SurfaceStream,
    pub audio: Vec<AudioTrack>,
}

/// A started encoder: its chunk output plus the handle to stop it
///
/// The chunk channel closes once the encoder has flushed everything.
pub struct EncoderSession {
    pub chunks: mpsc::UnboundedReceiver<RecordedChunk>,
    pub control: Box<dyn EncoderControl>,
}

/// Stop signal for a running encoder
#[async_trait]
pub trait EncoderControl: Send {
    /// Stop consuming input and begin flushing
    async fn stop(&mut self) -> RecordingResult<()>;
}

/// Encodes a combined stream into timed chunks
#[async_trait]
pub trait MediaEncoder: Send + Sync {
    async fn start(
        &self,
        stream: CombinedStream,
        format: RecordingFormat,
    ) -> RecordingResult<EncoderSession>;
}
