//! Recording state management
//!
//! Defines the recording state machine, recorded chunks and the finished
//! artifact they assemble into.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Current state of the recording session
///
/// `Idle -> Recording -> Finalizing -> (Saved | Failed) -> Idle`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording in progress
    #[default]
    Idle,
    /// Encoder running, chunks accumulating
    Recording,
    /// Encoder flushing its last chunks
    Finalizing,
    /// Artifact assembled
    Saved,
    /// Recording produced nothing usable
    Failed,
}

/// A timed fragment of encoded data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedChunk {
    /// Position in the encoder's output
    pub sequence: u64,

    /// Time since the encoder started
    pub elapsed: Duration,

    pub data: Vec<u8>,
}

/// Finished binary video: media type plus bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    mime_type: String,
    bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Concatenate chunks in the order given
    pub fn from_chunks(mime_type: impl Into<String>, chunks: &[RecordedChunk]) -> Self {
        let total = chunks.iter().map(|c| c.data.len()).sum();
        let mut bytes = Vec::with_capacity(total);
        for chunk in chunks {
            bytes.extend_from_slice(&chunk.data);
        }
        Self::new(mime_type, bytes)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
