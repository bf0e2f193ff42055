//! Recording session
//!
//! Drives one encoder at a time through the recording lifecycle and turns
//! its chunks into a finished artifact.

use super::encoder::{
    CombinedStream, EncoderControl, MediaEncoder, RecordingError, RecordingFormat, RecordingResult,
};
use super::state::{Artifact, RecordedChunk, RecordingState};
use crate::capture::LiveSource;
use crate::config::RecordingConfig;
use crate::surface::{capture_stream, SharedSurface};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Events emitted during recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingEvent {
    /// Recording started
    Started,
    /// Stop requested, encoder flushing
    Finalizing,
    /// Artifact assembled
    Saved { size_bytes: usize, chunk_count: usize },
    /// Recording produced no usable data or the encoder failed
    Failed(String),
}

/// Encoder state owned by an in-progress recording
struct ActiveRecording {
    control: Box<dyn EncoderControl>,
    chunks: Arc<Mutex<Vec<RecordedChunk>>>,
    collector: JoinHandle<()>,
    format: RecordingFormat,
}

/// The single recording session of the application
pub struct RecordingSession {
    /// Current recording state
    state: Arc<RwLock<RecordingState>>,

    encoder: Arc<dyn MediaEncoder>,

    config: RecordingConfig,

    active: Option<ActiveRecording>,

    /// Time when recording started
    start_time: Option<Instant>,

    /// Event broadcaster
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl RecordingSession {
    pub fn new(encoder: Arc<dyn MediaEncoder>, config: RecordingConfig) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(RecordingState::Idle)),
            encoder,
            config,
            active: None,
            start_time: None,
            event_tx,
        }
    }

    /// Get the current recording state
    pub fn state(&self) -> RecordingState {
        *self.state.read()
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Recording
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    /// Elapsed recording time in milliseconds (0 when idle)
    pub fn duration_ms(&self) -> f64 {
        match (self.state(), self.start_time) {
            (RecordingState::Recording, Some(start)) => start.elapsed().as_secs_f64() * 1000.0,
            _ => 0.0,
        }
    }

    fn set_state(&self, state: RecordingState) {
        *self.state.write() = state;
    }

    /// Start recording the surface with the source's audio
    pub async fn start(
        &mut self,
        surface: &SharedSurface,
        source: &dyn LiveSource,
    ) -> RecordingResult<()> {
        if self.state() != RecordingState::Idle {
            return Err(RecordingError::AlreadyRecording);
        }

        let audio = source.audio_tracks();
        if audio.is_empty() && !self.config.allow_video_only {
            return Err(RecordingError::NoAudioVideoSource(format!(
                "source '{}' has no audio tracks",
                source.id()
            )));
        }

        let video = capture_stream(surface, self.config.frame_rate).ok_or_else(|| {
            RecordingError::NoAudioVideoSource("surface has no drawn frames to capture".to_string())
        })?;

        let format = self.config.format;
        tracing::info!(
            "Starting recording: {}x{} @ {}fps, {} audio track(s), {}",
            video.width(),
            video.height(),
            video.fps(),
            audio.len(),
            format.mime_type()
        );

        let session = self
            .encoder
            .start(CombinedStream { video, audio }, format)
            .await?;

        let chunks = Arc::new(Mutex::new(Vec::new()));
        let collector_chunks = chunks.clone();
        let mut chunk_rx = session.chunks;
        let collector = tokio::spawn(async move {
            while let Some(chunk) = chunk_rx.recv().await {
                tracing::trace!(
                    "Chunk {} ({} bytes at {:?})",
                    chunk.sequence,
                    chunk.data.len(),
                    chunk.elapsed
                );
                collector_chunks.lock().push(chunk);
            }
        });

        self.active = Some(ActiveRecording {
            control: session.control,
            chunks,
            collector,
            format,
        });
        self.start_time = Some(Instant::now());
        self.set_state(RecordingState::Recording);
        let _ = self.event_tx.send(RecordingEvent::Started);

        tracing::info!("Recording started");
        Ok(())
    }

    /// Stop recording, wait for the encoder flush and assemble the artifact
    pub async fn stop(&mut self) -> RecordingResult<Artifact> {
        if self.state() != RecordingState::Recording {
            return Err(RecordingError::NotRecording);
        }
        let Some(mut active) = self.active.take() else {
            self.set_state(RecordingState::Idle);
            return Err(RecordingError::NotRecording);
        };

        tracing::info!("Stopping recording after {:.0}ms", self.duration_ms());
        self.set_state(RecordingState::Finalizing);
        let _ = self.event_tx.send(RecordingEvent::Finalizing);

        if let Err(e) = active.control.stop().await {
            active.collector.abort();
            return Err(self.fail(e));
        }

        // The collector ends when the encoder closes its chunk channel,
        // which happens only after the flush completes.
        if let Err(e) = (&mut active.collector).await {
            return Err(self.fail(RecordingError::Encoder(format!(
                "chunk collector failed: {}",
                e
            ))));
        }

        let chunks = std::mem::take(&mut *active.chunks.lock());
        let artifact = Artifact::from_chunks(active.format.mime_type(), &chunks);
        tracing::info!(
            "Encoder flushed: {} chunks, {} bytes",
            chunks.len(),
            artifact.len()
        );

        if chunks.is_empty() || artifact.is_empty() {
            return Err(self.fail(RecordingError::EmptyRecording));
        }

        self.set_state(RecordingState::Saved);
        let _ = self.event_tx.send(RecordingEvent::Saved {
            size_bytes: artifact.len(),
            chunk_count: chunks.len(),
        });

        self.start_time = None;
        self.set_state(RecordingState::Idle);
        Ok(artifact)
    }

    /// Enter `Failed`, report it, and return to `Idle`
    fn fail(&mut self, error: RecordingError) -> RecordingError {
        tracing::error!("Recording failed: {}", error);
        self.set_state(RecordingState::Failed);
        let _ = self.event_tx.send(RecordingEvent::Failed(error.to_string()));
        self.start_time = None;
        self.set_state(RecordingState::Idle);
        error
    }
}
