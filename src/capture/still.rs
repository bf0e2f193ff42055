//! Programmatically fed live source
//!
//! Frames are pushed in by the owner rather than read from hardware. Used
//! for virtual cameras and in tests.

use super::traits::{AudioTrack, CaptureDevice, CaptureResult, LiveSource, MediaRequest, VideoFrame};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

/// A live source whose frames are set by hand
pub struct StillSource {
    id: String,
    frame: RwLock<Option<VideoFrame>>,
    audio: RwLock<Vec<AudioTrack>>,
}

impl StillSource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            frame: RwLock::new(None),
            audio: RwLock::new(Vec::new()),
        }
    }

    /// Builder-style initial frame
    pub fn with_frame(self, frame: VideoFrame) -> Self {
        *self.frame.write() = Some(frame);
        self
    }

    /// Builder-style audio track
    pub fn with_audio_track(self, track: AudioTrack) -> Self {
        self.audio.write().push(track);
        self
    }

    /// Replace the current frame
    pub fn set_frame(&self, frame: VideoFrame) {
        *self.frame.write() = Some(frame);
    }

    /// Drop the current frame so the source reports not-ready
    pub fn clear_frame(&self) {
        *self.frame.write() = None;
    }
}

impl LiveSource for StillSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_frame_ready(&self) -> bool {
        self.frame.read().as_ref().is_some_and(VideoFrame::is_valid)
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        self.frame.read().clone()
    }

    fn audio_tracks(&self) -> Vec<AudioTrack> {
        self.audio.read().clone()
    }
}

/// Capture device handing out a prepared source
pub struct StillDevice {
    source: Arc<StillSource>,
}

impl StillDevice {
    pub fn new(source: Arc<StillSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl CaptureDevice for StillDevice {
    async fn acquire(&self, _request: &MediaRequest) -> CaptureResult<Arc<dyn LiveSource>> {
        Ok(self.source.clone())
    }
}
