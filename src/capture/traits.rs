//! Capture trait definitions
//!
//! Platform-agnostic traits for live audio/video sources.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::CaptureConfig;

/// Capture-related errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("No live source has been acquired")]
    NotAcquired,
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// A single RGBA video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Tightly packed RGBA pixels, row-major
    pub data: Arc<Vec<u8>>,
}

impl VideoFrame {
    /// Wrap RGBA pixel data
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::new(data),
        }
    }

    /// A frame filled with a single color
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(width, height, data)
    }

    /// Whether the buffer length matches the dimensions
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.byte_len()
    }

    /// Expected buffer length for the dimensions
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Read one pixel (None when out of bounds)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y * self.width + x) * 4) as usize;
        let px = self.data.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// How an encoder reads an audio device directly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioInput {
    /// Input format / demuxer name (e.g. "pulse", "avfoundation", "dshow")
    pub format: String,

    /// Device identifier understood by that format
    pub device: String,
}

/// An audio track belonging to a live source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTrack {
    pub id: String,
    pub label: String,
    pub input: AudioInput,
}

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,
}

/// A live audio/video signal
///
/// Shared between the overlay loop (reads frames) and the recorder
/// (reads audio tracks).
pub trait LiveSource: Send + Sync {
    /// Source identifier
    fn id(&self) -> &str;

    /// Whether a decodable frame is available right now
    fn is_frame_ready(&self) -> bool;

    /// Latest frame, if any
    fn current_frame(&self) -> Option<VideoFrame>;

    /// Native dimensions of the latest frame
    fn dimensions(&self) -> Option<(u32, u32)> {
        self.current_frame().map(|frame| (frame.width, frame.height))
    }

    /// Audio tracks captured alongside the video
    fn audio_tracks(&self) -> Vec<AudioTrack>;

    /// Release the underlying device
    fn stop(&self) {}
}

/// Requested capture parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRequest {
    pub video: bool,
    pub audio: bool,
    pub camera_id: Option<String>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl From<&CaptureConfig> for MediaRequest {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            video: true,
            audio: config.audio,
            camera_id: config.camera_id.clone(),
            width: config.width,
            height: config.height,
            fps: config.fps,
        }
    }
}

/// A device able to produce live sources
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Open the device and start delivering frames
    ///
    /// Fails with `DeviceUnavailable` if permission is denied or no device exists.
    async fn acquire(&self, request: &MediaRequest) -> CaptureResult<Arc<dyn LiveSource>>;
}
