//! Application configuration
//!
//! Every section has sensible defaults so a partial (or missing) config file
//! still yields a usable setup.

use crate::recorder::RecordingFormat;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FaceTrackConfig {
    pub capture: CaptureConfig,
    pub overlay: OverlayConfig,
    pub recording: RecordingConfig,
    pub library: LibraryConfig,
}

/// What to request from the capture device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    /// Camera index or name (None = default camera)
    pub camera_id: Option<String>,
    /// Requested capture width
    pub width: u32,
    /// Requested capture height
    pub height: u32,
    /// Requested capture FPS
    pub fps: u32,
    /// Whether to request audio alongside video
    pub audio: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera_id: None,
            width: 1280,
            height: 720,
            fps: 30,
            audio: true,
        }
    }
}

/// Detection overlay loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlayConfig {
    /// Ticks per second (display refresh equivalent)
    pub tick_rate: u32,
    /// RGBA color of the bounding box
    pub box_color: [u8; 4],
    /// RGBA color of landmark points and contours
    pub landmark_color: [u8; 4],
    /// Bounding box stroke width in pixels
    pub line_width: u32,
    /// Landmark dot radius in pixels
    pub landmark_radius: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            box_color: [0, 0, 255, 255],
            landmark_color: [0, 255, 255, 255],
            line_width: 2,
            landmark_radius: 1,
        }
    }
}

/// Recording session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordingConfig {
    /// Frame rate at which the composited surface is captured
    pub frame_rate: u32,
    /// Container format of recorded clips
    pub format: RecordingFormat,
    /// FFmpeg executable used by the default encoder
    pub ffmpeg_path: String,
    /// Maximum size of a single recorded chunk
    pub chunk_size: usize,
    /// Record even when the source has no audio track
    pub allow_video_only: bool,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            format: RecordingFormat::Webm,
            ffmpeg_path: "ffmpeg".to_string(),
            chunk_size: 64 * 1024,
            allow_video_only: false,
        }
    }
}

/// Clip persistence settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LibraryConfig {
    /// Key under which clips are stored
    pub storage_key: String,
    /// Upper bound on stored bytes (None = unbounded)
    pub quota_bytes: Option<usize>,
    /// Directory for the file-backed store
    pub storage_dir: Option<PathBuf>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            storage_key: "savedVideos".to_string(),
            quota_bytes: Some(5 * 1024 * 1024),
            storage_dir: None,
        }
    }
}

impl FaceTrackConfig {
    /// Read configuration from a JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: FaceTrackConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;

        tracing::debug!("Loaded configuration from {:?}", path);

        Ok(config)
    }

    /// Read configuration, falling back to defaults when the file is absent or invalid
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default configuration: {:#}", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "recording": { "frameRate": 24 } }"#).unwrap();

        let config = FaceTrackConfig::load(&path).unwrap();

        assert_eq!(config.recording.frame_rate, 24);
        assert_eq!(config.recording.format, RecordingFormat::Webm);
        assert_eq!(config.library.storage_key, "savedVideos");
        assert_eq!(config.overlay.tick_rate, 60);
    }

    #[test]
    fn test_invalid_config_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(FaceTrackConfig::load(&path).is_err());
        assert_eq!(FaceTrackConfig::load_or_default(&path), FaceTrackConfig::default());
    }
}
