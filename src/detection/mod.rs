//! Face detection types and the detection overlay loop
//!
//! The detector itself is an external capability; this module only defines
//! what it consumes and produces, and drives it once per tick.

pub mod overlay_loop;

use crate::capture::VideoFrame;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use overlay_loop::{
    OverlayDiagnostics, OverlayLoop, OverlayLoopHandle, OverlaySnapshot, TickOutcome,
};

/// Detector errors (never fatal to the overlay loop)
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Model initialization failed: {0}")]
    Initialization(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// A point in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned face region in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One face found in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub bounding_box: BoundingBox,

    /// Detector confidence in 0.0..=1.0
    pub score: f32,

    /// Ordered landmark points (68 for the standard face shape model)
    pub landmarks: Vec<Point>,
}

/// Opaque face detection capability
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// One-time model/weights load
    async fn initialize(&self) -> Result<(), DetectionError>;

    /// Detect all faces in a frame; an empty result is normal
    async fn detect(&self, frame: &VideoFrame) -> Result<Vec<Detection>, DetectionError>;
}
