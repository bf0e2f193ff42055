//! Live source capture
//!
//! This module provides the capture traits, the one-shot stream acquirer,
//! a programmatic source, and (with `native-capture`) the webcam backend.

pub mod acquirer;
pub mod still;
pub mod traits;

#[cfg(feature = "native-capture")]
pub mod native;

pub use acquirer::StreamAcquirer;
pub use still::{StillDevice, StillSource};
pub use traits::{
    AudioInput, AudioTrack, CameraInfo, CaptureDevice, CaptureError, CaptureResult, LiveSource,
    MediaRequest, VideoFrame,
};
