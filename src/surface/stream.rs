//! Surface capture as a live video track
//!
//! Samples the shared surface at a fixed frame rate. The track's dimensions
//! are fixed when capture starts; samples taken while the surface has other
//! dimensions are dropped.

use super::SharedSurface;
use crate::capture::VideoFrame;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Frames buffered between the sampler and its consumer
const STREAM_BUFFER: usize = 8;

/// Live video track captured from a surface
pub struct SurfaceStream {
    width: u32,
    height: u32,
    fps: u32,
    frames: mpsc::Receiver<VideoFrame>,
    sampler: JoinHandle<()>,
}

impl SurfaceStream {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Next sampled frame; None once sampling has stopped
    pub async fn next_frame(&mut self) -> Option<VideoFrame> {
        self.frames.recv().await
    }

    /// Stop sampling; frames already buffered can still be read
    pub fn stop(&mut self) {
        self.sampler.abort();
        self.frames.close();
    }
}

impl Drop for SurfaceStream {
    fn drop(&mut self) {
        self.sampler.abort();
    }
}

/// Start capturing the surface at `fps` frames per second
///
/// Returns None if nothing has been drawn on the surface yet.
pub fn capture_stream(surface: &SharedSurface, fps: u32) -> Option<SurfaceStream> {
    let (width, height) = {
        let guard = surface.read();
        if !guard.has_content() {
            return None;
        }
        (guard.width(), guard.height())
    };

    let fps = fps.max(1);
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    let surface = surface.clone();

    let sampler = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / fps as f64));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut dropped: u64 = 0;

        loop {
            interval.tick().await;

            let frame = {
                let guard = surface.read();
                if guard.width() != width || guard.height() != height {
                    None
                } else {
                    Some(guard.snapshot())
                }
            };
            let Some(frame) = frame else {
                continue;
            };

            match tx.try_send(frame) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    dropped += 1;
                    if dropped == 1 || dropped % 100 == 0 {
                        tracing::debug!(
                            "Surface stream consumer lagging, {} frames dropped",
                            dropped
                        );
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            }
        }

        tracing::debug!("Surface stream sampler stopped");
    });

    tracing::info!("Capturing surface stream {}x{} @ {}fps", width, height, fps);

    Some(SurfaceStream {
        width,
        height,
        fps,
        frames: rx,
        sampler,
    })
}
