//! Live source acquisition
//!
//! Requests the combined audio+video source once and hands the same
//! source to every consumer afterwards.

use super::traits::{CaptureDevice, CaptureError, CaptureResult, LiveSource, MediaRequest};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Acquires and holds the session's live source
pub struct StreamAcquirer {
    device: Arc<dyn CaptureDevice>,
    source: Mutex<Option<Arc<dyn LiveSource>>>,
}

impl StreamAcquirer {
    pub fn new(device: Arc<dyn CaptureDevice>) -> Self {
        Self {
            device,
            source: Mutex::new(None),
        }
    }

    /// Acquire the live source, or return the one already acquired
    ///
    /// A failure leaves nothing stored, so the caller may retry.
    pub async fn acquire(&self, request: &MediaRequest) -> CaptureResult<Arc<dyn LiveSource>> {
        let mut slot = self.source.lock().await;
        if let Some(source) = slot.as_ref() {
            return Ok(source.clone());
        }

        tracing::info!(
            "Requesting live source (video={}, audio={}, {}x{} @ {}fps)",
            request.video,
            request.audio,
            request.width,
            request.height,
            request.fps
        );

        match self.device.acquire(request).await {
            Ok(source) => {
                let audio_tracks = source.audio_tracks().len();
                match source.dimensions() {
                    Some((width, height)) => tracing::info!(
                        "Live source '{}' acquired at {}x{} with {} audio track(s)",
                        source.id(),
                        width,
                        height,
                        audio_tracks
                    ),
                    None => tracing::info!(
                        "Live source '{}' acquired with {} audio track(s), no frame yet",
                        source.id(),
                        audio_tracks
                    ),
                }
                *slot = Some(source.clone());
                Ok(source)
            }
            Err(e) => {
                tracing::error!("Failed to acquire live source: {}", e);
                Err(e)
            }
        }
    }

    /// The acquired source, if acquisition succeeded
    pub async fn source(&self) -> CaptureResult<Arc<dyn LiveSource>> {
        self.source
            .lock()
            .await
            .clone()
            .ok_or(CaptureError::NotAcquired)
    }

    /// Stop and forget the acquired source
    pub async fn release(&self) {
        if let Some(source) = self.source.lock().await.take() {
            tracing::info!("Releasing live source '{}'", source.id());
            source.stop();
        }
    }
}
