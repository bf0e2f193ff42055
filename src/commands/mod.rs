//! Command handlers
//!
//! This module contains the operations a UI layer invokes, plus the shared
//! application state they run against. Every command returns an
//! `ErrorResponse` on failure.

pub mod library;
pub mod recording;

use crate::capture::{CaptureDevice, StreamAcquirer};
use crate::config::{FaceTrackConfig, LibraryConfig};
use crate::detection::{FaceDetector, OverlayLoopHandle};
use crate::library::{
    ClipLibrary, ClipSummary, FileStore, KeyValueStore, MemoryStore, PlaybackRegistry,
};
use crate::recorder::{FfmpegEncoder, MediaEncoder, RecordingSession};
use crate::surface::{shared_surface, SharedSurface};
use crate::utils::{AppResult, ErrorResponse};
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

pub type CommandResult<T> = Result<T, ErrorResponse>;

/// What the UI renders: recording indicator plus the clip list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppView {
    pub is_recording: bool,
    pub clips: Vec<ClipSummary>,
}

/// Application state shared by all commands
pub struct AppState {
    pub(crate) config: FaceTrackConfig,
    pub(crate) acquirer: StreamAcquirer,
    pub(crate) detector: Arc<dyn FaceDetector>,
    /// Survives preview restarts so the detector model loads once
    pub(crate) detector_ready: Arc<AtomicBool>,
    pub(crate) surface: SharedSurface,
    pub(crate) overlay: Mutex<Option<OverlayLoopHandle>>,
    pub(crate) recorder: Mutex<RecordingSession>,
    pub(crate) library: Mutex<ClipLibrary>,
    view: watch::Sender<AppView>,
}

impl AppState {
    /// Build the state from explicit components and load the clip library
    pub async fn new(
        config: FaceTrackConfig,
        device: Arc<dyn CaptureDevice>,
        detector: Arc<dyn FaceDetector>,
        encoder: Arc<dyn MediaEncoder>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let library = ClipLibrary::open(
            store,
            &config.library,
            Arc::new(PlaybackRegistry::new()),
        )
        .await;
        let (view, _) = watch::channel(AppView {
            is_recording: false,
            clips: library.summaries(),
        });

        Self {
            acquirer: StreamAcquirer::new(device),
            detector,
            detector_ready: Arc::new(AtomicBool::new(false)),
            surface: shared_surface(),
            overlay: Mutex::new(None),
            recorder: Mutex::new(RecordingSession::new(encoder, config.recording.clone())),
            library: Mutex::new(library),
            view,
            config,
        }
    }

    /// Build the state with the FFmpeg encoder and the configured store
    pub async fn with_defaults(
        config: FaceTrackConfig,
        device: Arc<dyn CaptureDevice>,
        detector: Arc<dyn FaceDetector>,
    ) -> AppResult<Self> {
        let encoder = Arc::new(FfmpegEncoder::new(&config.recording));
        let store = open_store(&config.library)?;
        Ok(Self::new(config, device, detector, encoder, store).await)
    }

    pub fn config(&self) -> &FaceTrackConfig {
        &self.config
    }

    pub fn surface(&self) -> &SharedSurface {
        &self.surface
    }

    /// Watch the UI view
    pub fn subscribe(&self) -> watch::Receiver<AppView> {
        self.view.subscribe()
    }

    pub fn view(&self) -> AppView {
        self.view.borrow().clone()
    }

    /// Stop the preview and release the live source
    ///
    /// A recording in progress is left alone; stop it first to keep the clip.
    pub async fn shutdown(&self) {
        let overlay = self.overlay.lock().await.take();
        if let Some(handle) = overlay {
            handle.stop().await;
        }
        self.acquirer.release().await;
        tracing::info!("Capture shut down");
    }

    pub(crate) fn publish_recording(&self, is_recording: bool) {
        self.view.send_modify(|view| view.is_recording = is_recording);
    }

    pub(crate) fn publish_clips(&self, clips: Vec<ClipSummary>) {
        self.view.send_modify(|view| view.clips = clips);
    }
}

/// File store under `storage_dir`, or an in-memory store when unset
pub fn open_store(config: &LibraryConfig) -> AppResult<Arc<dyn KeyValueStore>> {
    match &config.storage_dir {
        Some(dir) => {
            let store = FileStore::open(dir, config.quota_bytes)
                .map_err(crate::library::LibraryError::from)?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("No storage directory configured, clips will not survive a restart");
            Ok(Arc::new(MemoryStore::new(config.quota_bytes)))
        }
    }
}
