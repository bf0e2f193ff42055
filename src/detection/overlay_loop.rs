//! Detection overlay loop
//!
//! ## Per tick
//!
//! ```text
//! 1. Skip unless the source has a ready frame and the detector is initialized
//! 2. Skip if a detection+draw is still in flight for this surface
//! 3. Detect faces on the current frame (failures are logged, never fatal)
//! 4. Under one surface write lock: resize, clear, draw frame, draw overlays
//! ```
//!
//! Readers of the surface only ever observe finished composites because the
//! whole draw happens without yielding while the write lock is held.

use super::{Detection, FaceDetector};
use crate::capture::LiveSource;
use crate::config::OverlayConfig;
use crate::surface::{draw_detections, SharedSurface};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No frame or detector not ready; nothing drawn
    NotReady,
    /// A previous detection+draw was still in flight
    Skipped,
    /// Frame and overlays drawn
    Drawn { detections: usize },
    /// Loop was stopped; nothing drawn
    Cancelled,
}

#[derive(Default)]
pub struct OverlayDiagnostics {
    pub ticks: AtomicU64,
    pub not_ready: AtomicU64,
    pub skipped: AtomicU64,
    pub frames_drawn: AtomicU64,
    pub detections: AtomicU64,
    pub detection_errors: AtomicU64,
}

impl OverlayDiagnostics {
    pub fn snapshot(&self) -> OverlaySnapshot {
        OverlaySnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            not_ready: self.not_ready.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            frames_drawn: self.frames_drawn.load(Ordering::Relaxed),
            detections: self.detections.load(Ordering::Relaxed),
            detection_errors: self.detection_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the overlay counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySnapshot {
    pub ticks: u64,
    pub not_ready: u64,
    pub skipped: u64,
    pub frames_drawn: u64,
    pub detections: u64,
    pub detection_errors: u64,
}

/// Clears the busy flag when a tick ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Reads frames, runs detection and composites the result onto a surface
pub struct OverlayLoop {
    source: Arc<dyn LiveSource>,
    detector: Arc<dyn FaceDetector>,
    surface: SharedSurface,
    config: OverlayConfig,
    detector_ready: Arc<AtomicBool>,
    in_flight: AtomicBool,
    running: AtomicBool,
    diagnostics: OverlayDiagnostics,
}

impl OverlayLoop {
    pub fn new(
        source: Arc<dyn LiveSource>,
        detector: Arc<dyn FaceDetector>,
        surface: SharedSurface,
        config: OverlayConfig,
    ) -> Arc<Self> {
        Self::with_detector_ready(
            source,
            detector,
            surface,
            config,
            Arc::new(AtomicBool::new(false)),
        )
    }

    /// Build a loop sharing detector readiness with earlier loops
    ///
    /// Once `detector_ready` is set the detector is never initialized again.
    pub fn with_detector_ready(
        source: Arc<dyn LiveSource>,
        detector: Arc<dyn FaceDetector>,
        surface: SharedSurface,
        config: OverlayConfig,
        detector_ready: Arc<AtomicBool>,
    ) -> Arc<Self> {
        Arc::new(Self {
            source,
            detector,
            surface,
            config,
            detector_ready,
            in_flight: AtomicBool::new(false),
            running: AtomicBool::new(true),
            diagnostics: OverlayDiagnostics::default(),
        })
    }

    pub fn surface(&self) -> &SharedSurface {
        &self.surface
    }

    pub fn diagnostics(&self) -> OverlaySnapshot {
        self.diagnostics.snapshot()
    }

    pub fn is_detector_ready(&self) -> bool {
        self.detector_ready.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Load the detector model; ticks stay no-ops until this succeeds
    pub async fn initialize_detector(&self) -> bool {
        if self.is_detector_ready() {
            return true;
        }
        match self.detector.initialize().await {
            Ok(()) => {
                self.detector_ready.store(true, Ordering::Release);
                tracing::info!("Face detector initialized");
                true
            }
            Err(e) => {
                tracing::error!("Face detector failed to initialize: {}", e);
                false
            }
        }
    }

    /// Run one detection+draw iteration
    pub async fn tick(&self) -> TickOutcome {
        self.diagnostics.ticks.fetch_add(1, Ordering::Relaxed);

        if !self.is_running() {
            return TickOutcome::Cancelled;
        }

        if !self.is_detector_ready() || !self.source.is_frame_ready() {
            self.diagnostics.not_ready.fetch_add(1, Ordering::Relaxed);
            return TickOutcome::NotReady;
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.diagnostics.skipped.fetch_add(1, Ordering::Relaxed);
            return TickOutcome::Skipped;
        }
        let _in_flight = InFlight(&self.in_flight);

        let frame = match self.source.current_frame() {
            Some(frame) if frame.is_valid() => frame,
            _ => {
                self.diagnostics.not_ready.fetch_add(1, Ordering::Relaxed);
                return TickOutcome::NotReady;
            }
        };

        let detections: Vec<Detection> = match self.detector.detect(&frame).await {
            Ok(detections) => detections,
            Err(e) => {
                let errors = self.diagnostics.detection_errors.fetch_add(1, Ordering::Relaxed);
                if errors == 0 {
                    tracing::warn!("Face detection failed: {}", e);
                } else {
                    tracing::debug!("Face detection failed: {}", e);
                }
                Vec::new()
            }
        };

        if !self.is_running() {
            return TickOutcome::Cancelled;
        }

        {
            let mut surface = self.surface.write();
            if surface.resize(frame.width, frame.height) {
                tracing::debug!("Surface resized to {}x{}", frame.width, frame.height);
            }
            surface.clear();
            surface.draw_frame(&frame);
            draw_detections(&mut surface, &detections, &self.config);
            surface.finish_composite();
        }

        self.diagnostics.frames_drawn.fetch_add(1, Ordering::Relaxed);
        self.diagnostics
            .detections
            .fetch_add(detections.len() as u64, Ordering::Relaxed);

        TickOutcome::Drawn {
            detections: detections.len(),
        }
    }

    /// Start the repeating tick task
    pub fn spawn(self: Arc<Self>) -> OverlayLoopHandle {
        let shutdown = Arc::new(Notify::new());
        let period = Duration::from_secs_f64(1.0 / self.config.tick_rate.max(1) as f64);

        let init_loop = self.clone();
        let init_task = tokio::spawn(async move {
            init_loop.initialize_detector().await;
        });

        let task_loop = self.clone();
        let task_shutdown = shutdown.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!("Overlay loop started ({:?} per tick)", period);

            loop {
                tokio::select! {
                    biased;
                    _ = task_shutdown.notified() => break,
                    _ = interval.tick() => {}
                }
                // A pending detection is dropped on shutdown; drawing never
                // yields, so dropping it cannot leave a partial frame.
                tokio::select! {
                    biased;
                    _ = task_shutdown.notified() => break,
                    _ = task_loop.tick() => {}
                }
            }

            tracing::info!("Overlay loop stopped");
        });

        OverlayLoopHandle {
            overlay: self,
            shutdown,
            init_task,
            task: Some(task),
        }
    }
}

/// Owner of a running overlay loop
pub struct OverlayLoopHandle {
    overlay: Arc<OverlayLoop>,
    shutdown: Arc<Notify>,
    init_task: JoinHandle<()>,
    task: Option<JoinHandle<()>>,
}

impl OverlayLoopHandle {
    pub fn overlay(&self) -> &Arc<OverlayLoop> {
        &self.overlay
    }

    /// Cancel the next tick and wait for the loop to exit
    pub async fn stop(mut self) {
        self.overlay.running.store(false, Ordering::Release);
        self.shutdown.notify_one();
        self.init_task.abort();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for OverlayLoopHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            self.overlay.running.store(false, Ordering::Release);
            self.init_task.abort();
            task.abort();
        }
    }
}
