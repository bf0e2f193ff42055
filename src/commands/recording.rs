//! Preview and recording commands

use super::{AppState, CommandResult};
use crate::capture::MediaRequest;
use crate::detection::{OverlayLoop, OverlaySnapshot};
use crate::library::ClipSummary;
use crate::recorder::RecordingState;
use crate::utils::{AppError, ErrorResponse};

/// Acquire the live source and start the detection overlay loop
///
/// Calling this while the preview is running does nothing.
pub async fn start_preview(state: &AppState) -> CommandResult<()> {
    let mut overlay = state.overlay.lock().await;
    if overlay.is_some() {
        return Ok(());
    }

    let request = MediaRequest::from(&state.config.capture);
    let source = state
        .acquirer
        .acquire(&request)
        .await
        .map_err(|e| ErrorResponse::from(AppError::from(e)))?;

    let handle = OverlayLoop::with_detector_ready(
        source,
        state.detector.clone(),
        state.surface.clone(),
        state.config.overlay.clone(),
        state.detector_ready.clone(),
    )
    .spawn();
    *overlay = Some(handle);

    tracing::info!("Preview started");
    Ok(())
}

/// Stop the overlay loop; the acquired source stays open
pub async fn stop_preview(state: &AppState) -> CommandResult<()> {
    let handle = state.overlay.lock().await.take();
    if let Some(handle) = handle {
        handle.stop().await;
        tracing::info!("Preview stopped");
    }
    Ok(())
}

/// Counters of the running overlay loop
pub async fn overlay_diagnostics(state: &AppState) -> CommandResult<Option<OverlaySnapshot>> {
    let overlay = state.overlay.lock().await;
    Ok(overlay.as_ref().map(|handle| handle.overlay().diagnostics()))
}

/// Start recording the composited preview
pub async fn start_recording(state: &AppState) -> CommandResult<()> {
    let source = state
        .acquirer
        .source()
        .await
        .map_err(|e| ErrorResponse::from(AppError::from(e)))?;

    let mut recorder = state.recorder.lock().await;
    recorder
        .start(&state.surface, source.as_ref())
        .await
        .map_err(|e| ErrorResponse::from(AppError::from(e)))?;

    state.publish_recording(true);
    Ok(())
}

/// Stop recording and save the clip to the library
pub async fn stop_recording(state: &AppState) -> CommandResult<ClipSummary> {
    let result = state.recorder.lock().await.stop().await;
    let artifact = match result {
        Ok(artifact) => artifact,
        Err(e) => {
            // A failed stop still ends the recording unless nothing was running
            if !matches!(e, crate::recorder::RecordingError::NotRecording) {
                state.publish_recording(false);
            }
            return Err(ErrorResponse::from(AppError::from(e)));
        }
    };
    state.publish_recording(false);

    let mut library = state.library.lock().await;
    let summary = library
        .save(artifact)
        .await
        .map_err(|e| ErrorResponse::from(AppError::from(e)))?;
    state.publish_clips(library.summaries());

    Ok(summary)
}

/// Get current recording state
pub async fn recording_state(state: &AppState) -> CommandResult<RecordingState> {
    Ok(state.recorder.lock().await.state())
}

/// Get current recording duration in milliseconds
pub async fn recording_duration(state: &AppState) -> CommandResult<f64> {
    Ok(state.recorder.lock().await.duration_ms())
}
