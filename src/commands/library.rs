//! Clip library commands

use super::{AppState, CommandResult};
use crate::library::ClipSummary;
use crate::recorder::Artifact;
use crate::utils::{AppError, ErrorResponse};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Clips newest-first
pub async fn list_clips(state: &AppState) -> CommandResult<Vec<ClipSummary>> {
    Ok(state.library.lock().await.summaries())
}

/// Delete the clip at `index`
pub async fn delete_clip(state: &AppState, index: usize) -> CommandResult<Vec<ClipSummary>> {
    let mut library = state.library.lock().await;
    library
        .delete(index)
        .await
        .map_err(|e| ErrorResponse::from(AppError::from(e)))?;

    let clips = library.summaries();
    state.publish_clips(clips.clone());
    Ok(clips)
}

/// Write the clip at `index` into `dir`, returning the file path
pub async fn export_clip(state: &AppState, index: usize, dir: &Path) -> CommandResult<PathBuf> {
    state
        .library
        .lock()
        .await
        .export_clip(index, dir)
        .await
        .map_err(|e| ErrorResponse::from(AppError::from(e)))
}

/// Re-read the library from storage
pub async fn reload_clips(state: &AppState) -> CommandResult<Vec<ClipSummary>> {
    let mut library = state.library.lock().await;
    library.reload().await;

    let clips = library.summaries();
    state.publish_clips(clips.clone());
    Ok(clips)
}

/// Artifact behind a clip's playback URL
pub async fn playback_artifact(
    state: &AppState,
    url: &str,
) -> CommandResult<Option<Arc<Artifact>>> {
    Ok(state.library.lock().await.playback().resolve(url))
}
