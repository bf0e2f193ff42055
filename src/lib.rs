//! FaceTrack Recorder - live face tracking with clip recording.
//!
//! This is the main library crate. It acquires a camera stream, draws face
//! detection overlays onto a shared surface, records that surface with the
//! camera's audio, and keeps the recorded clips in a persisted library.

pub mod capture;
pub mod commands;
pub mod config;
pub mod detection;
pub mod library;
pub mod recorder;
pub mod surface;
pub mod utils;

pub use commands::{AppState, AppView};
pub use config::FaceTrackConfig;
pub use utils::{AppError, AppResult, ErrorResponse};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber
///
/// `RUST_LOG` overrides the default filter. Calling this twice is harmless.
pub fn init_tracing() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "facetrack_recorder=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("Starting FaceTrack Recorder v{}", env!("CARGO_PKG_VERSION"));
    }
}
