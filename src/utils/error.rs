//! Error types and handling
//!
//! Common error types used across the application.

use crate::capture::CaptureError;
use crate::library::{CodecError, LibraryError, StorageError};
use crate::recorder::RecordingError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Recording(#[from] RecordingError),

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Stable error code reported to the UI layer
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Capture(CaptureError::DeviceUnavailable(_)) => "DEVICE_UNAVAILABLE",
            AppError::Capture(CaptureError::NotAcquired) => "DEVICE_UNAVAILABLE",
            AppError::Recording(e) => match e {
                RecordingError::AlreadyRecording => "ALREADY_RECORDING",
                RecordingError::NotRecording => "NOT_RECORDING",
                RecordingError::NoAudioVideoSource(_) => "NO_AUDIO_VIDEO_SOURCE",
                RecordingError::EmptyRecording => "EMPTY_RECORDING",
                RecordingError::Encoder(_) => "ENCODER_ERROR",
                RecordingError::Io(_) => "IO_ERROR",
            },
            AppError::Library(e) => match e {
                LibraryError::Codec(CodecError::MalformedEncoding(_)) => "MALFORMED_ENCODING",
                LibraryError::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
                LibraryError::Storage(StorageError::QuotaExceeded { .. }) => {
                    "STORAGE_QUOTA_EXCEEDED"
                }
                LibraryError::Storage(_) => "STORAGE_ERROR",
                LibraryError::Io(_) => "IO_ERROR",
                LibraryError::Serialization(_) => "SERIALIZATION_ERROR",
            },
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Error response for frontend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
