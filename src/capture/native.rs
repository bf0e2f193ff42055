//! Native webcam + microphone capture
//!
//! Video comes from nokhwa on a dedicated capture thread that keeps only the
//! latest decoded RGBA frame. Audio tracks are microphones found through
//! cpal, described as encoder-readable device inputs.

use super::traits::{
    AudioInput, AudioTrack, CameraInfo, CaptureDevice, CaptureError, CaptureResult, LiveSource,
    MediaRequest, VideoFrame,
};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait};
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
};
use nokhwa::Camera;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Get list of available cameras
pub fn get_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| CameraInfo {
                id: match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                },
                name: info.human_name().to_string(),
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

/// Default microphone as an audio track, if one exists
fn default_microphone() -> Option<AudioTrack> {
    let host = cpal::default_host();
    let device = host.default_input_device()?;
    let label = device.name().unwrap_or_else(|_| "Microphone".to_string());

    let input = if cfg!(target_os = "macos") {
        AudioInput {
            format: "avfoundation".to_string(),
            device: ":default".to_string(),
        }
    } else if cfg!(target_os = "windows") {
        AudioInput {
            format: "dshow".to_string(),
            device: format!("audio={}", label),
        }
    } else {
        AudioInput {
            format: "pulse".to_string(),
            device: "default".to_string(),
        }
    };

    Some(AudioTrack {
        id: "microphone".to_string(),
        label,
        input,
    })
}

fn camera_index(camera_id: Option<&str>) -> CameraIndex {
    match camera_id {
        Some(id) => match id.parse::<u32>() {
            Ok(idx) => CameraIndex::Index(idx),
            Err(_) => CameraIndex::String(id.to_string()),
        },
        None => CameraIndex::Index(0),
    }
}

/// Wait for a capture thread to exit
///
/// Inside a tokio runtime the join moves to the blocking pool, so dropping a
/// source from async code never parks a worker thread.
fn join_capture_thread(handle: std::thread::JoinHandle<()>) {
    let join = move || {
        if handle.join().is_err() {
            tracing::warn!("Webcam capture thread panicked");
        }
    };
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn_blocking(join);
        }
        Err(_) => join(),
    }
}

/// Webcam-backed live source
pub struct NativeSource {
    id: String,
    latest: Arc<RwLock<Option<VideoFrame>>>,
    audio: Vec<AudioTrack>,
    running: Arc<AtomicBool>,
    capture_thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl LiveSource for NativeSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_frame_ready(&self) -> bool {
        self.latest.read().is_some()
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        self.latest.read().clone()
    }

    fn audio_tracks(&self) -> Vec<AudioTrack> {
        self.audio.clone()
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_thread.lock().take() {
            join_capture_thread(handle);
        }
    }
}

impl Drop for NativeSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Capture device backed by the system webcam and microphone
#[derive(Default)]
pub struct NativeCaptureDevice;

#[async_trait]
impl CaptureDevice for NativeCaptureDevice {
    async fn acquire(&self, request: &MediaRequest) -> CaptureResult<Arc<dyn LiveSource>> {
        if get_cameras().is_empty() {
            return Err(CaptureError::DeviceUnavailable("No cameras found".to_string()));
        }

        let audio: Vec<AudioTrack> = if request.audio {
            default_microphone().into_iter().collect()
        } else {
            Vec::new()
        };

        let latest = Arc::new(RwLock::new(None));
        let running = Arc::new(AtomicBool::new(true));
        let (opened_tx, opened_rx) = oneshot::channel::<Result<String, String>>();

        let index = camera_index(request.camera_id.as_deref());
        let requested = CameraFormat::new_from(
            request.width,
            request.height,
            FrameFormat::MJPEG,
            request.fps,
        );
        let thread_latest = latest.clone();
        let thread_running = running.clone();

        // Camera handles are not Send on every backend, so the camera lives
        // entirely on this thread.
        let handle = std::thread::spawn(move || {
            let format =
                RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(requested));

            let mut camera = match Camera::new(index.clone(), format) {
                Ok(c) => c,
                Err(e) => {
                    let reason = format!("Failed to open camera {:?}: {:?}", index, e);
                    let _ = opened_tx.send(Err(reason));
                    return;
                }
            };

            if let Err(e) = camera.open_stream() {
                let _ = opened_tx.send(Err(format!("Failed to open camera stream: {:?}", e)));
                return;
            }

            let camera_format = camera.camera_format();
            let _ = opened_tx.send(Ok(format!(
                "{} ({}x{} @ {}fps, {:?})",
                camera.info().human_name(),
                camera_format.resolution().width(),
                camera_format.resolution().height(),
                camera_format.frame_rate(),
                camera_format.format()
            )));

            let mut frame_count: u64 = 0;
            while thread_running.load(Ordering::SeqCst) {
                // Blocks until the camera delivers the next frame
                match camera.frame() {
                    Ok(frame) => match frame.decode_image::<RgbAFormat>() {
                        Ok(image) => {
                            let (width, height) = (image.width(), image.height());
                            *thread_latest.write() =
                                Some(VideoFrame::new(width, height, image.into_raw()));
                            frame_count += 1;
                        }
                        Err(e) => tracing::debug!("Failed to decode webcam frame: {:?}", e),
                    },
                    Err(e) => tracing::debug!("Failed to capture frame: {:?}", e),
                }
            }

            if let Err(e) = camera.stop_stream() {
                tracing::warn!("Error stopping camera stream: {:?}", e);
            }
            tracing::info!("Webcam capture thread stopped after {} frames", frame_count);
        });

        let description = match opened_rx.await {
            Ok(Ok(description)) => description,
            Ok(Err(message)) => {
                join_capture_thread(handle);
                return Err(CaptureError::DeviceUnavailable(message));
            }
            Err(_) => {
                join_capture_thread(handle);
                return Err(CaptureError::DeviceUnavailable(
                    "Camera thread exited before opening".to_string(),
                ));
            }
        };

        tracing::info!("Webcam opened: {}", description);

        Ok(Arc::new(NativeSource {
            id: "webcam".to_string(),
            latest,
            audio,
            running,
            capture_thread: Mutex::new(Some(handle)),
        }))
    }
}
