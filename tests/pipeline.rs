//! End-to-end capture, overlay, record and library flow with in-process
//! fakes for the detector, the encoder and the camera.

use async_trait::async_trait;
use facetrack_recorder::capture::{
    AudioInput, AudioTrack, CaptureDevice, CaptureError, CaptureResult, LiveSource, MediaRequest,
    StillDevice, StillSource, StreamAcquirer, VideoFrame,
};
use facetrack_recorder::commands::{library, recording};
use facetrack_recorder::config::{
    CaptureConfig, FaceTrackConfig, LibraryConfig, OverlayConfig, RecordingConfig,
};
use facetrack_recorder::detection::{
    BoundingBox, Detection, DetectionError, FaceDetector, OverlayLoop, Point, TickOutcome,
};
use facetrack_recorder::library::{ClipLibrary, KeyValueStore, MemoryStore, PlaybackRegistry};
use facetrack_recorder::recorder::{
    CombinedStream, EncoderControl, EncoderSession, MediaEncoder, RecordedChunk, RecordingError,
    RecordingFormat, RecordingResult, RecordingSession, RecordingState,
};
use facetrack_recorder::surface::{shared_surface, SharedSurface, SurfaceStream};
use facetrack_recorder::AppState;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc;

/// Returns the next face count from a script, repeating the last one
struct ScriptedDetector {
    counts: Mutex<VecDeque<usize>>,
    inits: AtomicUsize,
}

impl ScriptedDetector {
    fn new(counts: &[usize]) -> Arc<Self> {
        Arc::new(Self {
            counts: Mutex::new(counts.iter().copied().collect()),
            inits: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl FaceDetector for ScriptedDetector {
    async fn initialize(&self) -> Result<(), DetectionError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn detect(&self, _frame: &VideoFrame) -> Result<Vec<Detection>, DetectionError> {
        let count = {
            let mut counts = self.counts.lock();
            if counts.len() > 1 {
                counts.pop_front().unwrap_or(0)
            } else {
                counts.front().copied().unwrap_or(0)
            }
        };
        Ok((0..count)
            .map(|i| Detection {
                bounding_box: BoundingBox {
                    x: 4.0 + i as f32 * 8.0,
                    y: 4.0,
                    width: 6.0,
                    height: 6.0,
                },
                score: 0.9,
                landmarks: vec![Point::new(6.0 + i as f32 * 8.0, 6.0)],
            })
            .collect())
    }
}

/// Emits every chunk but the last on start and the last one as the flush
struct ScriptedEncoder {
    chunks: Vec<Vec<u8>>,
}

impl ScriptedEncoder {
    fn new(chunks: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            chunks: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
        })
    }
}

struct ScriptedControl {
    tx: Option<mpsc::UnboundedSender<RecordedChunk>>,
    flush: Option<Vec<u8>>,
    sequence: u64,
    _video: SurfaceStream,
}

#[async_trait]
impl EncoderControl for ScriptedControl {
    async fn stop(&mut self) -> RecordingResult<()> {
        if let (Some(tx), Some(data)) = (self.tx.take(), self.flush.take()) {
            let _ = tx.send(RecordedChunk {
                sequence: self.sequence,
                elapsed: Duration::from_millis(100),
                data,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MediaEncoder for ScriptedEncoder {
    async fn start(
        &self,
        stream: CombinedStream,
        _format: RecordingFormat,
    ) -> RecordingResult<EncoderSession> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut chunks = self.chunks.clone();
        let flush = chunks.pop();
        let sequence = chunks.len() as u64;
        for (i, data) in chunks.into_iter().enumerate() {
            let _ = tx.send(RecordedChunk {
                sequence: i as u64,
                elapsed: Duration::from_millis(i as u64 * 10),
                data,
            });
        }
        Ok(EncoderSession {
            chunks: rx,
            control: Box::new(ScriptedControl {
                tx: Some(tx),
                flush,
                sequence,
                _video: stream.video,
            }),
        })
    }
}

/// A camera that is never available
struct DeniedDevice;

#[async_trait]
impl CaptureDevice for DeniedDevice {
    async fn acquire(&self, _request: &MediaRequest) -> CaptureResult<Arc<dyn LiveSource>> {
        Err(CaptureError::DeviceUnavailable("permission denied".into()))
    }
}

/// Still camera that counts how often it was opened
struct CountingCamera {
    inner: StillDevice,
    opened: AtomicUsize,
}

#[async_trait]
impl CaptureDevice for CountingCamera {
    async fn acquire(&self, request: &MediaRequest) -> CaptureResult<Arc<dyn LiveSource>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.inner.acquire(request).await
    }
}

fn camera() -> Arc<StillSource> {
    Arc::new(
        StillSource::new("camera")
            .with_frame(VideoFrame::solid(32, 24, [40, 80, 120, 255]))
            .with_audio_track(AudioTrack {
                id: "mic".into(),
                label: "Microphone".into(),
                input: AudioInput {
                    format: "lavfi".into(),
                    device: "anullsrc".into(),
                },
            }),
    )
}

async fn wait_for_content(surface: &SharedSurface) {
    for _ in 0..200 {
        if surface.read().has_content() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("overlay loop never drew a frame");
}

#[tokio::test]
async fn test_capture_overlay_record_save_delete() {
    let acquirer = StreamAcquirer::new(Arc::new(StillDevice::new(camera())));
    let source = acquirer
        .acquire(&MediaRequest::from(&CaptureConfig::default()))
        .await
        .unwrap();

    let surface = shared_surface();
    let overlay = OverlayLoop::new(
        source.clone(),
        ScriptedDetector::new(&[0, 1, 2]),
        surface.clone(),
        OverlayConfig::default(),
    );
    assert!(overlay.initialize_detector().await);

    assert_eq!(overlay.tick().await, TickOutcome::Drawn { detections: 0 });
    assert_eq!(overlay.tick().await, TickOutcome::Drawn { detections: 1 });
    assert_eq!(overlay.tick().await, TickOutcome::Drawn { detections: 2 });
    assert_eq!(surface.read().composites(), 3);
    assert_eq!(overlay.diagnostics().detections, 3);

    let encoder = ScriptedEncoder::new(&["c1", "c2", "c3"]);
    let mut session = RecordingSession::new(encoder, RecordingConfig::default());
    session.start(&surface, source.as_ref()).await.unwrap();
    let artifact = session.stop().await.unwrap();
    assert_eq!(artifact.bytes(), b"c1c2c3");
    assert_eq!(session.state(), RecordingState::Idle);

    let store = Arc::new(MemoryStore::default());
    let mut clips = ClipLibrary::open(
        store.clone(),
        &LibraryConfig::default(),
        Arc::new(PlaybackRegistry::new()),
    )
    .await;
    let saved = clips.save(artifact).await.unwrap();
    assert_eq!(clips.len(), 1);
    assert_eq!(
        clips.playback().resolve(&saved.playback_url).unwrap().bytes(),
        b"c1c2c3"
    );

    clips.delete(0).await.unwrap();
    assert!(clips.is_empty());
    assert_eq!(store.get("savedVideos").await.unwrap().as_deref(), Some("[]"));
}

#[tokio::test]
async fn test_empty_recording_is_not_saved() {
    let source = camera();
    let surface = shared_surface();
    let overlay = OverlayLoop::new(
        source.clone(),
        ScriptedDetector::new(&[1]),
        surface.clone(),
        OverlayConfig::default(),
    );
    overlay.initialize_detector().await;
    overlay.tick().await;

    let mut session = RecordingSession::new(ScriptedEncoder::new(&[]), RecordingConfig::default());
    session.start(&surface, source.as_ref()).await.unwrap();

    assert!(matches!(
        session.stop().await,
        Err(RecordingError::EmptyRecording)
    ));
    assert_eq!(session.state(), RecordingState::Idle);
}

#[tokio::test]
async fn test_commands_drive_the_whole_app() {
    let store = Arc::new(MemoryStore::default());
    let state = AppState::new(
        FaceTrackConfig::default(),
        Arc::new(StillDevice::new(camera())),
        ScriptedDetector::new(&[1]),
        ScriptedEncoder::new(&["one", "two"]),
        store,
    )
    .await;
    let view = state.subscribe();

    let err = recording::start_recording(&state).await.unwrap_err();
    assert_eq!(err.code, "DEVICE_UNAVAILABLE");

    recording::start_preview(&state).await.unwrap();
    wait_for_content(state.surface()).await;

    recording::start_recording(&state).await.unwrap();
    assert!(view.borrow().is_recording);
    assert_eq!(
        recording::recording_state(&state).await.unwrap(),
        RecordingState::Recording
    );
    let err = recording::start_recording(&state).await.unwrap_err();
    assert_eq!(err.code, "ALREADY_RECORDING");

    let saved = recording::stop_recording(&state).await.unwrap();
    assert!(!view.borrow().is_recording);
    assert_eq!(view.borrow().clips, vec![saved.clone()]);
    assert_eq!(recording::recording_duration(&state).await.unwrap(), 0.0);

    let played = library::playback_artifact(&state, &saved.playback_url)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(played.bytes(), b"onetwo");

    let dir = tempdir().unwrap();
    let path = library::export_clip(&state, 0, dir.path()).await.unwrap();
    assert_eq!(std::fs::read(path).unwrap(), b"onetwo");

    let err = library::delete_clip(&state, 3).await.unwrap_err();
    assert_eq!(err.code, "INDEX_OUT_OF_RANGE");
    assert_eq!(library::list_clips(&state).await.unwrap().len(), 1);

    let remaining = library::delete_clip(&state, 0).await.unwrap();
    assert!(remaining.is_empty());
    assert!(view.borrow().clips.is_empty());

    let err = recording::stop_recording(&state).await.unwrap_err();
    assert_eq!(err.code, "NOT_RECORDING");

    recording::stop_preview(&state).await.unwrap();
}

async fn wait_for_drawn_frame(state: &AppState) {
    for _ in 0..200 {
        let drawn = recording::overlay_diagnostics(state)
            .await
            .unwrap()
            .map_or(0, |snapshot| snapshot.frames_drawn);
        if drawn > 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("restarted overlay loop never drew a frame");
}

#[tokio::test]
async fn test_preview_restart_reuses_detector_and_shutdown_releases_camera() {
    let detector = ScriptedDetector::new(&[1]);
    let device = Arc::new(CountingCamera {
        inner: StillDevice::new(camera()),
        opened: AtomicUsize::new(0),
    });
    let state = AppState::new(
        FaceTrackConfig::default(),
        device.clone(),
        detector.clone(),
        ScriptedEncoder::new(&["x"]),
        Arc::new(MemoryStore::default()),
    )
    .await;

    recording::start_preview(&state).await.unwrap();
    wait_for_content(state.surface()).await;
    recording::stop_preview(&state).await.unwrap();
    recording::start_preview(&state).await.unwrap();
    wait_for_drawn_frame(&state).await;

    assert_eq!(detector.inits.load(Ordering::SeqCst), 1);
    assert_eq!(device.opened.load(Ordering::SeqCst), 1);

    state.shutdown().await;

    assert!(recording::overlay_diagnostics(&state).await.unwrap().is_none());
    let err = recording::start_recording(&state).await.unwrap_err();
    assert_eq!(err.code, "DEVICE_UNAVAILABLE");

    recording::start_preview(&state).await.unwrap();
    wait_for_drawn_frame(&state).await;
    assert_eq!(device.opened.load(Ordering::SeqCst), 2);
    assert_eq!(detector.inits.load(Ordering::SeqCst), 1);
    state.shutdown().await;
}

#[tokio::test]
async fn test_denied_camera_keeps_pipeline_inert() {
    let state = AppState::new(
        FaceTrackConfig::default(),
        Arc::new(DeniedDevice),
        ScriptedDetector::new(&[1]),
        ScriptedEncoder::new(&["x"]),
        Arc::new(MemoryStore::default()),
    )
    .await;

    let err = recording::start_preview(&state).await.unwrap_err();
    assert_eq!(err.code, "DEVICE_UNAVAILABLE");
    assert!(recording::overlay_diagnostics(&state).await.unwrap().is_none());
    assert!(!state.surface().read().has_content());

    let err = recording::start_recording(&state).await.unwrap_err();
    assert_eq!(err.code, "DEVICE_UNAVAILABLE");
}
