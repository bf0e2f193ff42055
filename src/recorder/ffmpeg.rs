//! FFmpeg-backed media encoder
//!
//! Surface frames are piped to FFmpeg as raw RGBA on stdin. Audio tracks are
//! opened by FFmpeg directly from their devices. The muxed container is read
//! back from stdout in fixed-size chunks.

use super::encoder::{
    CombinedStream, EncoderControl, EncoderSession, MediaEncoder, RecordingError, RecordingFormat,
    RecordingResult,
};
use super::state::RecordedChunk;
use crate::capture::AudioTrack;
use crate::config::RecordingConfig;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Encoder that spawns one FFmpeg process per recording
pub struct FfmpegEncoder {
    ffmpeg_path: String,
    chunk_size: usize,
}

impl FfmpegEncoder {
    pub fn new(config: &RecordingConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            chunk_size: config.chunk_size.max(1),
        }
    }

    /// Build the FFmpeg command line for a recording
    pub fn build_args(
        width: u32,
        height: u32,
        fps: u32,
        audio: &[AudioTrack],
        format: RecordingFormat,
    ) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "warning".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgba".to_string(),
            "-s".to_string(),
            format!("{}x{}", width, height),
            "-r".to_string(),
            fps.to_string(),
            "-i".to_string(),
            "pipe:0".to_string(),
        ];

        // Audio inputs start at index 1
        for track in audio {
            args.extend([
                "-f".to_string(),
                track.input.format.clone(),
                "-i".to_string(),
                track.input.device.clone(),
            ]);
        }

        match audio.len() {
            0 => {
                args.extend(["-map".to_string(), "0:v".to_string()]);
            }
            1 => {
                args.extend([
                    "-map".to_string(),
                    "0:v".to_string(),
                    "-map".to_string(),
                    "1:a".to_string(),
                ]);
            }
            n => {
                let refs: String = (1..=n).map(|i| format!("[{}:a]", i)).collect();
                args.extend([
                    "-filter_complex".to_string(),
                    format!("{}amix=inputs={}:duration=longest[aout]", refs, n),
                    "-map".to_string(),
                    "0:v".to_string(),
                    "-map".to_string(),
                    "[aout]".to_string(),
                ]);
            }
        }

        args.extend([
            "-c:v".to_string(),
            format.video_codec().to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
        ]);

        match format {
            RecordingFormat::Webm => {
                args.extend([
                    "-deadline".to_string(),
                    "realtime".to_string(),
                    "-cpu-used".to_string(),
                    "8".to_string(),
                    "-b:v".to_string(),
                    "2M".to_string(),
                ]);
            }
            RecordingFormat::Mp4 => {
                args.extend([
                    "-preset".to_string(),
                    "veryfast".to_string(),
                    "-movflags".to_string(),
                    "frag_keyframe+empty_moov+default_base_moof".to_string(),
                ]);
            }
        }

        if !audio.is_empty() {
            args.extend([
                "-c:a".to_string(),
                format.audio_codec().to_string(),
                "-b:a".to_string(),
                "128k".to_string(),
                "-shortest".to_string(),
            ]);
        }

        args.extend([
            "-f".to_string(),
            format.extension().to_string(),
            "pipe:1".to_string(),
        ]);

        args
    }
}

#[async_trait]
impl MediaEncoder for FfmpegEncoder {
    async fn start(
        &self,
        stream: CombinedStream,
        format: RecordingFormat,
    ) -> RecordingResult<EncoderSession> {
        let CombinedStream { mut video, audio } = stream;
        let args = Self::build_args(video.width(), video.height(), video.fps(), &audio, format);

        tracing::info!("Starting FFmpeg encoder: {:?}", args);

        let mut process = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RecordingError::Encoder(format!("Failed to start FFmpeg encoder: {}", e))
            })?;

        let mut stdin = process
            .stdin
            .take()
            .ok_or_else(|| RecordingError::Encoder("Failed to capture FFmpeg stdin".to_string()))?;
        let mut stdout = process
            .stdout
            .take()
            .ok_or_else(|| RecordingError::Encoder("Failed to capture FFmpeg stdout".to_string()))?;

        if let Some(stderr) = process.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!("ffmpeg: {}", line);
                }
            });
        }

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let writer = tokio::spawn(async move {
            let mut frames: u64 = 0;
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    frame = video.next_frame() => {
                        let Some(frame) = frame else { break };
                        if let Err(e) = stdin.write_all(&frame.data).await {
                            tracing::warn!("FFmpeg stdin closed after {} frames: {}", frames, e);
                            break;
                        }
                        frames += 1;
                    }
                }
            }
            video.stop();
            // Closing stdin signals end of input
            let _ = stdin.shutdown().await;
            drop(stdin);
            tracing::debug!("FFmpeg writer finished: {} frames written", frames);
            frames
        });

        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let chunk_size = self.chunk_size;
        tokio::spawn(async move {
            let started = Instant::now();
            let mut sequence: u64 = 0;
            let mut buffer = vec![0u8; chunk_size];
            loop {
                match stdout.read(&mut buffer).await {
                    Ok(0) => break,
                    Ok(n) => {
                        let chunk = RecordedChunk {
                            sequence,
                            elapsed: started.elapsed(),
                            data: buffer[..n].to_vec(),
                        };
                        sequence += 1;
                        if chunk_tx.send(chunk).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to read FFmpeg output: {}", e);
                        break;
                    }
                }
            }
            tracing::debug!("FFmpeg output closed after {} chunks", sequence);
        });

        Ok(EncoderSession {
            chunks: chunk_rx,
            control: Box::new(FfmpegControl {
                process,
                stop_tx: Some(stop_tx),
                writer: Some(writer),
            }),
        })
    }
}

/// Stop handle for a running FFmpeg process
struct FfmpegControl {
    process: Child,
    stop_tx: Option<oneshot::Sender<()>>,
    writer: Option<JoinHandle<u64>>,
}

#[async_trait]
impl EncoderControl for FfmpegControl {
    async fn stop(&mut self) -> RecordingResult<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(writer) = self.writer.take() {
            writer
                .await
                .map_err(|e| RecordingError::Encoder(format!("FFmpeg writer failed: {}", e)))?;
        }

        let status = self
            .process
            .wait()
            .await
            .map_err(|e| RecordingError::Encoder(format!("Failed to wait for FFmpeg: {}", e)))?;

        if !status.success() {
            return Err(RecordingError::Encoder(format!(
                "FFmpeg exited with error: {}",
                status
            )));
        }

        tracing::info!("FFmpeg encoder finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::AudioInput;

    fn track(device: &str) -> AudioTrack {
        AudioTrack {
            id: device.to_string(),
            label: device.to_string(),
            input: AudioInput {
                format: "pulse".to_string(),
                device: device.to_string(),
            },
        }
    }

    fn position(args: &[String], value: &str) -> Option<usize> {
        args.iter().position(|a| a == value)
    }

    #[test]
    fn test_video_only_args() {
        let args = FfmpegEncoder::build_args(640, 480, 30, &[], RecordingFormat::Webm);

        assert!(args.contains(&"640x480".to_string()));
        assert!(args.contains(&"libvpx".to_string()));
        assert!(!args.contains(&"-c:a".to_string()));
        assert!(!args.contains(&"-shortest".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn test_single_audio_track_is_mapped() {
        let args =
            FfmpegEncoder::build_args(640, 480, 30, &[track("default")], RecordingFormat::Webm);

        let input = position(&args, "default").unwrap();
        assert_eq!(args[input - 1], "-i");
        assert_eq!(args[input - 2], "pulse");
        assert!(args.contains(&"1:a".to_string()));
        assert!(args.contains(&"libopus".to_string()));
        assert!(args.contains(&"-shortest".to_string()));
    }

    #[test]
    fn test_multiple_audio_tracks_are_mixed() {
        let args = FfmpegEncoder::build_args(
            640,
            480,
            30,
            &[track("mic"), track("line")],
            RecordingFormat::Mp4,
        );

        let filter = position(&args, "-filter_complex").unwrap();
        assert_eq!(args[filter + 1], "[1:a][2:a]amix=inputs=2:duration=longest[aout]");
        assert!(args.contains(&"[aout]".to_string()));
        assert!(args.contains(&"aac".to_string()));
        assert!(args.contains(&"frag_keyframe+empty_moov+default_base_moof".to_string()));

        let container = position(&args, "pipe:1").unwrap();
        assert_eq!(args[container - 1], "mp4");
    }
}
