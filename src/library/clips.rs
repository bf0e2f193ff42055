//! Persisted clip library
//!
//! Clips are kept newest-first, both in memory and in storage. Storage holds
//! a JSON array of `{ data, date }` records under one key; memory adds a
//! playback handle per clip. Every mutation writes storage first and only
//! then touches memory, so a failed write leaves both sides as they were.

use super::codec::{self, CodecError};
use super::playback::{PlaybackHandle, PlaybackRegistry};
use super::storage::{KeyValueStore, StorageError};
use crate::config::LibraryConfig;
use crate::recorder::{Artifact, RecordingFormat};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Library-related errors
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Clip index {index} out of range (library holds {len} clips)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type LibraryResult<T> = Result<T, LibraryError>;

/// Persisted form of a clip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredClip {
    pub data: String,
    pub date: String,
}

/// A clip held in memory
#[derive(Debug, Clone)]
pub struct Clip {
    data: String,
    date: String,
    created_at: DateTime<Utc>,
    handle: PlaybackHandle,
}

impl Clip {
    /// Encoded artifact text, exactly as persisted
    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn playback_url(&self) -> String {
        self.handle.url()
    }

    fn stored(&self) -> StoredClip {
        StoredClip {
            data: self.data.clone(),
            date: self.date.clone(),
        }
    }
}

/// Clip as shown to the UI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipSummary {
    pub playback_url: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Clip> for ClipSummary {
    fn from(clip: &Clip) -> Self {
        ClipSummary {
            playback_url: clip.playback_url(),
            created_at: clip.created_at,
        }
    }
}

/// Ordered, persisted collection of recorded clips
pub struct ClipLibrary {
    store: Arc<dyn KeyValueStore>,
    key: String,
    playback: Arc<PlaybackRegistry>,
    clips: Vec<Clip>,
    /// Set while the last storage read failed; memory then mirrors nothing
    read_error: Option<String>,
}

impl ClipLibrary {
    /// Create an empty library; call `load` to read storage
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        config: &LibraryConfig,
        playback: Arc<PlaybackRegistry>,
    ) -> Self {
        Self {
            store,
            key: config.storage_key.clone(),
            playback,
            clips: Vec::new(),
            read_error: None,
        }
    }

    /// Create a library and load it from storage
    pub async fn open(
        store: Arc<dyn KeyValueStore>,
        config: &LibraryConfig,
        playback: Arc<PlaybackRegistry>,
    ) -> Self {
        let mut library = Self::new(store, config, playback);
        library.load().await;
        library
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn summaries(&self) -> Vec<ClipSummary> {
        self.clips.iter().map(ClipSummary::from).collect()
    }

    pub fn playback(&self) -> &Arc<PlaybackRegistry> {
        &self.playback
    }

    /// Whether the last storage read failed
    pub fn is_unreadable(&self) -> bool {
        self.read_error.is_some()
    }

    /// Read storage, dropping invalid records
    ///
    /// Never fails. If anything was dropped the pruned array is written back.
    /// Handles of previously loaded clips are revoked. Returns the number of
    /// clips loaded.
    ///
    /// An unreadable store leaves the library empty and marks it unreadable:
    /// `save` retries the read first and `delete` refuses until a load succeeds.
    pub async fn load(&mut self) -> usize {
        let raw = match self.store.get(&self.key).await {
            Ok(raw) => {
                self.read_error = None;
                raw
            }
            Err(e) => {
                tracing::error!("Failed to read clip library '{}': {}", self.key, e);
                self.read_error = Some(e.to_string());
                None
            }
        };

        let (valid, dropped) = match raw {
            None => (Vec::new(), 0),
            Some(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Array(records)) => {
                    let total = records.len();
                    let valid: Vec<(StoredClip, DateTime<Utc>, Artifact)> =
                        records.into_iter().filter_map(validate_record).collect();
                    let dropped = total - valid.len();
                    (valid, dropped)
                }
                Ok(_) | Err(_) => {
                    tracing::warn!("Clip library '{}' is not a JSON array, resetting", self.key);
                    (Vec::new(), 1)
                }
            },
        };

        if dropped > 0 {
            tracing::warn!("Dropped {} invalid clip record(s) from '{}'", dropped, self.key);
            let pruned: Vec<&StoredClip> = valid.iter().map(|(stored, _, _)| stored).collect();
            match serde_json::to_string(&pruned) {
                Ok(text) => {
                    if let Err(e) = self.store.set(&self.key, &text).await {
                        tracing::error!("Failed to re-persist pruned clip library: {}", e);
                    }
                }
                Err(e) => tracing::error!("Failed to serialize pruned clip library: {}", e),
            }
        }

        let clips: Vec<Clip> = valid
            .into_iter()
            .map(|(stored, created_at, artifact)| Clip {
                data: stored.data,
                date: stored.date,
                created_at,
                handle: self.playback.register(artifact),
            })
            .collect();

        for old in std::mem::replace(&mut self.clips, clips) {
            self.playback.revoke(&old.handle);
        }

        tracing::info!("Loaded {} clip(s) from '{}'", self.clips.len(), self.key);
        self.clips.len()
    }

    /// Reload from storage, releasing the current playback handles
    pub async fn reload(&mut self) -> usize {
        self.load().await
    }

    /// Persist a new clip at the front of the library
    pub async fn save(&mut self, artifact: Artifact) -> LibraryResult<ClipSummary> {
        codec::validate(&artifact)?;
        if self.read_error.is_some() {
            self.load().await;
        }
        self.check_readable()?;

        let created_at = Utc::now();
        let stored = StoredClip {
            data: codec::encode(&artifact),
            date: created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        };

        let mut projection = Vec::with_capacity(self.clips.len() + 1);
        projection.push(stored.clone());
        projection.extend(self.clips.iter().map(Clip::stored));
        self.persist(&projection).await?;

        let clip = Clip {
            data: stored.data,
            date: stored.date,
            created_at,
            handle: self.playback.register(artifact),
        };
        let summary = ClipSummary::from(&clip);
        self.clips.insert(0, clip);

        tracing::info!("Saved clip, library now holds {} clip(s)", self.clips.len());
        Ok(summary)
    }

    /// Remove the clip at `index`
    pub async fn delete(&mut self, index: usize) -> LibraryResult<()> {
        self.check_readable()?;
        self.check_index(index)?;

        let projection: Vec<StoredClip> = self
            .clips
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, clip)| clip.stored())
            .collect();
        self.persist(&projection).await?;

        let removed = self.clips.remove(index);
        self.playback.revoke(&removed.handle);

        tracing::info!("Deleted clip {}, {} remaining", index, self.clips.len());
        Ok(())
    }

    /// Write the clip at `index` into `dir` as `face-track-<date>.<ext>`
    pub async fn export_clip(&self, index: usize, dir: &Path) -> LibraryResult<PathBuf> {
        self.check_index(index)?;
        let clip = &self.clips[index];
        let artifact = codec::decode(&clip.data)?;

        let path = dir.join(export_file_name(clip.created_at, artifact.mime_type()));
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, artifact.bytes()).await?;

        tracing::info!("Exported clip {} to {:?}", index, path);
        Ok(path)
    }

    fn check_readable(&self) -> LibraryResult<()> {
        match &self.read_error {
            Some(reason) => Err(StorageError::Unreadable(reason.clone()).into()),
            None => Ok(()),
        }
    }

    fn check_index(&self, index: usize) -> LibraryResult<()> {
        if index >= self.clips.len() {
            return Err(LibraryError::IndexOutOfRange {
                index,
                len: self.clips.len(),
            });
        }
        Ok(())
    }

    async fn persist(&self, projection: &[StoredClip]) -> LibraryResult<()> {
        let text = serde_json::to_string(projection)?;
        self.store.set(&self.key, &text).await?;
        Ok(())
    }
}

/// Validate one persisted record
fn validate_record(record: Value) -> Option<(StoredClip, DateTime<Utc>, Artifact)> {
    let Value::Object(map) = record else {
        return None;
    };
    let data = map.get("data")?.as_str()?;
    let date = map.get("date")?.as_str()?;

    let artifact = match codec::decode(data) {
        Ok(artifact) => artifact,
        Err(e) => {
            tracing::debug!("Dropping clip record: {}", e);
            return None;
        }
    };
    let created_at = match DateTime::parse_from_rfc3339(date) {
        Ok(parsed) => parsed.with_timezone(&Utc),
        Err(e) => {
            tracing::debug!("Dropping clip record with date '{}': {}", date, e);
            return None;
        }
    };

    Some((
        StoredClip {
            data: data.to_string(),
            date: date.to_string(),
        },
        created_at,
        artifact,
    ))
}

fn export_file_name(created_at: DateTime<Utc>, mime_type: &str) -> String {
    let extension = RecordingFormat::from_mime_type(mime_type)
        .map(|format| format.extension().to_string())
        .unwrap_or_else(|| {
            mime_type
                .split(';')
                .next()
                .and_then(|essence| essence.split('/').nth(1))
                .unwrap_or("bin")
                .to_string()
        });
    format!(
        "face-track-{}.{}",
        created_at.format("%Y-%m-%dT%H-%M-%S%.3fZ"),
        extension
    )
}
