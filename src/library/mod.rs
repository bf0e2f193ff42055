//! Clip library
//!
//! Encodes finished recordings as text, persists them newest-first in a
//! key-value store, and hands out playback handles for the clips in memory.

pub mod clips;
pub mod codec;
pub mod playback;
pub mod storage;

pub use clips::{Clip, ClipLibrary, ClipSummary, LibraryError, LibraryResult, StoredClip};
pub use codec::CodecError;
pub use playback::{PlaybackHandle, PlaybackRegistry};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError, StorageResult};
