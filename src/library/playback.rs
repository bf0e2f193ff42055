//! Ephemeral playback handles
//!
//! A handle maps an opaque URL to a decoded artifact for as long as its clip
//! stays in memory. Handles are never persisted.

use crate::recorder::Artifact;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

const PLAYBACK_SCHEME: &str = "blob:facetrack/";

/// Opaque reference to a registered artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaybackHandle {
    id: Uuid,
}

impl PlaybackHandle {
    /// URL a player can resolve through the registry
    pub fn url(&self) -> String {
        format!("{}{}", PLAYBACK_SCHEME, self.id)
    }
}

/// Registry of live playback handles
#[derive(Default)]
pub struct PlaybackRegistry {
    entries: RwLock<HashMap<Uuid, Arc<Artifact>>>,
}

impl PlaybackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, artifact: Artifact) -> PlaybackHandle {
        let id = Uuid::new_v4();
        self.entries.write().insert(id, Arc::new(artifact));
        PlaybackHandle { id }
    }

    /// Artifact behind a playback URL, if still registered
    pub fn resolve(&self, url: &str) -> Option<Arc<Artifact>> {
        let id = url.strip_prefix(PLAYBACK_SCHEME)?;
        let id = Uuid::parse_str(id).ok()?;
        self.entries.read().get(&id).cloned()
    }

    /// Release a handle; returns false if it was already revoked
    pub fn revoke(&self, handle: &PlaybackHandle) -> bool {
        self.entries.write().remove(&handle.id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_resolve_revoke() {
        let registry = PlaybackRegistry::new();
        let handle = registry.register(Artifact::new("video/webm", b"abc".to_vec()));
        let url = handle.url();

        assert!(url.starts_with("blob:facetrack/"));
        assert_eq!(registry.resolve(&url).unwrap().bytes(), b"abc");

        assert!(registry.revoke(&handle));
        assert!(!registry.revoke(&handle));
        assert!(registry.resolve(&url).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_urls_do_not_resolve() {
        let registry = PlaybackRegistry::new();
        assert!(registry.resolve("blob:facetrack/not-a-uuid").is_none());
        assert!(registry.resolve("https://example.com").is_none());
    }
}
