// SPDX-License-Identifier: MIT OR Apache-2.0
//! Content digests of inserted keys, used to skip repeated insertions.
//!
//! A timeline store overwrites or rejects a second insertion at the same
//! time, so replaying a construction script would otherwise churn keys.
//! The registry remembers, per track, which (time, payload) pairs this
//! session already inserted. It lives only as long as the builder and is
//! never persisted.

use crate::keyframe::KeyPayload;
use crate::timeline::TimelineId;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Digest of one key insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyDigest(pub u64);

/// Key time with `-0.0` folded into `0.0`.
///
/// Stores compare key times with `==`, so both zeros address the same key
/// and must digest the same way.
pub fn canonical_time(time: f32) -> f32 {
    if time == 0.0 {
        0.0
    } else {
        time
    }
}

/// Digest an insertion of `payload` at `time` on a track.
///
/// Not collision resistant; only meant as a same-session idempotence guard.
pub fn digest(timeline: TimelineId, track_index: usize, time: f32, payload: &KeyPayload) -> KeyDigest {
    let mut hasher = DefaultHasher::new();
    timeline.hash(&mut hasher);
    track_index.hash(&mut hasher);
    canonical_time(time).to_bits().hash(&mut hasher);
    payload.hash(&mut hasher);
    KeyDigest(hasher.finish())
}

#[derive(Debug, Clone, Copy)]
struct RecordedKey {
    key_index: usize,
    time: f32,
}

/// Per-track map from key digest to key index
#[derive(Debug, Clone, Default)]
pub struct KeyHashRegistry {
    tracks: HashMap<usize, HashMap<KeyDigest, RecordedKey>>,
}

impl KeyHashRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Key index recorded for `digest` on a track
    pub fn lookup(&self, track_index: usize, digest: KeyDigest) -> Option<usize> {
        self.tracks
            .get(&track_index)?
            .get(&digest)
            .map(|recorded| recorded.key_index)
    }

    /// Remember an insertion at `time`
    pub fn record(&mut self, track_index: usize, key_index: usize, time: f32, digest: KeyDigest) {
        self.tracks
            .entry(track_index)
            .or_default()
            .insert(
                digest,
                RecordedKey {
                    key_index,
                    time: canonical_time(time),
                },
            );
    }

    /// Forget digests of keys recorded at exactly `time` on a track.
    ///
    /// Used when the key at that time is overwritten or has disappeared.
    pub fn forget_time(&mut self, track_index: usize, time: f32) {
        let time = canonical_time(time);
        if let Some(digests) = self.tracks.get_mut(&track_index) {
            digests.retain(|_, recorded| recorded.time.to_bits() != time.to_bits());
        }
    }

    /// Forget every digest recorded for a track
    pub fn forget(&mut self, track_index: usize) {
        self.tracks.remove(&track_index);
    }

    /// Forget a track and every track after it.
    ///
    /// Removing a track shifts later indices down, and their digests embed
    /// the old index, so none of them can be trusted afterwards.
    pub fn forget_from(&mut self, track_index: usize) {
        self.tracks.retain(|&index, _| index < track_index);
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Track indices with recorded digests, ascending
    pub fn tracked_tracks(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.tracks.keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Total number of recorded digests
    pub fn len(&self) -> usize {
        self.tracks.values().map(HashMap::len).sum()
    }

    /// Whether nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyframe::Variant;

    #[test]
    fn test_digest_is_deterministic() {
        let id = TimelineId::new();
        let payload = KeyPayload::method("jump", vec![]);
        assert_eq!(digest(id, 0, 0.5, &payload), digest(id, 0, 0.5, &payload.clone()));
    }

    #[test]
    fn test_digest_inputs_all_matter() {
        let id = TimelineId::new();
        let payload = KeyPayload::Value(Variant::Float(1.0));
        let base = digest(id, 0, 0.5, &payload);
        assert_ne!(base, digest(TimelineId::new(), 0, 0.5, &payload));
        assert_ne!(base, digest(id, 1, 0.5, &payload));
        assert_ne!(base, digest(id, 0, 0.25, &payload));
        assert_ne!(base, digest(id, 0, 0.5, &KeyPayload::Value(Variant::Float(2.0))));
    }

    #[test]
    fn test_record_lookup_forget() {
        let mut registry = KeyHashRegistry::new();
        let d = KeyDigest(42);
        registry.record(3, 7, 0.5, d);
        assert_eq!(registry.lookup(3, d), Some(7));
        assert_eq!(registry.lookup(2, d), None);
        registry.forget(3);
        assert_eq!(registry.lookup(3, d), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_forget_time_only_drops_that_time() {
        let mut registry = KeyHashRegistry::new();
        registry.record(0, 0, 0.0, KeyDigest(1));
        registry.record(0, 1, 0.5, KeyDigest(2));
        registry.record(0, 1, 0.5, KeyDigest(3));
        registry.forget_time(0, 0.5);
        assert_eq!(registry.lookup(0, KeyDigest(1)), Some(0));
        assert_eq!(registry.lookup(0, KeyDigest(2)), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_signed_zero_times_are_one_key() {
        let id = TimelineId::new();
        let payload = KeyPayload::Value(Variant::Bool(true));
        assert_eq!(digest(id, 0, 0.0, &payload), digest(id, 0, -0.0, &payload));

        let mut registry = KeyHashRegistry::new();
        registry.record(0, 0, -0.0, KeyDigest(1));
        registry.record(0, 0, 0.0, KeyDigest(2));
        registry.forget_time(0, 0.0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_forget_from_drops_shifted_tracks() {
        let mut registry = KeyHashRegistry::new();
        for track in 0..4 {
            registry.record(track, 0, 0.0, KeyDigest(track as u64));
        }
        registry.forget_from(2);
        assert_eq!(registry.tracked_tracks(), vec![0, 1]);
        assert_eq!(registry.len(), 2);
    }
}
