// SPDX-License-Identifier: MIT OR Apache-2.0
//! Track definitions for timelines.

use crate::keyframe::{InterpolationMode, Key, KeyPayload, UpdateMode};
use crate::path::NodePath;
use serde::{Deserialize, Serialize};

/// Type of track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    /// Property animation
    Value,
    /// 3D position channel
    Position3D,
    /// 3D rotation channel
    Rotation3D,
    /// 3D scale channel
    Scale3D,
    /// Mesh blend shape weight
    BlendShape,
    /// Method calls
    Method,
    /// Audio playback
    Audio,
    /// Playback of other animations
    Animation,
}

impl TrackKind {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Value => "Value",
            Self::Position3D => "Position 3D",
            Self::Rotation3D => "Rotation 3D",
            Self::Scale3D => "Scale 3D",
            Self::BlendShape => "Blend Shape",
            Self::Method => "Method Call",
            Self::Audio => "Audio Playback",
            Self::Animation => "Animation Playback",
        }
    }

    /// Whether the interpolation mode is meaningful for this kind
    pub fn supports_interpolation(&self) -> bool {
        matches!(
            self,
            Self::Value | Self::BlendShape | Self::Position3D | Self::Rotation3D | Self::Scale3D
        )
    }

    /// Whether the update mode is meaningful for this kind
    pub fn supports_update_mode(&self) -> bool {
        matches!(self, Self::Value)
    }

    /// Whether the track address carries a property name
    pub fn requires_property(&self) -> bool {
        matches!(self, Self::Value | Self::BlendShape)
    }

    /// Whether `payload` has the shape this kind stores
    pub fn accepts(&self, payload: &KeyPayload) -> bool {
        matches!(
            (self, payload),
            (Self::Value, KeyPayload::Value(_))
                | (Self::Position3D, KeyPayload::Position(_))
                | (Self::Rotation3D, KeyPayload::Rotation(_))
                | (Self::Scale3D, KeyPayload::Scale(_))
                | (Self::BlendShape, KeyPayload::BlendShape(_))
                | (Self::Method, KeyPayload::Method { .. })
                | (Self::Audio, KeyPayload::Audio { .. })
                | (Self::Animation, KeyPayload::Animation { .. })
        )
    }
}

/// A track in a timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Track type
    pub kind: TrackKind,
    /// Address of the animated node (and property)
    pub path: NodePath,
    /// Keys, ordered by time and unique by exact time
    keys: Vec<Key>,
    /// Interpolation between keys
    pub interpolation: InterpolationMode,
    /// How values are pushed to the target
    pub update_mode: UpdateMode,
    /// Interpolate between the last and first key when looping
    pub loop_wrap: bool,
    /// Whether the track is evaluated at all
    pub enabled: bool,
}

impl Track {
    /// Create a new track with an empty address
    pub fn new(kind: TrackKind) -> Self {
        Self {
            kind,
            path: NodePath::default(),
            keys: Vec::new(),
            interpolation: InterpolationMode::Linear,
            update_mode: UpdateMode::Continuous,
            loop_wrap: true,
            enabled: true,
        }
    }

    /// Insert a key, replacing the payload of a key at exactly the same time.
    ///
    /// Returns the key's index.
    pub fn insert_key(&mut self, time: f32, payload: KeyPayload) -> usize {
        let idx = self.keys.partition_point(|k| k.time < time);
        match self.keys.get_mut(idx) {
            Some(existing) if existing.time == time => existing.payload = payload,
            _ => self.keys.insert(idx, Key::new(time, payload)),
        }
        idx
    }

    /// Find the key at exactly `time`
    pub fn find_key(&self, time: f32) -> Option<usize> {
        let idx = self.keys.partition_point(|k| k.time < time);
        self.keys.get(idx).filter(|k| k.time == time).map(|_| idx)
    }

    /// Remove a key by index
    pub fn remove_key(&mut self, index: usize) -> Option<Key> {
        (index < self.keys.len()).then(|| self.keys.remove(index))
    }

    /// Get a key by index
    pub fn key(&self, index: usize) -> Option<&Key> {
        self.keys.get(index)
    }

    /// Get key count
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Get all keys
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Get the duration (time of last key)
    pub fn duration(&self) -> f32 {
        self.keys.last().map(|k| k.time).unwrap_or(0.0)
    }
}
