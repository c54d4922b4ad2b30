// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline storage consumed by the builder.
//!
//! [`TimelineStore`] is the narrow interface the builder mutates through.
//! [`Timeline`] implements it in memory and [`TimelineLibrary`] holds named
//! timelines the way an animation player does.

use crate::keyframe::{InterpolationMode, KeyPayload, UpdateMode};
use crate::path::NodePath;
use crate::track::{Track, TrackKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimelineId(pub Uuid);

impl TimelineId {
    /// Create a new random timeline ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TimelineId {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage primitives for an ordered set of tracks.
///
/// Track indices are positional: removing a track renumbers every track
/// after it.
pub trait TimelineStore {
    /// Identity of this timeline
    fn identity(&self) -> TimelineId;

    /// Total length in seconds
    fn length(&self) -> f32;

    /// Set the total length in seconds
    fn set_length(&mut self, length: f32);

    /// Number of tracks
    fn track_count(&self) -> usize;

    /// Append a track of `kind`, returning its index
    fn add_track(&mut self, kind: TrackKind) -> usize;

    /// Remove the track at `index`
    fn remove_track(&mut self, index: usize);

    /// Kind of the track at `index`
    fn track_kind(&self, index: usize) -> Option<TrackKind>;

    /// Address of the track at `index`
    fn track_path(&self, index: usize) -> Option<NodePath>;

    /// Set the address of the track at `index`
    fn set_track_path(&mut self, index: usize, path: NodePath);

    /// Interpolation mode of the track at `index`
    fn interpolation(&self, index: usize) -> Option<InterpolationMode>;

    /// Set the interpolation mode of the track at `index`
    fn set_interpolation(&mut self, index: usize, mode: InterpolationMode);

    /// Update mode of the track at `index`
    fn update_mode(&self, index: usize) -> Option<UpdateMode>;

    /// Set the update mode of the track at `index`
    fn set_update_mode(&mut self, index: usize, mode: UpdateMode);

    /// Loop-wrap flag of the track at `index`
    fn loop_wrap(&self, index: usize) -> Option<bool>;

    /// Set the loop-wrap flag of the track at `index`
    fn set_loop_wrap(&mut self, index: usize, wrap: bool);

    /// Insert a key. Returns the key index when the store reports one.
    fn insert_key(&mut self, index: usize, time: f32, payload: KeyPayload) -> Option<usize>;

    /// Find the key at exactly `time`
    fn find_key(&self, index: usize, time: f32) -> Option<usize>;

    /// Number of keys on the track at `index`
    fn key_count(&self, index: usize) -> usize;
}

/// Loop behaviour of a timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LoopMode {
    /// Play once
    #[default]
    None,
    /// Restart at the beginning
    Linear,
    /// Alternate direction at each end
    PingPong,
}

/// An in-memory timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// Unique timeline ID
    pub id: TimelineId,
    /// Total length in seconds
    pub length: f32,
    /// Editor snapping step in seconds
    pub step: f32,
    /// Loop behaviour
    pub loop_mode: LoopMode,
    /// Tracks, in index order
    tracks: Vec<Track>,
}

impl Timeline {
    /// Create an empty timeline of `length` seconds
    pub fn new(length: f32) -> Self {
        Self {
            id: TimelineId::new(),
            length,
            step: 1.0 / 30.0,
            loop_mode: LoopMode::None,
            tracks: Vec::new(),
        }
    }

    /// Get a track
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Get a mutable track
    pub fn track_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    /// Get all tracks
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Get the duration based on track content
    pub fn content_duration(&self) -> f32 {
        self.tracks.iter().map(Track::duration).fold(0.0, f32::max)
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl TimelineStore for Timeline {
    fn identity(&self) -> TimelineId {
        self.id
    }

    fn length(&self) -> f32 {
        self.length
    }

    fn set_length(&mut self, length: f32) {
        self.length = length;
    }

    fn track_count(&self) -> usize {
        self.tracks.len()
    }

    fn add_track(&mut self, kind: TrackKind) -> usize {
        self.tracks.push(Track::new(kind));
        self.tracks.len() - 1
    }

    fn remove_track(&mut self, index: usize) {
        if index < self.tracks.len() {
            self.tracks.remove(index);
        }
    }

    fn track_kind(&self, index: usize) -> Option<TrackKind> {
        self.tracks.get(index).map(|t| t.kind)
    }

    fn track_path(&self, index: usize) -> Option<NodePath> {
        self.tracks.get(index).map(|t| t.path.clone())
    }

    fn set_track_path(&mut self, index: usize, path: NodePath) {
        if let Some(track) = self.tracks.get_mut(index) {
            track.path = path;
        }
    }

    fn interpolation(&self, index: usize) -> Option<InterpolationMode> {
        self.tracks.get(index).map(|t| t.interpolation)
    }

    fn set_interpolation(&mut self, index: usize, mode: InterpolationMode) {
        if let Some(track) = self.tracks.get_mut(index) {
            track.interpolation = mode;
        }
    }

    fn update_mode(&self, index: usize) -> Option<UpdateMode> {
        self.tracks.get(index).map(|t| t.update_mode)
    }

    fn set_update_mode(&mut self, index: usize, mode: UpdateMode) {
        if let Some(track) = self.tracks.get_mut(index) {
            track.update_mode = mode;
        }
    }

    fn loop_wrap(&self, index: usize) -> Option<bool> {
        self.tracks.get(index).map(|t| t.loop_wrap)
    }

    fn set_loop_wrap(&mut self, index: usize, wrap: bool) {
        if let Some(track) = self.tracks.get_mut(index) {
            track.loop_wrap = wrap;
        }
    }

    fn insert_key(&mut self, index: usize, time: f32, payload: KeyPayload) -> Option<usize> {
        let track = self.tracks.get_mut(index)?;
        if !track.kind.accepts(&payload) {
            return None;
        }
        let kind = track.kind;
        let key_index = track.insert_key(time, payload);
        // Audio clips are placed, not indexed; callers locate them by time.
        (kind != TrackKind::Audio).then_some(key_index)
    }

    fn find_key(&self, index: usize, time: f32) -> Option<usize> {
        self.tracks.get(index)?.find_key(time)
    }

    fn key_count(&self, index: usize) -> usize {
        self.tracks.get(index).map_or(0, Track::key_count)
    }
}

/// Named collection of timelines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineLibrary {
    timelines: IndexMap<String, Timeline>,
}

impl TimelineLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a timeline, returning the one it replaced
    pub fn insert(&mut self, name: impl Into<String>, timeline: Timeline) -> Option<Timeline> {
        self.timelines.insert(name.into(), timeline)
    }

    /// Remove a timeline
    pub fn remove(&mut self, name: &str) -> Option<Timeline> {
        self.timelines.shift_remove(name)
    }

    /// Whether a timeline with `name` exists
    pub fn contains(&self, name: &str) -> bool {
        self.timelines.contains_key(name)
    }

    /// Get a timeline
    pub fn get(&self, name: &str) -> Option<&Timeline> {
        self.timelines.get(name)
    }

    /// Get a mutable timeline
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Timeline> {
        self.timelines.get_mut(name)
    }

    /// Names of all timelines, in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.timelines.keys().map(String::as_str)
    }

    /// Get timeline count
    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    /// Whether the library is empty
    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    /// Deserialize from RON
    pub fn from_ron(s: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(s)
    }
}
