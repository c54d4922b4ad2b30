// SPDX-License-Identifier: MIT OR Apache-2.0
//! Declarative construction scripts.
//!
//! A [`BuildScript`] describes the tracks and keys a timeline should have.
//! Applying it goes through the [`TrackBuilder`], so replaying the same
//! script in one session leaves the timeline unchanged.

use crate::builder::{KeyInsertion, TrackBuilder, TrackHandle};
use crate::config::BuilderConfig;
use crate::error::Result;
use crate::hierarchy::{NodeId, SceneHierarchy};
use crate::keyframe::{InterpolationMode, KeyPayload, UpdateMode};
use crate::timeline::{TimelineLibrary, TimelineStore};
use crate::track::TrackKind;
use serde::{Deserialize, Serialize};
use tracing::info;

/// A key to insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyScript {
    /// Time in seconds
    pub time: f32,
    /// Payload; must match the track kind
    pub payload: KeyPayload,
}

/// A track to select or create, with its settings and keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackScript {
    /// Track kind
    pub kind: TrackKind,
    /// Path of the target node relative to the builder base
    pub target: String,
    /// Property name for value and blend shape tracks
    #[serde(default)]
    pub property: Option<String>,
    /// Overrides the configured reuse policy
    #[serde(default)]
    pub reuse_existing: Option<bool>,
    /// Interpolation mode to apply
    #[serde(default)]
    pub interpolation: Option<InterpolationMode>,
    /// Update mode to apply
    #[serde(default)]
    pub update_mode: Option<UpdateMode>,
    /// Loop-wrap flag to apply
    #[serde(default)]
    pub loop_wrap: Option<bool>,
    /// Keys to insert
    #[serde(default)]
    pub keys: Vec<KeyScript>,
}

/// Tracks to remove for a node before building
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalScript {
    /// Path of the target node relative to the builder base
    pub target: String,
    /// Track kind to remove
    pub kind: TrackKind,
}

/// Description of a timeline construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildScript {
    /// Timeline name in the library
    pub timeline: String,
    /// Timeline length; the configured default is used when creating without one
    #[serde(default)]
    pub length: Option<f32>,
    /// Removals applied before any track is built
    #[serde(default)]
    pub remove: Vec<RemovalScript>,
    /// Tracks to build, in order
    #[serde(default)]
    pub tracks: Vec<TrackScript>,
}

/// What applying a script did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptReport {
    /// Tracks created
    pub tracks_created: usize,
    /// Existing tracks reused
    pub tracks_reused: usize,
    /// Tracks removed
    pub tracks_removed: usize,
    /// Keys written
    pub keys_inserted: usize,
    /// Keys skipped because this session already inserted them
    pub keys_unchanged: usize,
}

impl std::ops::AddAssign for ScriptReport {
    fn add_assign(&mut self, other: Self) {
        self.tracks_created += other.tracks_created;
        self.tracks_reused += other.tracks_reused;
        self.tracks_removed += other.tracks_removed;
        self.keys_inserted += other.keys_inserted;
        self.keys_unchanged += other.keys_unchanged;
    }
}

impl BuildScript {
    /// Parse from RON
    pub fn from_ron(s: &str) -> std::result::Result<Self, ron::error::SpannedError> {
        ron::from_str(s)
    }

    /// Open the script's timeline in `library`, creating it if needed,
    /// and apply the script `passes` times in one builder session.
    ///
    /// Removals only run on the first pass, so later passes find the
    /// rebuilt tracks in place. A timeline created here is removed again
    /// if any pass fails.
    pub fn run<H: SceneHierarchy + ?Sized>(
        &self,
        library: &mut TimelineLibrary,
        hierarchy: &H,
        base: NodeId,
        config: &BuilderConfig,
        passes: usize,
    ) -> Result<Vec<ScriptReport>> {
        let created = !library.contains(&self.timeline);
        let result = self.run_session(library, hierarchy, base, config, passes);
        if result.is_err() && created && library.remove(&self.timeline).is_some() {
            info!("Discarded partially built timeline {:?}", self.timeline);
        }
        result
    }

    fn run_session<H: SceneHierarchy + ?Sized>(
        &self,
        library: &mut TimelineLibrary,
        hierarchy: &H,
        base: NodeId,
        config: &BuilderConfig,
        passes: usize,
    ) -> Result<Vec<ScriptReport>> {
        let builder = if library.contains(&self.timeline) {
            let mut builder = TrackBuilder::open(library, &self.timeline, hierarchy, base)?;
            if let Some(length) = self.length {
                builder.set_length(length)?;
            }
            builder
        } else {
            let length = self.length.unwrap_or(config.default_length);
            TrackBuilder::create(library, &self.timeline, length, hierarchy, base)?
        };
        let mut builder = builder.with_config(config.clone());

        (0..passes)
            .map(|pass| self.apply_pass(&mut builder, pass == 0))
            .collect()
    }

    /// Apply the script through an open builder: removals first, then tracks
    pub fn apply<S, H>(&self, builder: &mut TrackBuilder<'_, S, H>) -> Result<ScriptReport>
    where
        S: TimelineStore + ?Sized,
        H: SceneHierarchy + ?Sized,
    {
        self.apply_pass(builder, true)
    }

    fn apply_pass<S, H>(&self, builder: &mut TrackBuilder<'_, S, H>, with_removals: bool) -> Result<ScriptReport>
    where
        S: TimelineStore + ?Sized,
        H: SceneHierarchy + ?Sized,
    {
        let mut report = ScriptReport::default();

        if with_removals {
            for removal in &self.remove {
                let target = builder.resolver().node_at(&removal.target)?;
                report.tracks_removed += builder.remove_tracks_for_node(target, removal.kind)?;
            }
        }

        for track in &self.tracks {
            report += apply_track(builder, track)?;
        }

        info!(
            "Applied script for {:?}: {} created, {} reused, {} removed, {} keys inserted, {} unchanged",
            self.timeline,
            report.tracks_created,
            report.tracks_reused,
            report.tracks_removed,
            report.keys_inserted,
            report.keys_unchanged
        );
        Ok(report)
    }
}

fn apply_track<S, H>(builder: &mut TrackBuilder<'_, S, H>, script: &TrackScript) -> Result<ScriptReport>
where
    S: TimelineStore + ?Sized,
    H: SceneHierarchy + ?Sized,
{
    let mut report = ScriptReport::default();
    let target = builder.resolver().node_at(&script.target)?;
    let reuse = script
        .reuse_existing
        .unwrap_or(builder.config().reuse_existing_tracks);

    let before = builder.track_count();
    let handle = builder.select_or_create(script.kind, target, script.property.as_deref(), reuse)?;
    if builder.track_count() > before {
        report.tracks_created += 1;
    } else {
        report.tracks_reused += 1;
    }

    if let Some(mode) = script.interpolation {
        builder.set_interpolation(handle, mode)?;
    }
    if let Some(mode) = script.update_mode {
        builder.set_update_mode(handle, mode)?;
    }
    if let Some(wrap) = script.loop_wrap {
        builder.set_loop_wrap(handle, wrap)?;
    }

    for key in &script.keys {
        if insert_key(builder, handle, key)?.is_inserted() {
            report.keys_inserted += 1;
        } else {
            report.keys_unchanged += 1;
        }
    }
    Ok(report)
}

fn insert_key<S, H>(
    builder: &mut TrackBuilder<'_, S, H>,
    handle: TrackHandle,
    key: &KeyScript,
) -> Result<KeyInsertion>
where
    S: TimelineStore + ?Sized,
    H: SceneHierarchy + ?Sized,
{
    let time = key.time;
    match &key.payload {
        KeyPayload::Method { method, args } => builder.insert_method_key(handle, time, method, args.clone()),
        KeyPayload::Value(value) => builder.insert_value_key(handle, time, value.clone()),
        KeyPayload::Position(v) => builder.insert_position_key(handle, time, *v),
        KeyPayload::Rotation(q) => builder.insert_rotation_key(handle, time, *q),
        KeyPayload::Scale(v) => builder.insert_scale_key(handle, time, *v),
        KeyPayload::BlendShape(w) => builder.insert_blend_shape_key(handle, time, *w),
        KeyPayload::Audio {
            stream,
            start_offset,
            end_offset,
        } => builder.insert_audio_key(handle, time, stream, *start_offset, *end_offset),
        KeyPayload::Animation { animation } => builder.insert_animation_key(handle, time, animation),
    }
}
