// SPDX-License-Identifier: MIT OR Apache-2.0
//! Track builder: selects tracks, inserts keys and removes tracks while
//! checking every precondition and verifying every store mutation.
//!
//! Track selection returns a [`TrackHandle`]. Key and configuration calls
//! take that handle explicitly. Any track removal renumbers the timeline,
//! so it invalidates every outstanding handle and resets the selection.

use crate::config::BuilderConfig;
use crate::editor::TrackEditor;
use crate::error::{BuilderError, Result};
use crate::hierarchy::{NodeId, SceneHierarchy};
use crate::key_hash::{self, KeyHashRegistry};
use crate::keyframe::{InterpolationMode, KeyPayload, UpdateMode, Variant};
use crate::path::{NodePath, PathResolver};
use crate::timeline::{Timeline, TimelineLibrary, TimelineStore};
use crate::track::TrackKind;
use crate::track_index;
use tracing::{debug, info, trace, warn};

/// Reference to a selected track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackHandle {
    index: usize,
    kind: TrackKind,
    target: NodeId,
    generation: u64,
}

impl TrackHandle {
    /// Track index in the timeline
    pub fn index(&self) -> usize {
        self.index
    }

    /// Track kind
    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// Node the track animates
    pub fn target(&self) -> NodeId {
        self.target
    }
}

/// Outcome of a successful key insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInsertion {
    /// The key was written to the timeline
    Inserted {
        /// Index of the key
        key_index: usize,
    },
    /// The same key was already inserted this session; nothing changed
    Unchanged {
        /// Index of the existing key
        key_index: usize,
    },
}

impl KeyInsertion {
    /// Index of the key
    pub fn key_index(&self) -> usize {
        match self {
            Self::Inserted { key_index } | Self::Unchanged { key_index } => *key_index,
        }
    }

    /// Whether the timeline was modified
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted { .. })
    }
}

/// Builds tracks and keys on a borrowed timeline
pub struct TrackBuilder<'a, S: TimelineStore + ?Sized, H: SceneHierarchy + ?Sized> {
    store: &'a mut S,
    resolver: PathResolver<'a, H>,
    config: BuilderConfig,
    registry: KeyHashRegistry,
    selected: Option<TrackHandle>,
    generation: u64,
}

impl<'a, H: SceneHierarchy + ?Sized> TrackBuilder<'a, Timeline, H> {
    /// Open an existing named timeline for editing
    pub fn open(
        library: &'a mut TimelineLibrary,
        name: &str,
        hierarchy: &'a H,
        base: NodeId,
    ) -> Result<Self> {
        let timeline = library
            .get_mut(name)
            .ok_or_else(|| BuilderError::TimelineNotFound(name.to_string()))?;
        Ok(Self::new(timeline, hierarchy, base))
    }

    /// Create a new named timeline of `length` seconds and open it
    pub fn create(
        library: &'a mut TimelineLibrary,
        name: &str,
        length: f32,
        hierarchy: &'a H,
        base: NodeId,
    ) -> Result<Self> {
        if !(length.is_finite() && length > 0.0) {
            return Err(BuilderError::InvalidLength(length));
        }
        if library.contains(name) {
            return Err(BuilderError::TimelineAlreadyExists(name.to_string()));
        }
        library.insert(name, Timeline::new(length));
        info!("Created timeline {name:?} ({length}s)");
        Self::open(library, name, hierarchy, base)
    }
}

impl<'a, S: TimelineStore + ?Sized, H: SceneHierarchy + ?Sized> TrackBuilder<'a, S, H> {
    /// Create a builder over `store`, addressing tracks relative to `base`
    pub fn new(store: &'a mut S, hierarchy: &'a H, base: NodeId) -> Self {
        Self {
            store,
            resolver: PathResolver::new(hierarchy, base),
            config: BuilderConfig::default(),
            registry: KeyHashRegistry::new(),
            selected: None,
            generation: 0,
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: BuilderConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration
    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// The timeline being built
    pub fn timeline(&self) -> &S {
        &*self.store
    }

    /// Address resolver rooted at the builder base
    pub fn resolver(&self) -> &PathResolver<'a, H> {
        &self.resolver
    }

    /// Digests recorded this session
    pub fn registry(&self) -> &KeyHashRegistry {
        &self.registry
    }

    /// Most recently selected track, if no removal happened since
    pub fn selected(&self) -> Option<TrackHandle> {
        self.selected
    }

    /// Number of tracks in the timeline
    pub fn track_count(&self) -> usize {
        self.store.track_count()
    }

    /// Timeline length in seconds
    pub fn length(&self) -> f32 {
        self.store.length()
    }

    /// Change the timeline length
    pub fn set_length(&mut self, length: f32) -> Result<()> {
        if !(length.is_finite() && length > 0.0) {
            return Err(BuilderError::InvalidLength(length));
        }
        self.store.set_length(length);
        Ok(())
    }

    /// Chain key and configuration calls on one track
    pub fn edit(&mut self, handle: TrackHandle) -> TrackEditor<'_, 'a, S, H> {
        TrackEditor::new(self, handle)
    }

    // ------------------------------------------------------------------
    // Track selection
    // ------------------------------------------------------------------

    /// Select or create a method-call track on `target`
    pub fn method_track(&mut self, target: NodeId) -> Result<TrackHandle> {
        self.select_or_create(TrackKind::Method, target, None, self.config.reuse_existing_tracks)
    }

    /// Select or create a value track for `property` of `target`
    pub fn value_track(&mut self, target: NodeId, property: &str) -> Result<TrackHandle> {
        self.select_or_create(TrackKind::Value, target, Some(property), self.config.reuse_existing_tracks)
    }

    /// Select or create an audio track on an audio player
    pub fn audio_track(&mut self, target: NodeId) -> Result<TrackHandle> {
        self.select_or_create(TrackKind::Audio, target, None, self.config.reuse_existing_tracks)
    }

    /// Select or create an animation-playback track on an animation player
    pub fn animation_track(&mut self, target: NodeId) -> Result<TrackHandle> {
        self.select_or_create(TrackKind::Animation, target, None, self.config.reuse_existing_tracks)
    }

    /// Select or create a position track on a spatial node
    pub fn position_track(&mut self, target: NodeId) -> Result<TrackHandle> {
        self.select_or_create(TrackKind::Position3D, target, None, self.config.reuse_existing_tracks)
    }

    /// Select or create a rotation track on a spatial node
    pub fn rotation_track(&mut self, target: NodeId) -> Result<TrackHandle> {
        self.select_or_create(TrackKind::Rotation3D, target, None, self.config.reuse_existing_tracks)
    }

    /// Select or create a scale track on a spatial node
    pub fn scale_track(&mut self, target: NodeId) -> Result<TrackHandle> {
        self.select_or_create(TrackKind::Scale3D, target, None, self.config.reuse_existing_tracks)
    }

    /// Select or create a blend shape track for `shape` on a mesh
    pub fn blend_shape_track(&mut self, target: NodeId, shape: &str) -> Result<TrackHandle> {
        self.select_or_create(TrackKind::BlendShape, target, Some(shape), self.config.reuse_existing_tracks)
    }

    /// Select an existing track or create a new one.
    ///
    /// With `reuse_existing`, a track with the same address and kind is
    /// selected as-is; otherwise a new track is always created.
    pub fn select_or_create(
        &mut self,
        kind: TrackKind,
        target: NodeId,
        property: Option<&str>,
        reuse_existing: bool,
    ) -> Result<TrackHandle> {
        let path = self.address(kind, target, property)?;
        self.check_target(kind, target, &path)?;

        if reuse_existing {
            if let Some(index) = track_index::find_track(&*self.store, &path, kind) {
                debug!("Reusing {} track {index} at {path}", kind.name());
                return Ok(self.select(index, kind, target));
            }
        }

        let index = self.create_track(kind, path)?;
        Ok(self.select(index, kind, target))
    }

    /// Look up an existing track without creating or selecting it
    pub fn find_track(
        &self,
        kind: TrackKind,
        target: NodeId,
        property: Option<&str>,
    ) -> Result<Option<TrackHandle>> {
        let path = self.address(kind, target, property)?;
        Ok(track_index::find_track(&*self.store, &path, kind).map(|index| TrackHandle {
            index,
            kind,
            target,
            generation: self.generation,
        }))
    }

    fn address(&self, kind: TrackKind, target: NodeId, property: Option<&str>) -> Result<NodePath> {
        match (kind.requires_property(), property) {
            (true, Some(property)) => self.resolver.resolve_property(target, property),
            (true, None) => Err(BuilderError::PropertyRequired(kind)),
            (false, None) => self.resolver.resolve(target),
            (false, Some(_)) => Err(BuilderError::UnsupportedConfiguration {
                setting: "property",
                kind,
            }),
        }
    }

    fn check_target(&self, kind: TrackKind, target: NodeId, path: &NodePath) -> Result<()> {
        let caps = self.resolver.hierarchy().capabilities(target);
        let label = || path.relation.clone();
        match kind {
            TrackKind::Audio if !caps.audio_player => Err(BuilderError::TargetNotAudioPlayer(label())),
            TrackKind::Animation if !caps.animation_player => {
                Err(BuilderError::TargetNotAnimationPlayer(label()))
            }
            TrackKind::Position3D | TrackKind::Rotation3D | TrackKind::Scale3D if !caps.spatial => {
                Err(BuilderError::TargetNotSpatial(label()))
            }
            TrackKind::BlendShape if !caps.mesh => Err(BuilderError::TargetNotMesh(label())),
            _ => Ok(()),
        }
    }

    fn create_track(&mut self, kind: TrackKind, path: NodePath) -> Result<usize> {
        let before = self.store.track_count();
        let index = self.store.add_track(kind);
        if index != before || self.store.track_count() != before + 1 {
            return Err(BuilderError::TrackCreationFailed(format!(
                "expected track {before} of {}, store reports index {index} of {}",
                before + 1,
                self.store.track_count()
            )));
        }

        self.store.set_track_path(index, path.clone());
        if self.store.track_path(index).as_ref() != Some(&path) || self.store.track_kind(index) != Some(kind) {
            return Err(BuilderError::TrackCreationFailed(format!(
                "track {index} does not read back as {} at {path}",
                kind.name()
            )));
        }

        if let Some(mode) = self.config.new_track_interpolation.filter(|_| kind.supports_interpolation()) {
            self.store.set_interpolation(index, mode);
        }
        if let Some(mode) = self.config.new_track_update_mode.filter(|_| kind.supports_update_mode()) {
            self.store.set_update_mode(index, mode);
        }
        if let Some(wrap) = self.config.new_track_loop_wrap {
            self.store.set_loop_wrap(index, wrap);
        }

        // A new track has no keys.
        self.registry.forget(index);
        debug!("Created {} track {index} at {path}", kind.name());
        Ok(index)
    }

    fn select(&mut self, index: usize, kind: TrackKind, target: NodeId) -> TrackHandle {
        let handle = TrackHandle {
            index,
            kind,
            target,
            generation: self.generation,
        };
        self.selected = Some(handle);
        handle
    }

    // ------------------------------------------------------------------
    // Handle and argument checks
    // ------------------------------------------------------------------

    fn check_live(&self, handle: TrackHandle) -> Result<()> {
        if handle.generation != self.generation || self.store.track_kind(handle.index) != Some(handle.kind) {
            return Err(BuilderError::StaleTrackHandle(handle.index));
        }
        Ok(())
    }

    fn check_kind(&self, handle: TrackHandle, expected: TrackKind) -> Result<()> {
        self.check_live(handle)?;
        if handle.kind != expected {
            return Err(BuilderError::WrongTrackKind {
                expected,
                found: handle.kind,
            });
        }
        Ok(())
    }

    fn check_time(&self, time: f32) -> Result<()> {
        let length = self.store.length();
        if !(time.is_finite() && (0.0..=length).contains(&time)) {
            return Err(BuilderError::TimeOutOfRange { time, length });
        }
        Ok(())
    }

    fn check_target_alive(&self, handle: TrackHandle) -> Result<()> {
        if !self.resolver.hierarchy().is_alive(handle.target) {
            return Err(BuilderError::InvalidTarget(handle.target));
        }
        Ok(())
    }

    fn target_label(&self, handle: TrackHandle) -> String {
        self.store
            .track_path(handle.index)
            .map(|p| p.relation)
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Key insertion
    // ------------------------------------------------------------------

    /// Insert a method-call key
    pub fn insert_method_key(
        &mut self,
        handle: TrackHandle,
        time: f32,
        method: &str,
        args: Vec<Variant>,
    ) -> Result<KeyInsertion> {
        self.check_kind(handle, TrackKind::Method)?;
        self.check_time(time)?;
        self.check_target_alive(handle)?;
        if method.is_empty() || !self.resolver.hierarchy().has_method(handle.target, method) {
            return Err(BuilderError::MissingMethod {
                target: self.target_label(handle),
                method: method.to_string(),
            });
        }
        self.insert(handle, time, KeyPayload::method(method, args))
    }

    /// Insert a property value key; the value is not inspected
    pub fn insert_value_key(
        &mut self,
        handle: TrackHandle,
        time: f32,
        value: impl Into<Variant>,
    ) -> Result<KeyInsertion> {
        self.check_kind(handle, TrackKind::Value)?;
        self.check_time(time)?;
        self.insert(handle, time, KeyPayload::Value(value.into()))
    }

    /// Insert a position key
    pub fn insert_position_key(&mut self, handle: TrackHandle, time: f32, position: [f32; 3]) -> Result<KeyInsertion> {
        self.check_kind(handle, TrackKind::Position3D)?;
        self.check_time(time)?;
        self.insert(handle, time, KeyPayload::Position(position))
    }

    /// Insert a rotation key (quaternion x, y, z, w)
    pub fn insert_rotation_key(&mut self, handle: TrackHandle, time: f32, rotation: [f32; 4]) -> Result<KeyInsertion> {
        self.check_kind(handle, TrackKind::Rotation3D)?;
        self.check_time(time)?;
        self.insert(handle, time, KeyPayload::Rotation(rotation))
    }

    /// Insert a scale key
    pub fn insert_scale_key(&mut self, handle: TrackHandle, time: f32, scale: [f32; 3]) -> Result<KeyInsertion> {
        self.check_kind(handle, TrackKind::Scale3D)?;
        self.check_time(time)?;
        self.insert(handle, time, KeyPayload::Scale(scale))
    }

    /// Insert a blend shape weight key
    pub fn insert_blend_shape_key(&mut self, handle: TrackHandle, time: f32, weight: f32) -> Result<KeyInsertion> {
        self.check_kind(handle, TrackKind::BlendShape)?;
        self.check_time(time)?;
        self.insert(handle, time, KeyPayload::BlendShape(weight))
    }

    /// Insert an audio clip key
    pub fn insert_audio_key(
        &mut self,
        handle: TrackHandle,
        time: f32,
        stream: &str,
        start_offset: f32,
        end_offset: f32,
    ) -> Result<KeyInsertion> {
        self.check_kind(handle, TrackKind::Audio)?;
        self.check_time(time)?;
        if stream.is_empty() {
            return Err(BuilderError::InvalidAudioKey("stream reference is empty".to_string()));
        }
        for (name, offset) in [("start", start_offset), ("end", end_offset)] {
            if !(offset.is_finite() && offset >= 0.0) {
                return Err(BuilderError::InvalidAudioKey(format!(
                    "{name} offset {offset} is not a finite non-negative number"
                )));
            }
        }
        self.insert(handle, time, KeyPayload::audio(stream, start_offset, end_offset))
    }

    /// Insert an animation-playback key
    pub fn insert_animation_key(&mut self, handle: TrackHandle, time: f32, animation: &str) -> Result<KeyInsertion> {
        self.check_kind(handle, TrackKind::Animation)?;
        self.check_time(time)?;
        self.check_target_alive(handle)?;
        if animation.is_empty() || !self.resolver.hierarchy().has_animation(handle.target, animation) {
            return Err(BuilderError::MissingAnimation {
                target: self.target_label(handle),
                animation: animation.to_string(),
            });
        }
        self.insert(handle, time, KeyPayload::animation(animation))
    }

    fn insert(&mut self, handle: TrackHandle, time: f32, payload: KeyPayload) -> Result<KeyInsertion> {
        let track = handle.index;
        let time = key_hash::canonical_time(time);
        let digest = key_hash::digest(self.store.identity(), track, time, &payload);

        if self.registry.lookup(track, digest).is_some() {
            if let Some(key_index) = self.store.find_key(track, time) {
                trace!("Key at {time} on track {track} already inserted, skipping");
                return Ok(KeyInsertion::Unchanged { key_index });
            }
            // Removed behind our back; insert it again.
            self.registry.forget_time(track, time);
        }

        let before = self.store.key_count(track);
        let replaces = self.store.find_key(track, time).is_some();
        if replaces {
            self.registry.forget_time(track, time);
        }

        let reported = self.store.insert_key(track, time, payload);

        let expected = if replaces { before } else { before + 1 };
        let after = self.store.key_count(track);
        if after != expected {
            return Err(BuilderError::KeyInsertionFailed(format!(
                "track {track} has {after} keys after inserting at {time}, expected {expected}"
            )));
        }
        let key_index = match (reported, self.store.find_key(track, time)) {
            (Some(reported), Some(located)) if reported == located => located,
            (None, Some(located)) => located,
            (reported, located) => {
                return Err(BuilderError::KeyInsertionFailed(format!(
                    "key at {time} on track {track}: store reported {reported:?}, found {located:?}"
                )))
            }
        };

        self.registry.record(track, key_index, time, digest);
        debug!("Inserted key {key_index} at {time} on track {track}");
        Ok(KeyInsertion::Inserted { key_index })
    }

    /// Number of keys on a track
    pub fn key_count(&self, handle: TrackHandle) -> Result<usize> {
        self.check_live(handle)?;
        Ok(self.store.key_count(handle.index))
    }

    // ------------------------------------------------------------------
    // Per-track configuration
    // ------------------------------------------------------------------

    /// Set the interpolation mode of a value, blend shape or transform track
    pub fn set_interpolation(&mut self, handle: TrackHandle, mode: InterpolationMode) -> Result<()> {
        self.check_live(handle)?;
        if !handle.kind.supports_interpolation() {
            return Err(BuilderError::UnsupportedConfiguration {
                setting: "interpolation",
                kind: handle.kind,
            });
        }
        self.store.set_interpolation(handle.index, mode);
        Ok(())
    }

    /// Set the update mode of a value track
    pub fn set_update_mode(&mut self, handle: TrackHandle, mode: UpdateMode) -> Result<()> {
        self.check_live(handle)?;
        if !handle.kind.supports_update_mode() {
            return Err(BuilderError::UnsupportedConfiguration {
                setting: "update mode",
                kind: handle.kind,
            });
        }
        self.store.set_update_mode(handle.index, mode);
        Ok(())
    }

    /// Set whether a track interpolates across the loop boundary
    pub fn set_loop_wrap(&mut self, handle: TrackHandle, wrap: bool) -> Result<()> {
        self.check_live(handle)?;
        self.store.set_loop_wrap(handle.index, wrap);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Remove a track. Invalidates every outstanding handle.
    pub fn remove_track(&mut self, handle: TrackHandle) -> Result<()> {
        self.check_live(handle)?;
        let before = self.store.track_count();

        self.registry.forget_from(handle.index);
        self.store.remove_track(handle.index);

        let after = self.store.track_count();
        self.invalidate_handles();
        if after + 1 != before {
            return Err(BuilderError::TrackRemovalFailed(format!(
                "removing track {} left {after} of {before} tracks",
                handle.index
            )));
        }
        info!("Removed {} track {}", handle.kind.name(), handle.index);
        Ok(())
    }

    /// Remove the most recently selected track
    pub fn remove_current_track(&mut self) -> Result<()> {
        let handle = self.selected.ok_or(BuilderError::NoTrackSelected)?;
        self.remove_track(handle)
    }

    /// Remove every `kind` track that animates `target`.
    ///
    /// For value and blend shape kinds this covers every property of the
    /// node. Returns the number of removed tracks.
    pub fn remove_tracks_for_node(&mut self, target: NodeId, kind: TrackKind) -> Result<usize> {
        let path = self.resolver.resolve(target)?;
        let removed = track_index::remove_all_matching(&mut *self.store, &path, kind);

        if let Some(&lowest) = removed.last() {
            let recorded = self.registry.len();
            self.registry.forget_from(lowest);
            let dropped = recorded - self.registry.len();
            if dropped > 0 {
                warn!("Batch removal from track {lowest} dropped {dropped} recorded key digest(s)");
            }
            self.invalidate_handles();
            info!("Removed {} {} track(s) for {path}", removed.len(), kind.name());
        }
        Ok(removed.len())
    }

    fn invalidate_handles(&mut self) {
        self.selected = None;
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{NodeKind, SceneTree};

    struct Scene {
        tree: SceneTree,
        root: NodeId,
        a: NodeId,
        b: NodeId,
        music: NodeId,
        anim: NodeId,
        body: NodeId,
    }

    fn scene() -> Scene {
        let mut tree = SceneTree::new();
        let root = tree.add_node(None, "Root", NodeKind::Node);
        let a = tree.add_node(Some(root), "A", NodeKind::Node);
        tree.add_method(a, "jump");
        tree.add_method(a, "say");
        let b = tree.add_node(Some(root), "B", NodeKind::Node);
        tree.add_property(b, "modulate");
        tree.add_property(b, "visible");
        let music = tree.add_node(Some(root), "Music", NodeKind::AudioPlayer);
        let anim = tree.add_node(Some(root), "Anim", NodeKind::AnimationPlayer);
        tree.add_animation(anim, "idle");
        let body = tree.add_node(Some(root), "Body", NodeKind::MeshInstance);
        tree.add_property(body, "smile");
        Scene {
            tree,
            root,
            a,
            b,
            music,
            anim,
            body,
        }
    }

    #[test]
    fn test_method_key_scenario() {
        let s = scene();
        let mut library = TimelineLibrary::new();
        let mut builder = TrackBuilder::create(&mut library, "intro", 1.0, &s.tree, s.root).unwrap();

        let track = builder.method_track(s.a).unwrap();
        let first = builder.insert_method_key(track, 0.5, "jump", vec![]).unwrap();
        assert_eq!(first, KeyInsertion::Inserted { key_index: 0 });
        assert_eq!(builder.track_count(), 1);
        assert_eq!(builder.key_count(track).unwrap(), 1);

        let again = builder.method_track(s.a).unwrap();
        let second = builder.insert_method_key(again, 0.5, "jump", vec![]).unwrap();
        assert_eq!(second, KeyInsertion::Unchanged { key_index: 0 });
        assert!(!second.is_inserted());
        assert_eq!(builder.key_count(again).unwrap(), 1);
        assert_eq!(builder.track_count(), 1);
    }

    #[test]
    fn test_value_key_scenario() {
        let s = scene();
        let mut library = TimelineLibrary::new();
        let mut builder = TrackBuilder::create(&mut library, "fade", 1.0, &s.tree, s.root).unwrap();

        let track = builder.value_track(s.b, "modulate").unwrap();
        builder
            .insert_value_key(track, 1.0, Variant::Color([1.0, 1.0, 1.0, 0.0]))
            .unwrap();
        builder
            .insert_value_key(track, 0.0, Variant::Color([1.0, 1.0, 1.0, 1.0]))
            .unwrap();

        let timeline = builder.timeline();
        let keys = timeline.track(track.index()).unwrap().keys();
        assert_eq!(keys.len(), 2);
        assert!(keys[0].time < keys[1].time);
        assert_eq!(timeline.track_path(0), Some(NodePath::property("B", "modulate")));
    }

    #[test]
    fn test_audio_track_requires_audio_player() {
        let s = scene();
        let mut timeline = Timeline::new(1.0);
        let mut builder = TrackBuilder::new(&mut timeline, &s.tree, s.root);

        let err = builder.audio_track(s.a).unwrap_err();
        assert_eq!(err, BuilderError::TargetNotAudioPlayer("A".to_string()));
        assert!(err.is_precondition());
        assert_eq!(builder.track_count(), 0);

        let track = builder.audio_track(s.music).unwrap();
        let inserted = builder.insert_audio_key(track, 0.25, "theme.ogg", 0.0, 0.5).unwrap();
        assert_eq!(inserted, KeyInsertion::Inserted { key_index: 0 });
    }

    #[test]
    fn test_reuse_selects_same_track() {
        let s = scene();
        let mut timeline = Timeline::new(1.0);
        let mut builder = TrackBuilder::new(&mut timeline, &s.tree, s.root);

        let first = builder.value_track(s.b, "modulate").unwrap();
        let second = builder.value_track(s.b, "modulate").unwrap();
        assert_eq!(first.index(), second.index());
        assert_eq!(builder.track_count(), 1);

        let other_property = builder.value_track(s.b, "visible").unwrap();
        assert_eq!(other_property.index(), 1);

        let forced = builder.select_or_create(TrackKind::Value, s.b, Some("modulate"), false).unwrap();
        assert_eq!(forced.index(), 2);
        assert_eq!(builder.track_count(), 3);
    }

    #[test]
    fn test_distinct_payloads_at_same_time_are_not_deduplicated() {
        let s = scene();
        let mut timeline = Timeline::new(1.0);
        let mut builder = TrackBuilder::new(&mut timeline, &s.tree, s.root);
        let track = builder.value_track(s.b, "visible").unwrap();

        assert!(builder.insert_value_key(track, 0.5, true).unwrap().is_inserted());
        assert!(builder.insert_value_key(track, 0.5, false).unwrap().is_inserted());
        // The store keeps one key per time; the latest payload wins.
        assert_eq!(builder.key_count(track).unwrap(), 1);
        let stored = builder.timeline().track(0).unwrap().keys()[0].payload.clone();
        assert_eq!(stored, KeyPayload::Value(Variant::Bool(false)));

        // Re-inserting the overwritten payload writes it again.
        assert!(builder.insert_value_key(track, 0.5, true).unwrap().is_inserted());
        let stored = builder.timeline().track(0).unwrap().keys()[0].payload.clone();
        assert_eq!(stored, KeyPayload::Value(Variant::Bool(true)));
    }

    #[test]
    fn test_signed_zero_overwrite_is_not_suppressed() {
        let s = scene();
        let mut timeline = Timeline::new(1.0);
        let mut builder = TrackBuilder::new(&mut timeline, &s.tree, s.root);
        let track = builder.value_track(s.b, "visible").unwrap();

        assert!(builder.insert_value_key(track, 0.0, true).unwrap().is_inserted());
        assert_eq!(
            builder.insert_value_key(track, -0.0, true).unwrap(),
            KeyInsertion::Unchanged { key_index: 0 }
        );
        assert!(builder.insert_value_key(track, 0.0, false).unwrap().is_inserted());

        let outcome = builder.insert_value_key(track, -0.0, true).unwrap();
        assert_eq!(outcome, KeyInsertion::Inserted { key_index: 0 });
        let keys = builder.timeline().track(0).unwrap().keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].payload, KeyPayload::Value(Variant::Bool(true)));
        assert_eq!(keys[0].time.to_bits(), 0.0_f32.to_bits());
    }

    #[test]
    fn test_repeat_insertion_leaves_keys_untouched() {
        let s = scene();
        let mut timeline = Timeline::new(1.0);
        let mut builder = TrackBuilder::new(&mut timeline, &s.tree, s.root);
        let track = builder.method_track(s.a).unwrap();

        builder.insert_method_key(track, 0.25, "jump", vec![]).unwrap();
        builder
            .insert_method_key(track, 0.75, "say", vec![Variant::from("hi")])
            .unwrap();
        let before = builder.timeline().track(0).unwrap().keys().to_vec();

        assert_eq!(
            builder
                .insert_method_key(track, 0.75, "say", vec![Variant::from("hi")])
                .unwrap(),
            KeyInsertion::Unchanged { key_index: 1 }
        );
        assert_eq!(builder.timeline().track(0).unwrap().keys(), before.as_slice());

        // An earlier key shifts the recorded ones; repeats report the new index.
        assert_eq!(
            builder.insert_method_key(track, 0.1, "jump", vec![]).unwrap(),
            KeyInsertion::Inserted { key_index: 0 }
        );
        let shifted = builder.timeline().track(0).unwrap().keys().to_vec();
        assert_eq!(shifted.len(), 3);
        assert_eq!(&shifted[1..], before.as_slice());

        assert_eq!(
            builder
                .insert_method_key(track, 0.75, "say", vec![Variant::from("hi")])
                .unwrap(),
            KeyInsertion::Unchanged { key_index: 2 }
        );
        assert_eq!(
            builder.insert_method_key(track, 0.25, "jump", vec![]).unwrap(),
            KeyInsertion::Unchanged { key_index: 1 }
        );
        assert_eq!(builder.timeline().track(0).unwrap().keys(), shifted.as_slice());
    }

    #[test]
    fn test_removal_resets_selection() {
        let s = scene();
        let mut timeline = Timeline::new(1.0);
        let mut builder = TrackBuilder::new(&mut timeline, &s.tree, s.root);

        let track = builder.method_track(s.a).unwrap();
        assert_eq!(builder.selected(), Some(track));
        builder.remove_current_track().unwrap();
        assert_eq!(builder.selected(), None);
        assert_eq!(builder.track_count(), 0);

        let err = builder.insert_method_key(track, 0.5, "jump", vec![]).unwrap_err();
        assert_eq!(err, BuilderError::StaleTrackHandle(0));
        assert!(err.is_precondition());
        assert_eq!(builder.remove_current_track(), Err(BuilderError::NoTrackSelected));
    }

    #[test]
    fn test_remove_then_readd_does_not_report_duplicates() {
        let s = scene();
        let mut timeline = Timeline::new(1.0);
        let mut builder = TrackBuilder::new(&mut timeline, &s.tree, s.root);

        let track = builder.method_track(s.a).unwrap();
        builder.insert_method_key(track, 0.5, "jump", vec![]).unwrap();
        builder.remove_track(track).unwrap();
        assert!(builder.registry().is_empty());

        let readded = builder.method_track(s.a).unwrap();
        assert_eq!(readded.index(), track.index());
        let result = builder.insert_method_key(readded, 0.5, "jump", vec![]).unwrap();
        assert!(result.is_inserted());
        assert_eq!(builder.key_count(readded).unwrap(), 1);
    }

    #[test]
    fn test_removal_forgets_shifted_tracks() {
        let s = scene();
        let mut timeline = Timeline::new(1.0);
        let mut builder = TrackBuilder::new(&mut timeline, &s.tree, s.root);

        let first = builder.method_track(s.a).unwrap();
        let second = builder.value_track(s.b, "visible").unwrap();
        builder.insert_method_key(first, 0.0, "jump", vec![]).unwrap();
        builder.insert_value_key(second, 0.0, true).unwrap();

        builder.remove_track(first).unwrap();
        assert!(builder.registry().tracked_tracks().is_empty());

        let second = builder.value_track(s.b, "visible").unwrap();
        assert_eq!(second.index(), 0);
        assert!(builder.insert_value_key(second, 0.0, true).unwrap().is_inserted());
        assert_eq!(builder.key_count(second).unwrap(), 1);
    }

    #[test]
    fn test_wrong_kind_and_time_range() {
        let s = scene();
        let mut timeline = Timeline::new(1.0);
        let mut builder = TrackBuilder::new(&mut timeline, &s.tree, s.root);
        let track = builder.value_track(s.b, "modulate").unwrap();

        assert_eq!(
            builder.insert_method_key(track, 0.0, "jump", vec![]),
            Err(BuilderError::WrongTrackKind {
                expected: TrackKind::Method,
                found: TrackKind::Value,
            })
        );
        for time in [-0.1, 1.5, f32::NAN] {
            assert!(matches!(
                builder.insert_value_key(track, time, 1.0_f32),
                Err(BuilderError::TimeOutOfRange { .. })
            ));
        }
        assert!(builder.insert_value_key(track, 1.0, 1.0_f32).is_ok());
    }

    #[test]
    fn test_payload_validation() {
        let s = scene();
        let mut timeline = Timeline::new(1.0);
        let mut builder = TrackBuilder::new(&mut timeline, &s.tree, s.root);

        let method = builder.method_track(s.a).unwrap();
        assert!(matches!(
            builder.insert_method_key(method, 0.0, "fly", vec![]),
            Err(BuilderError::MissingMethod { .. })
        ));

        let audio = builder.audio_track(s.music).unwrap();
        assert!(matches!(
            builder.insert_audio_key(audio, 0.0, "", 0.0, 0.0),
            Err(BuilderError::InvalidAudioKey(_))
        ));
        assert!(matches!(
            builder.insert_audio_key(audio, 0.0, "a.ogg", -1.0, 0.0),
            Err(BuilderError::InvalidAudioKey(_))
        ));
        assert_eq!(
            builder.insert_audio_key(audio, 0.0, "a.ogg", 0.0, f32::NAN),
            Err(BuilderError::InvalidAudioKey(
                "end offset NaN is not a finite non-negative number".to_string()
            ))
        );

        let anim = builder.animation_track(s.anim).unwrap();
        assert!(matches!(
            builder.insert_animation_key(anim, 0.0, "run"),
            Err(BuilderError::MissingAnimation { .. })
        ));
        assert!(builder.insert_animation_key(anim, 0.0, "idle").unwrap().is_inserted());
        assert_eq!(builder.timeline().key_count(anim.index()), 1);
    }

    #[test]
    fn test_target_checks() {
        let mut s = scene();
        let island = s.tree.add_node(None, "Island", NodeKind::Node);
        let mut timeline = Timeline::new(1.0);
        let mut builder = TrackBuilder::new(&mut timeline, &s.tree, s.root);

        assert_eq!(builder.method_track(island), Err(BuilderError::UnreachableTarget(island)));
        assert_eq!(
            builder.animation_track(s.a),
            Err(BuilderError::TargetNotAnimationPlayer("A".to_string()))
        );
        assert_eq!(builder.position_track(s.a), Err(BuilderError::TargetNotSpatial("A".to_string())));
        assert_eq!(
            builder.select_or_create(TrackKind::Value, s.b, None, true),
            Err(BuilderError::PropertyRequired(TrackKind::Value))
        );
        assert!(builder.blend_shape_track(s.body, "smile").is_ok());
        assert!(builder.rotation_track(s.body).is_ok());
        assert_eq!(builder.track_count(), 2);
    }

    #[test]
    fn test_transform_and_blend_shape_keys() {
        let s = scene();
        let mut timeline = Timeline::new(2.0);
        let mut builder = TrackBuilder::new(&mut timeline, &s.tree, s.root);

        let position = builder.position_track(s.body).unwrap();
        let rotation = builder.rotation_track(s.body).unwrap();
        let scale = builder.scale_track(s.body).unwrap();
        let smile = builder.blend_shape_track(s.body, "smile").unwrap();

        builder.insert_position_key(position, 0.0, [0.0, 1.0, 0.0]).unwrap();
        builder.insert_rotation_key(rotation, 0.0, [0.0, 0.0, 0.0, 1.0]).unwrap();
        builder.insert_scale_key(scale, 2.0, [2.0, 2.0, 2.0]).unwrap();
        builder.insert_blend_shape_key(smile, 1.0, 0.75).unwrap();
        assert!(!builder.insert_scale_key(scale, 2.0, [2.0, 2.0, 2.0]).unwrap().is_inserted());

        assert_eq!(builder.timeline().track_path(3), Some(NodePath::property("Body", "smile")));
        assert_eq!(builder.registry().len(), 4);
    }

    #[test]
    fn test_configuration() {
        let s = scene();
        let mut timeline = Timeline::new(1.0);
        let mut builder = TrackBuilder::new(&mut timeline, &s.tree, s.root);

        let value = builder.value_track(s.b, "modulate").unwrap();
        builder.set_interpolation(value, InterpolationMode::Cubic).unwrap();
        builder.set_update_mode(value, UpdateMode::Discrete).unwrap();
        builder.set_loop_wrap(value, false).unwrap();

        let method = builder.method_track(s.a).unwrap();
        assert_eq!(
            builder.set_interpolation(method, InterpolationMode::Nearest),
            Err(BuilderError::UnsupportedConfiguration {
                setting: "interpolation",
                kind: TrackKind::Method,
            })
        );
        assert!(builder.set_update_mode(method, UpdateMode::Capture).is_err());
        builder.set_loop_wrap(method, false).unwrap();

        let timeline = builder.timeline();
        assert_eq!(timeline.interpolation(0), Some(InterpolationMode::Cubic));
        assert_eq!(timeline.update_mode(0), Some(UpdateMode::Discrete));
        assert_eq!(timeline.loop_wrap(0), Some(false));
        assert_eq!(timeline.loop_wrap(1), Some(false));
    }

    #[test]
    fn test_new_track_defaults_from_config() {
        let s = scene();
        let mut timeline = Timeline::new(1.0);
        let config = BuilderConfig {
            new_track_interpolation: Some(InterpolationMode::Nearest),
            new_track_update_mode: Some(UpdateMode::Discrete),
            new_track_loop_wrap: Some(false),
            ..Default::default()
        };
        let mut builder = TrackBuilder::new(&mut timeline, &s.tree, s.root).with_config(config);
        builder.value_track(s.b, "modulate").unwrap();
        builder.method_track(s.a).unwrap();

        assert_eq!(timeline.track(0).map(|t| t.interpolation), Some(InterpolationMode::Nearest));
        assert_eq!(timeline.track(0).map(|t| t.update_mode), Some(UpdateMode::Discrete));
        assert_eq!(timeline.track(1).map(|t| t.interpolation), Some(InterpolationMode::Linear));
        assert_eq!(timeline.track(1).map(|t| t.loop_wrap), Some(false));
    }

    #[test]
    fn test_config_disables_reuse() {
        let s = scene();
        let mut timeline = Timeline::new(1.0);
        let config = BuilderConfig {
            reuse_existing_tracks: false,
            ..Default::default()
        };
        let mut builder = TrackBuilder::new(&mut timeline, &s.tree, s.root).with_config(config);
        builder.method_track(s.a).unwrap();
        builder.method_track(s.a).unwrap();
        assert_eq!(builder.track_count(), 2);
    }

    #[test]
    fn test_remove_tracks_for_node() {
        let s = scene();
        let mut timeline = Timeline::new(1.0);
        let mut builder = TrackBuilder::new(&mut timeline, &s.tree, s.root);

        let method = builder.method_track(s.a).unwrap();
        let modulate = builder.value_track(s.b, "modulate").unwrap();
        let visible = builder.value_track(s.b, "visible").unwrap();
        builder.insert_method_key(method, 0.0, "jump", vec![]).unwrap();
        builder.insert_value_key(modulate, 0.0, 1.0_f32).unwrap();
        builder.insert_value_key(visible, 0.0, true).unwrap();

        assert_eq!(builder.remove_tracks_for_node(s.b, TrackKind::Value), Ok(2));
        assert_eq!(builder.track_count(), 1);
        assert_eq!(builder.selected(), None);
        assert_eq!(builder.registry().tracked_tracks(), vec![0]);
        assert_eq!(builder.key_count(method), Err(BuilderError::StaleTrackHandle(0)));

        // Re-adding the removed tracks inserts their keys again.
        let modulate = builder.value_track(s.b, "modulate").unwrap();
        assert!(builder.insert_value_key(modulate, 0.0, 1.0_f32).unwrap().is_inserted());

        assert_eq!(builder.remove_tracks_for_node(s.music, TrackKind::Audio), Ok(0));
    }

    #[test]
    fn test_open_and_create_errors() {
        let s = scene();
        let mut library = TimelineLibrary::new();
        assert!(matches!(
            TrackBuilder::open(&mut library, "missing", &s.tree, s.root),
            Err(BuilderError::TimelineNotFound(_))
        ));
        assert!(matches!(
            TrackBuilder::create(&mut library, "bad", 0.0, &s.tree, s.root),
            Err(BuilderError::InvalidLength(_))
        ));
        TrackBuilder::create(&mut library, "intro", 1.0, &s.tree, s.root).unwrap();
        assert!(matches!(
            TrackBuilder::create(&mut library, "intro", 1.0, &s.tree, s.root),
            Err(BuilderError::TimelineAlreadyExists(_))
        ));
        let builder = TrackBuilder::open(&mut library, "intro", &s.tree, s.root).unwrap();
        assert_eq!(builder.length(), 1.0);
    }

    #[test]
    fn test_new_session_starts_with_empty_registry() {
        let s = scene();
        let mut timeline = Timeline::new(1.0);
        {
            let mut builder = TrackBuilder::new(&mut timeline, &s.tree, s.root);
            let track = builder.method_track(s.a).unwrap();
            builder.insert_method_key(track, 0.5, "jump", vec![]).unwrap();
        }
        let mut builder = TrackBuilder::new(&mut timeline, &s.tree, s.root);
        assert!(builder.registry().is_empty());
        let track = builder.method_track(s.a).unwrap();
        // The store overwrites at the same time, so the key count is stable.
        assert!(builder.insert_method_key(track, 0.5, "jump", vec![]).unwrap().is_inserted());
        assert_eq!(builder.key_count(track).unwrap(), 1);
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Fault {
        DropKeys,
        DropTracks,
        KeepRemovedTracks,
        MangledPaths,
    }

    /// Store that misbehaves on one kind of mutation
    struct FaultyTimeline {
        inner: Timeline,
        fault: Fault,
    }

    impl TimelineStore for FaultyTimeline {
        fn identity(&self) -> crate::timeline::TimelineId {
            self.inner.identity()
        }
        fn length(&self) -> f32 {
            self.inner.length()
        }
        fn set_length(&mut self, length: f32) {
            self.inner.set_length(length);
        }
        fn track_count(&self) -> usize {
            self.inner.track_count()
        }
        fn add_track(&mut self, kind: TrackKind) -> usize {
            if self.fault == Fault::DropTracks {
                return self.inner.track_count();
            }
            self.inner.add_track(kind)
        }
        fn remove_track(&mut self, index: usize) {
            if self.fault != Fault::KeepRemovedTracks {
                self.inner.remove_track(index);
            }
        }
        fn track_kind(&self, index: usize) -> Option<TrackKind> {
            self.inner.track_kind(index)
        }
        fn track_path(&self, index: usize) -> Option<NodePath> {
            self.inner.track_path(index)
        }
        fn set_track_path(&mut self, index: usize, path: NodePath) {
            if self.fault == Fault::MangledPaths {
                self.inner.set_track_path(index, NodePath::node("elsewhere"));
            } else {
                self.inner.set_track_path(index, path);
            }
        }
        fn interpolation(&self, index: usize) -> Option<InterpolationMode> {
            self.inner.interpolation(index)
        }
        fn set_interpolation(&mut self, index: usize, mode: InterpolationMode) {
            self.inner.set_interpolation(index, mode);
        }
        fn update_mode(&self, index: usize) -> Option<UpdateMode> {
            self.inner.update_mode(index)
        }
        fn set_update_mode(&mut self, index: usize, mode: UpdateMode) {
            self.inner.set_update_mode(index, mode);
        }
        fn loop_wrap(&self, index: usize) -> Option<bool> {
            self.inner.loop_wrap(index)
        }
        fn set_loop_wrap(&mut self, index: usize, wrap: bool) {
            self.inner.set_loop_wrap(index, wrap);
        }
        fn insert_key(&mut self, index: usize, time: f32, payload: KeyPayload) -> Option<usize> {
            if self.fault == Fault::DropKeys {
                return Some(0);
            }
            self.inner.insert_key(index, time, payload)
        }
        fn find_key(&self, index: usize, time: f32) -> Option<usize> {
            self.inner.find_key(index, time)
        }
        fn key_count(&self, index: usize) -> usize {
            self.inner.key_count(index)
        }
    }

    fn faulty(fault: Fault) -> FaultyTimeline {
        FaultyTimeline {
            inner: Timeline::new(1.0),
            fault,
        }
    }

    #[test]
    fn test_postcondition_failures() {
        let s = scene();

        let mut store = faulty(Fault::DropTracks);
        let mut builder = TrackBuilder::new(&mut store, &s.tree, s.root);
        let err = builder.method_track(s.a).unwrap_err();
        assert!(matches!(err, BuilderError::TrackCreationFailed(_)));
        assert!(err.is_postcondition());

        let mut store = faulty(Fault::MangledPaths);
        let mut builder = TrackBuilder::new(&mut store, &s.tree, s.root);
        assert!(matches!(builder.method_track(s.a), Err(BuilderError::TrackCreationFailed(_))));

        let mut store = faulty(Fault::DropKeys);
        let mut builder = TrackBuilder::new(&mut store, &s.tree, s.root);
        let track = builder.method_track(s.a).unwrap();
        let err = builder.insert_method_key(track, 0.5, "jump", vec![]).unwrap_err();
        assert!(matches!(err, BuilderError::KeyInsertionFailed(_)));
        assert!(builder.registry().is_empty());

        let mut store = faulty(Fault::KeepRemovedTracks);
        let mut builder = TrackBuilder::new(&mut store, &s.tree, s.root);
        let track = builder.method_track(s.a).unwrap();
        let err = builder.remove_track(track).unwrap_err();
        assert!(matches!(err, BuilderError::TrackRemovalFailed(_)));
        assert_eq!(builder.selected(), None);
    }
}
