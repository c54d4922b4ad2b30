// SPDX-License-Identifier: MIT OR Apache-2.0
//! Chainable editing of a single track.

use crate::builder::{KeyInsertion, TrackBuilder, TrackHandle};
use crate::error::Result;
use crate::hierarchy::SceneHierarchy;
use crate::keyframe::{InterpolationMode, UpdateMode, Variant};
use crate::timeline::TimelineStore;

/// Borrowed view of a builder bound to one track handle.
///
/// ```ignore
/// let track = builder.method_track(player)?;
/// builder
///     .edit(track)
///     .method_key(0.0, "spawn", vec![])?
///     .method_key(0.5, "jump", vec![Variant::Float(2.0)])?;
/// ```
pub struct TrackEditor<'b, 'a, S: TimelineStore + ?Sized, H: SceneHierarchy + ?Sized> {
    builder: &'b mut TrackBuilder<'a, S, H>,
    handle: TrackHandle,
    inserted: usize,
    unchanged: usize,
}

impl<'b, 'a, S: TimelineStore + ?Sized, H: SceneHierarchy + ?Sized> TrackEditor<'b, 'a, S, H> {
    pub(crate) fn new(builder: &'b mut TrackBuilder<'a, S, H>, handle: TrackHandle) -> Self {
        Self {
            builder,
            handle,
            inserted: 0,
            unchanged: 0,
        }
    }

    /// Handle of the edited track
    pub fn handle(&self) -> TrackHandle {
        self.handle
    }

    /// Keys written through this editor
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Keys skipped through this editor because they were already present
    pub fn unchanged(&self) -> usize {
        self.unchanged
    }

    fn tally(mut self, outcome: KeyInsertion) -> Self {
        if outcome.is_inserted() {
            self.inserted += 1;
        } else {
            self.unchanged += 1;
        }
        self
    }

    /// Insert a method-call key
    pub fn method_key(self, time: f32, method: &str, args: Vec<Variant>) -> Result<Self> {
        let outcome = self.builder.insert_method_key(self.handle, time, method, args)?;
        Ok(self.tally(outcome))
    }

    /// Insert a property value key
    pub fn value_key(self, time: f32, value: impl Into<Variant>) -> Result<Self> {
        let outcome = self.builder.insert_value_key(self.handle, time, value)?;
        Ok(self.tally(outcome))
    }

    /// Insert a position key
    pub fn position_key(self, time: f32, position: [f32; 3]) -> Result<Self> {
        let outcome = self.builder.insert_position_key(self.handle, time, position)?;
        Ok(self.tally(outcome))
    }

    /// Insert a rotation key
    pub fn rotation_key(self, time: f32, rotation: [f32; 4]) -> Result<Self> {
        let outcome = self.builder.insert_rotation_key(self.handle, time, rotation)?;
        Ok(self.tally(outcome))
    }

    /// Insert a scale key
    pub fn scale_key(self, time: f32, scale: [f32; 3]) -> Result<Self> {
        let outcome = self.builder.insert_scale_key(self.handle, time, scale)?;
        Ok(self.tally(outcome))
    }

    /// Insert a blend shape weight key
    pub fn blend_shape_key(self, time: f32, weight: f32) -> Result<Self> {
        let outcome = self.builder.insert_blend_shape_key(self.handle, time, weight)?;
        Ok(self.tally(outcome))
    }

    /// Insert an audio clip key
    pub fn audio_key(self, time: f32, stream: &str, start_offset: f32, end_offset: f32) -> Result<Self> {
        let outcome = self
            .builder
            .insert_audio_key(self.handle, time, stream, start_offset, end_offset)?;
        Ok(self.tally(outcome))
    }

    /// Insert an animation-playback key
    pub fn animation_key(self, time: f32, animation: &str) -> Result<Self> {
        let outcome = self.builder.insert_animation_key(self.handle, time, animation)?;
        Ok(self.tally(outcome))
    }

    /// Set the interpolation mode
    pub fn interpolation(self, mode: InterpolationMode) -> Result<Self> {
        self.builder.set_interpolation(self.handle, mode)?;
        Ok(self)
    }

    /// Set the update mode
    pub fn update_mode(self, mode: UpdateMode) -> Result<Self> {
        self.builder.set_update_mode(self.handle, mode)?;
        Ok(self)
    }

    /// Set the loop-wrap flag
    pub fn loop_wrap(self, wrap: bool) -> Result<Self> {
        self.builder.set_loop_wrap(self.handle, wrap)?;
        Ok(self)
    }
}
