// SPDX-License-Identifier: MIT OR Apache-2.0
//! Builder error types.
//!
//! Errors fall into two classes. Precondition violations are caller
//! mistakes in a construction script. Postcondition violations mean the
//! timeline store did not react to a mutation the way it promised and are
//! internal-consistency failures. Neither class is ever retried.

use crate::hierarchy::NodeId;
use crate::track::TrackKind;

/// Result type for builder operations
pub type Result<T> = std::result::Result<T, BuilderError>;

/// Error raised by the timeline builder
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuilderError {
    /// Target node is not a live instance
    #[error("Invalid target: {0:?} is not a live node")]
    InvalidTarget(NodeId),

    /// No hierarchy relation exists between base and target
    #[error("Target {0:?} is unreachable from the builder base")]
    UnreachableTarget(NodeId),

    /// Property name is empty
    #[error("Property name must not be empty")]
    EmptyPropertyName,

    /// Property name contains separators or starts with a member marker
    #[error("Malformed property name: {0:?}")]
    MalformedPropertyName(String),

    /// Property is not a readable member of the target
    #[error("Property {property:?} not found on {target}")]
    MissingProperty {
        /// Target address
        target: String,
        /// Requested property
        property: String,
    },

    /// Track kind needs a property but none was given
    #[error("{0:?} tracks require a property name")]
    PropertyRequired(TrackKind),

    /// Method is not callable on the target
    #[error("Method {method:?} not found on {target}")]
    MissingMethod {
        /// Target address
        target: String,
        /// Requested method
        method: String,
    },

    /// Animation is not present on the target player
    #[error("Animation {animation:?} not found on {target}")]
    MissingAnimation {
        /// Target address
        target: String,
        /// Requested animation
        animation: String,
    },

    /// Audio tracks need an audio player target
    #[error("{0} is not an audio player")]
    TargetNotAudioPlayer(String),

    /// Animation tracks need an animation player target
    #[error("{0} is not an animation player")]
    TargetNotAnimationPlayer(String),

    /// Transform tracks need a spatial target
    #[error("{0} is not a spatial node")]
    TargetNotSpatial(String),

    /// Blend shape tracks need a mesh target
    #[error("{0} is not a mesh instance")]
    TargetNotMesh(String),

    /// Operation does not apply to the handle's track kind
    #[error("Wrong track kind: expected {expected:?}, found {found:?}")]
    WrongTrackKind {
        /// Kind the operation needs
        expected: TrackKind,
        /// Kind of the given track
        found: TrackKind,
    },

    /// Handle was issued before a track removal renumbered the timeline
    #[error("Track handle for index {0} is stale")]
    StaleTrackHandle(usize),

    /// No track is selected
    #[error("No track selected")]
    NoTrackSelected,

    /// Key time is negative, not finite, or past the timeline length
    #[error("Time {time} is outside the timeline range [0, {length}]")]
    TimeOutOfRange {
        /// Requested time
        time: f32,
        /// Timeline length
        length: f32,
    },

    /// Audio key has an empty stream or bad offsets
    #[error("Invalid audio key: {0}")]
    InvalidAudioKey(String),

    /// Configuration is not supported by the track kind
    #[error("{setting} is not supported on {kind:?} tracks")]
    UnsupportedConfiguration {
        /// Setting being applied
        setting: &'static str,
        /// Track kind
        kind: TrackKind,
    },

    /// Timeline length is not a positive finite number
    #[error("Invalid timeline length: {0}")]
    InvalidLength(f32),

    /// Named timeline does not exist
    #[error("Timeline not found: {0}")]
    TimelineNotFound(String),

    /// Named timeline already exists
    #[error("Timeline already exists: {0}")]
    TimelineAlreadyExists(String),

    /// Script path does not resolve to a node
    #[error("No node at {0:?}")]
    UnresolvedNode(String),

    /// Track was not created as requested
    #[error("Track creation failed: {0}")]
    TrackCreationFailed(String),

    /// Key was not inserted as requested
    #[error("Key insertion failed: {0}")]
    KeyInsertionFailed(String),

    /// Track was not removed as requested
    #[error("Track removal failed: {0}")]
    TrackRemovalFailed(String),
}

impl BuilderError {
    /// Whether the store broke an invariant after a mutation
    pub fn is_postcondition(&self) -> bool {
        matches!(
            self,
            Self::TrackCreationFailed(_) | Self::KeyInsertionFailed(_) | Self::TrackRemovalFailed(_)
        )
    }

    /// Whether the caller violated a precondition
    pub fn is_precondition(&self) -> bool {
        !self.is_postcondition()
    }
}
