// SPDX-License-Identifier: MIT OR Apache-2.0
//! Programmatic timeline construction for OrdoPlay.
//!
//! This crate builds animation timelines from code:
//! - Value, transform and blend shape tracks
//! - Method call tracks
//! - Audio and animation playback tracks
//!
//! ## Architecture
//!
//! The builder is built on:
//! - Addresses resolved from a base node through a [`SceneHierarchy`]
//! - Track lookup by address and kind, so tracks are never duplicated
//! - A per-session registry of key digests, so replaying a construction
//!   script never duplicates or churns keys
//! - Postcondition checks on every [`TimelineStore`] mutation
//!
//! ```ignore
//! let mut builder = TrackBuilder::create(&mut library, "intro", 1.0, &scene, root)?;
//! let track = builder.method_track(hero)?;
//! builder.insert_method_key(track, 0.5, "jump", vec![])?;
//! // Same call again: `KeyInsertion::Unchanged`, no duplicate key.
//! builder.insert_method_key(track, 0.5, "jump", vec![])?;
//! ```

pub mod builder;
pub mod config;
pub mod editor;
pub mod error;
pub mod hierarchy;
pub mod key_hash;
pub mod keyframe;
pub mod path;
pub mod script;
pub mod timeline;
pub mod track;
pub mod track_index;

pub use builder::{KeyInsertion, TrackBuilder, TrackHandle};
pub use config::{BuilderConfig, ConfigError};
pub use editor::TrackEditor;
pub use error::{BuilderError, Result};
pub use hierarchy::{NodeCapabilities, NodeId, NodeKind, NodeSpec, SceneHierarchy, SceneTree};
pub use key_hash::{KeyDigest, KeyHashRegistry};
pub use keyframe::{InterpolationMode, Key, KeyPayload, UpdateMode, Variant};
pub use path::{NodePath, PathResolver};
pub use script::{BuildScript, KeyScript, RemovalScript, ScriptReport, TrackScript};
pub use timeline::{LoopMode, Timeline, TimelineId, TimelineLibrary, TimelineStore};
pub use track::{Track, TrackKind};
