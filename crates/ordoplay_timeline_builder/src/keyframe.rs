// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe payloads and per-track playback modes.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Interpolation mode between keyframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum InterpolationMode {
    /// Constant (step)
    Nearest,
    /// Linear interpolation
    #[default]
    Linear,
    /// Cubic interpolation
    Cubic,
    /// Linear interpolation along the shortest angle
    LinearAngle,
    /// Cubic interpolation along the shortest angle
    CubicAngle,
}

/// How a value track pushes its value to the target during playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum UpdateMode {
    /// Update every frame
    #[default]
    Continuous,
    /// Update only when a key is crossed
    Discrete,
    /// Capture the current value and blend from it
    Capture,
}

/// Opaque typed value carried by value keys and method arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Variant {
    /// No value
    #[default]
    Nil,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float value
    Float(f32),
    /// 2D vector
    Vec2([f32; 2]),
    /// 3D vector
    Vec3([f32; 3]),
    /// 4D vector / quaternion
    Vec4([f32; 4]),
    /// Color (RGBA)
    Color([f32; 4]),
    /// String
    String(String),
    /// Array of values
    Array(Vec<Variant>),
}

// Floats hash by bit pattern so that content-equal payloads digest equally.
fn hash_floats<H: Hasher>(values: &[f32], state: &mut H) {
    for v in values {
        v.to_bits().hash(state);
    }
}

impl Hash for Variant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Variant::Nil => {}
            Variant::Bool(v) => v.hash(state),
            Variant::Int(v) => v.hash(state),
            Variant::Float(v) => hash_floats(&[*v], state),
            Variant::Vec2(v) => hash_floats(v, state),
            Variant::Vec3(v) => hash_floats(v, state),
            Variant::Vec4(v) | Variant::Color(v) => hash_floats(v, state),
            Variant::String(v) => v.hash(state),
            Variant::Array(items) => {
                items.len().hash(state);
                for item in items {
                    item.hash(state);
                }
            }
        }
    }
}

impl From<f32> for Variant {
    fn from(value: f32) -> Self {
        Variant::Float(value)
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Variant::Bool(value)
    }
}

impl From<i64> for Variant {
    fn from(value: i64) -> Self {
        Variant::Int(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_string())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::String(value)
    }
}

/// Payload stored in a key; its shape depends on the track kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KeyPayload {
    /// Method call with positional arguments
    Method {
        /// Method name on the target
        method: String,
        /// Positional arguments
        args: Vec<Variant>,
    },
    /// Property value
    Value(Variant),
    /// Position (x, y, z)
    Position([f32; 3]),
    /// Rotation quaternion (x, y, z, w)
    Rotation([f32; 4]),
    /// Scale (x, y, z)
    Scale([f32; 3]),
    /// Blend shape weight
    BlendShape(f32),
    /// Audio clip placement
    Audio {
        /// Stream resource reference
        stream: String,
        /// Offset into the stream where playback starts
        start_offset: f32,
        /// Offset trimmed from the end of the stream
        end_offset: f32,
    },
    /// Playback of another animation
    Animation {
        /// Referenced animation name
        animation: String,
    },
}

impl Hash for KeyPayload {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            KeyPayload::Method { method, args } => {
                method.hash(state);
                args.len().hash(state);
                for arg in args {
                    arg.hash(state);
                }
            }
            KeyPayload::Value(value) => value.hash(state),
            KeyPayload::Position(v) | KeyPayload::Scale(v) => hash_floats(v, state),
            KeyPayload::Rotation(v) => hash_floats(v, state),
            KeyPayload::BlendShape(w) => hash_floats(&[*w], state),
            KeyPayload::Audio {
                stream,
                start_offset,
                end_offset,
            } => {
                stream.hash(state);
                hash_floats(&[*start_offset, *end_offset], state);
            }
            KeyPayload::Animation { animation } => animation.hash(state),
        }
    }
}

impl KeyPayload {
    /// Create a method-call payload
    pub fn method(method: impl Into<String>, args: impl Into<Vec<Variant>>) -> Self {
        KeyPayload::Method {
            method: method.into(),
            args: args.into(),
        }
    }

    /// Create an audio payload
    pub fn audio(stream: impl Into<String>, start_offset: f32, end_offset: f32) -> Self {
        KeyPayload::Audio {
            stream: stream.into(),
            start_offset,
            end_offset,
        }
    }

    /// Create an animation-playback payload
    pub fn animation(animation: impl Into<String>) -> Self {
        KeyPayload::Animation {
            animation: animation.into(),
        }
    }

    /// Get as property value if possible
    pub fn as_value(&self) -> Option<&Variant> {
        match self {
            KeyPayload::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// A key in a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key {
    /// Time in seconds
    pub time: f32,
    /// Payload at this key
    pub payload: KeyPayload,
}

impl Key {
    /// Create a new key
    pub fn new(time: f32, payload: KeyPayload) -> Self {
        Self { time, payload }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_equal_payloads_hash_equal() {
        let a = KeyPayload::method("jump", vec![Variant::Float(2.0), "high".into()]);
        let b = KeyPayload::method("jump", vec![Variant::Float(2.0), "high".into()]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_color_and_vec4_hash_differently() {
        let color = Variant::Color([1.0, 0.0, 0.0, 1.0]);
        let vec = Variant::Vec4([1.0, 0.0, 0.0, 1.0]);
        assert_ne!(hash_of(&color), hash_of(&vec));
    }

    #[test]
    fn test_nested_arrays_hash_by_content() {
        let a = Variant::Array(vec![Variant::Int(1), Variant::Array(vec![Variant::Nil])]);
        let b = Variant::Array(vec![Variant::Array(vec![Variant::Nil]), Variant::Int(1)]);
        assert_ne!(hash_of(&a), hash_of(&b));
        assert_eq!(hash_of(&a), hash_of(&a.clone()));
    }

    #[test]
    fn test_default_modes() {
        assert_eq!(InterpolationMode::default(), InterpolationMode::Linear);
        assert_eq!(UpdateMode::default(), UpdateMode::Continuous);
    }
}
