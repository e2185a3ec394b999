use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::{FeedbackError, FeedbackResult};

/// Inclusive range a user-facing control is declared to accept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
}

impl ParamRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

pub const OFFSET_RANGE: ParamRange = ParamRange::new(-1.0, 1.0);
pub const ROTATION_RANGE: ParamRange = ParamRange::new(-5.0, 5.0);
pub const SCALE_RANGE: ParamRange = ParamRange::new(0.95, 1.05);

/// User-facing controls of the feedback effect.
///
/// Supplied by the host (editor UI or config) every frame; the effect only
/// reads them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectParameters {
    /// Tint multiplied into the feedback sample.
    pub color: Color,
    /// Horizontal feedback offset.
    pub offset_x: f32,
    /// Vertical feedback offset.
    pub offset_y: f32,
    /// Center-axis rotation of the feedback, in degrees.
    pub rotation_degrees: f32,
    /// Scale of the feedback. Larger values zoom the trail out.
    pub scale: f32,
    /// Point-sample the delay buffer instead of bilinear filtering.
    pub jaggies: bool,
}

impl Default for EffectParameters {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            offset_x: 0.0,
            offset_y: 0.0,
            rotation_degrees: 0.0,
            scale: 1.0,
            jaggies: false,
        }
    }
}

impl EffectParameters {
    fn ranged(&self) -> [(&'static str, f32, ParamRange); 4] {
        [
            ("offset_x", self.offset_x, OFFSET_RANGE),
            ("offset_y", self.offset_y, OFFSET_RANGE),
            ("rotation_degrees", self.rotation_degrees, ROTATION_RANGE),
            ("scale", self.scale, SCALE_RANGE),
        ]
    }

    /// Check every ranged control, reporting the first one out of range.
    pub fn validate(&self) -> FeedbackResult<()> {
        for (name, value, range) in self.ranged() {
            if !range.contains(value) {
                return Err(FeedbackError::InvalidParameter {
                    name,
                    value,
                    min: range.min,
                    max: range.max,
                });
            }
        }
        Ok(())
    }

    /// Copy with every ranged control clamped into its declared range.
    /// NaN controls fall back to their defaults.
    pub fn clamped(&self) -> Self {
        let defaults = Self::default();
        let fix = |value: f32, fallback: f32, range: ParamRange| {
            if value.is_nan() {
                fallback
            } else {
                range.clamp(value)
            }
        };
        Self {
            color: self.color,
            offset_x: fix(self.offset_x, defaults.offset_x, OFFSET_RANGE),
            offset_y: fix(self.offset_y, defaults.offset_y, OFFSET_RANGE),
            rotation_degrees: fix(self.rotation_degrees, defaults.rotation_degrees, ROTATION_RANGE),
            scale: fix(self.scale, defaults.scale, SCALE_RANGE),
            jaggies: self.jaggies,
        }
    }
}
