//! Parameter translation: user controls to blend-program uniforms.
//!
//! The feedback sample for a destination pixel at `uv` is read from the
//! delay buffer at
//!
//! ```text
//! rotation * (uv - 0.5) * scale + 0.5 + offset
//! ```
//!
//! so every uniform here describes where the *previous* frame is read from,
//! which is why offset and rotation are negated relative to the controls.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::params::EffectParameters;

/// Multiplier mapping the [-1, 1] offset control to a UV nudge.
pub const OFFSET_SCALE: f32 = -0.05;

/// Names of the uniforms every blend program accepts.
pub const UNIFORM_NAMES: [&str; 4] = ["color", "offset", "rotation", "scale"];

/// Sampling mode of the delay buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Nearest-texel sampling ("jaggies").
    Point,
    #[default]
    Bilinear,
}

/// Uniform values consumed by the blend program for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Uniforms {
    /// RGBA tint.
    pub color: Color,
    /// UV offset applied after rotation and scale.
    pub offset: [f32; 2],
    /// Row-major 2x2 rotation `[m00, m01, m10, m11]`.
    pub rotation: [f32; 4],
    /// UV scale around the frame center.
    pub scale: f32,
    /// Not a uniform: applied to the delay buffer's sampler.
    #[serde(skip)]
    pub filter_mode: FilterMode,
}

impl Default for Uniforms {
    fn default() -> Self {
        translate(&EffectParameters::default())
    }
}

/// Rotation matrix for the feedback sample.
///
/// The angle is negated because the sample position moves opposite to the
/// visible rotation of the trail.
pub fn rotation_matrix(degrees: f32) -> [f32; 4] {
    let angle = -degrees.to_radians();
    let (sin, cos) = angle.sin_cos();
    [cos, sin, -sin, cos]
}

pub fn offset_vector(offset_x: f32, offset_y: f32) -> [f32; 2] {
    [offset_x * OFFSET_SCALE, offset_y * OFFSET_SCALE]
}

/// UV scale for a scale control: increasing the control zooms the trail out.
pub fn scale_factor(scale: f32) -> f32 {
    2.0 - scale
}

pub fn filter_mode(jaggies: bool) -> FilterMode {
    if jaggies {
        FilterMode::Point
    } else {
        FilterMode::Bilinear
    }
}

/// Translate user controls into blend uniforms.
pub fn translate(params: &EffectParameters) -> Uniforms {
    Uniforms {
        color: params.color,
        offset: offset_vector(params.offset_x, params.offset_y),
        rotation: rotation_matrix(params.rotation_degrees),
        scale: scale_factor(params.scale),
        filter_mode: filter_mode(params.jaggies),
    }
}

impl Uniforms {
    /// Map a destination UV to the UV sampled from the delay buffer.
    pub fn feedback_uv(&self, uv: [f32; 2]) -> [f32; 2] {
        let [m00, m01, m10, m11] = self.rotation;
        let cx = uv[0] - 0.5;
        let cy = uv[1] - 0.5;
        [
            (m00 * cx + m01 * cy) * self.scale + 0.5 + self.offset[0],
            (m10 * cx + m11 * cy) * self.scale + 0.5 + self.offset[1],
        ]
    }

    /// Uniforms as a name → value map, in contract order.
    pub fn to_named(&self) -> Vec<(&'static str, Vec<f32>)> {
        vec![
            (UNIFORM_NAMES[0], self.color.to_array().to_vec()),
            (UNIFORM_NAMES[1], self.offset.to_vec()),
            (UNIFORM_NAMES[2], self.rotation.to_vec()),
            (UNIFORM_NAMES[3], vec![self.scale]),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    fn params(rotation: f32, scale: f32) -> EffectParameters {
        EffectParameters {
            rotation_degrees: rotation,
            scale,
            ..Default::default()
        }
    }

    #[test]
    fn test_rotation_matrix_is_orthonormal() {
        let mut deg = -180.0f32;
        while deg <= 180.0 {
            let [m00, m01, m10, m11] = rotation_matrix(deg);
            let det = m00 * m11 - m01 * m10;
            assert!((det - 1.0).abs() < 1e-5, "det {} at {}", det, deg);
            assert!(((m00 * m00 + m10 * m10).sqrt() - 1.0).abs() < 1e-5);
            assert!(((m01 * m01 + m11 * m11).sqrt() - 1.0).abs() < 1e-5);
            assert!((m00 * m01 + m10 * m11).abs() < 1e-5);
            deg += 0.25;
        }
    }

    #[test]
    fn test_rotation_matrix_sign_convention() {
        let [cos, sin, neg_sin, cos2] = rotation_matrix(90.0);
        assert!(cos.abs() < EPS && cos2.abs() < EPS);
        assert!((sin + 1.0).abs() < EPS);
        assert!((neg_sin - 1.0).abs() < EPS);
        assert_eq!(rotation_matrix(0.0)[0], 1.0);
    }

    #[test]
    fn test_offset_vector() {
        assert_eq!(offset_vector(1.0, 0.0), [-0.05, 0.0]);
        assert_eq!(offset_vector(-1.0, 0.5), [0.05, -0.025]);
    }

    #[test]
    fn test_scale_factor() {
        assert_eq!(scale_factor(1.0), 1.0);
        assert!((scale_factor(1.05) - 0.95).abs() < EPS);
        assert!((scale_factor(0.95) - 1.05).abs() < EPS);
        let mut prev = scale_factor(0.95);
        for i in 1..=100 {
            let next = scale_factor(0.95 + 0.001 * i as f32);
            assert!(next < prev);
            prev = next;
        }
    }

    #[test]
    fn test_filter_mode() {
        assert_eq!(filter_mode(true), FilterMode::Point);
        assert_eq!(filter_mode(false), FilterMode::Bilinear);
    }

    #[test]
    fn test_translate_is_pure() {
        let p = EffectParameters {
            color: Color::rgba(0.9, 0.8, 0.7, 1.0),
            offset_x: 0.3,
            offset_y: -0.6,
            rotation_degrees: 2.5,
            scale: 1.02,
            jaggies: true,
        };
        let a = translate(&p);
        let b = translate(&p);
        assert_eq!(a, b);
        assert_eq!(a.color, p.color);
        assert_eq!(a.filter_mode, FilterMode::Point);
    }

    #[test]
    fn test_identity_feedback_uv() {
        let u = translate(&EffectParameters::default());
        for uv in [[0.0, 0.0], [0.25, 0.75], [1.0, 1.0]] {
            let f = u.feedback_uv(uv);
            assert!((f[0] - uv[0]).abs() < EPS && (f[1] - uv[1]).abs() < EPS);
        }
    }

    #[test]
    fn test_feedback_uv_center_is_fixed_under_rotation_and_scale() {
        let u = translate(&params(4.0, 1.04));
        let f = u.feedback_uv([0.5, 0.5]);
        assert!((f[0] - 0.5).abs() < EPS && (f[1] - 0.5).abs() < EPS);
    }

    #[test]
    fn test_feedback_uv_offset() {
        let u = translate(&EffectParameters {
            offset_x: 1.0,
            ..Default::default()
        });
        let f = u.feedback_uv([0.5, 0.5]);
        assert!((f[0] - 0.45).abs() < EPS);
        assert!((f[1] - 0.5).abs() < EPS);
    }

    #[test]
    fn test_named_uniforms_contract() {
        let named = Uniforms::default().to_named();
        let names: Vec<_> = named.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, UNIFORM_NAMES);
        assert_eq!(named[0].1.len(), 4);
        assert_eq!(named[1].1.len(), 2);
        assert_eq!(named[2].1.len(), 4);
        assert_eq!(named[3].1, vec![1.0]);
    }
}
