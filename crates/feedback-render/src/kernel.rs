//! CPU implementation of the feedback blend.
//!
//! Matches the WGSL program in `feedback.wgsl`: pixel centers map to
//! `uv = (x + 0.5) / width`, feedback reads outside [0, 1] are transparent
//! black, and bilinear reads clamp to the edge texel.

use rayon::prelude::*;

use feedback_core::frame::CHANNELS;
use feedback_core::{FilterMode, FrameBuffer, Uniforms};

#[inline]
fn texel(tex: &FrameBuffer, x: i64, y: i64) -> [f32; 4] {
    let x = x.clamp(0, tex.width as i64 - 1) as usize;
    let y = y.clamp(0, tex.height as i64 - 1) as usize;
    let offset = (y * tex.width as usize + x) * CHANNELS;
    [
        tex.data[offset],
        tex.data[offset + 1],
        tex.data[offset + 2],
        tex.data[offset + 3],
    ]
}

#[inline]
fn lerp4(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
        a[3] + (b[3] - a[3]) * t,
    ]
}

/// Sample `tex` at `uv`. Reads outside the unit square return zero.
pub fn sample(tex: &FrameBuffer, uv: [f32; 2], filter: FilterMode) -> [f32; 4] {
    let [u, v] = uv;
    if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) || tex.pixel_count() == 0 {
        return [0.0; 4];
    }
    let w = tex.width as f32;
    let h = tex.height as f32;
    match filter {
        FilterMode::Point => texel(tex, (u * w).floor() as i64, (v * h).floor() as i64),
        FilterMode::Bilinear => {
            let fx = u * w - 0.5;
            let fy = v * h - 0.5;
            let x0 = fx.floor();
            let y0 = fy.floor();
            let tx = fx - x0;
            let ty = fy - y0;
            let (x0, y0) = (x0 as i64, y0 as i64);
            let top = lerp4(texel(tex, x0, y0), texel(tex, x0 + 1, y0), tx);
            let bottom = lerp4(texel(tex, x0, y0 + 1), texel(tex, x0 + 1, y0 + 1), tx);
            lerp4(top, bottom, ty)
        }
    }
}

/// Nearest read of `src` for destination pixel `(x, y)` of a `dst_w`x`dst_h` target.
#[inline]
fn source_at(src: &FrameBuffer, x: u32, y: u32, dst_w: u32, dst_h: u32) -> [f32; 4] {
    if src.pixel_count() == 0 {
        return [0.0; 4];
    }
    if src.width == dst_w && src.height == dst_h {
        return texel(src, x as i64, y as i64);
    }
    let sx = ((x as f32 + 0.5) / dst_w as f32 * src.width as f32).floor() as i64;
    let sy = ((y as f32 + 0.5) / dst_h as f32 * src.height as f32).floor() as i64;
    texel(src, sx, sy)
}

/// Transformed, tinted feedback sample for destination pixel `(x, y)`.
#[inline]
fn feedback_at(
    feedback: &FrameBuffer,
    filter: FilterMode,
    uniforms: &Uniforms,
    x: u32,
    y: u32,
    dst_w: u32,
    dst_h: u32,
) -> [f32; 4] {
    let uv = [(x as f32 + 0.5) / dst_w as f32, (y as f32 + 0.5) / dst_h as f32];
    let s = sample(feedback, uniforms.feedback_uv(uv), filter);
    let tint = uniforms.color.to_array();
    [s[0] * tint[0], s[1] * tint[1], s[2] * tint[2], s[3] * tint[3]]
}

fn for_each_pixel<F>(target: &mut FrameBuffer, shade: F)
where
    F: Fn(u32, u32, &mut [f32]) + Sync,
{
    let width = target.width;
    let row_len = width as usize * CHANNELS;
    if row_len == 0 {
        return;
    }
    target
        .data
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(CHANNELS).enumerate() {
                shade(x as u32, y as u32, px);
            }
        });
}

/// `target = mix(source, feedback * color, persistence)` on all four channels.
pub fn blend(
    source: &FrameBuffer,
    feedback: &FrameBuffer,
    filter: FilterMode,
    uniforms: &Uniforms,
    persistence: f32,
    target: &mut FrameBuffer,
) {
    let (w, h) = target.dimensions();
    for_each_pixel(target, |x, y, px| {
        let src = source_at(source, x, y, w, h);
        let fb = feedback_at(feedback, filter, uniforms, x, y, w, h);
        px.copy_from_slice(&lerp4(src, fb, persistence));
    });
}

/// Draw the transformed feedback over `target`, keeping its alpha:
/// `target.rgb = mix(target.rgb, feedback.rgb * color.rgb, persistence)`.
pub fn overlay(
    feedback: &FrameBuffer,
    filter: FilterMode,
    uniforms: &Uniforms,
    persistence: f32,
    target: &mut FrameBuffer,
) {
    let (w, h) = target.dimensions();
    for_each_pixel(target, |x, y, px| {
        let fb = feedback_at(feedback, filter, uniforms, x, y, w, h);
        for c in 0..3 {
            px[c] += (fb[c] - px[c]) * persistence;
        }
    });
}

/// Copy `src` into `dst`, nearest-resampling when sizes differ.
pub fn copy(src: &FrameBuffer, dst: &mut FrameBuffer) {
    if src.pixel_count() == 0 {
        dst.data.fill(0.0);
        return;
    }
    if src.dimensions() == dst.dimensions() {
        dst.data.copy_from_slice(&src.data);
        return;
    }
    let (w, h) = dst.dimensions();
    for_each_pixel(dst, |x, y, px| {
        px.copy_from_slice(&source_at(src, x, y, w, h));
    });
}
