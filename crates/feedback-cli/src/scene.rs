//! Synthetic camera input: a light orbiting the frame center on a dark background.

use feedback_core::FrameBuffer;

const BACKGROUND: [f32; 4] = [0.02, 0.02, 0.04, 1.0];

/// Hue cycle for the light, sampled at `t` in [0, 1).
fn light_color(t: f32) -> [f32; 3] {
    let phase = t * std::f32::consts::TAU;
    [
        0.6 + 0.4 * phase.cos(),
        0.6 + 0.4 * (phase - 2.094).cos(),
        0.6 + 0.4 * (phase + 2.094).cos(),
    ]
}

/// Frame `index` of a `period`-frame orbit.
pub fn orbit_frame(width: u32, height: u32, index: u32, period: u32) -> FrameBuffer {
    let mut frame = FrameBuffer::solid(width, height, BACKGROUND);
    let t = (index % period.max(1)) as f32 / period.max(1) as f32;
    let minor = width.min(height) as f32;
    let orbit = minor * 0.3;
    let radius = (minor * 0.06).max(1.0);
    let angle = t * std::f32::consts::TAU;
    let cx = width as f32 * 0.5 + orbit * angle.cos();
    let cy = height as f32 * 0.5 + orbit * angle.sin();
    let [r, g, b] = light_color(t);

    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let d = (dx * dx + dy * dy).sqrt();
            if d <= radius {
                // HDR core, soft falloff to the rim
                let intensity = 2.0 * (1.0 - d / radius) + 0.5;
                frame.set_pixel(x, y, [r * intensity, g * intensity, b * intensity, 1.0]);
            }
        }
    }
    frame
}
