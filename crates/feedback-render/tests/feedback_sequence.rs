//! Whole frame sequences through the effect on the CPU device.

use feedback_core::config::{CompositeStrategy, EffectSettings};
use feedback_core::hash::hash_frames;
use feedback_core::{EffectParameters, FrameBuffer, Viewport};
use feedback_render::{
    CpuDevice, EffectState, FeedbackEffect, FrameOutcome, ImageEffect, ProgramLibrary,
    RenderDevice, TextureDesc,
};

const EPS: f32 = 1e-5;

fn settings(strategy: CompositeStrategy) -> EffectSettings {
    EffectSettings {
        strategy,
        ..Default::default()
    }
}

fn enabled_effect(device: &CpuDevice, strategy: CompositeStrategy) -> FeedbackEffect<CpuDevice> {
    let mut effect = FeedbackEffect::new(device.clone(), &settings(strategy));
    effect.on_enable();
    effect
}

/// Upload `source`, run one update/render pair and read the destination back.
fn render_frame(
    device: &CpuDevice,
    effect: &mut FeedbackEffect<CpuDevice>,
    source: &FrameBuffer,
    params: &EffectParameters,
) -> (FrameOutcome, FrameBuffer) {
    let (w, h) = source.dimensions();
    let src = device.upload(source).unwrap();
    let mut dest = device.create_texture(&TextureDesc::new("camera_target", w, h)).unwrap();
    effect.on_update(params);
    let outcome = effect.on_render(&src, &mut dest, Viewport::new(w, h));
    let out = device.download(&dest).unwrap();
    device.release_texture(src);
    device.release_texture(dest);
    (outcome, out)
}

fn delay_contents(device: &CpuDevice, effect: &FeedbackEffect<CpuDevice>) -> FrameBuffer {
    device
        .download(effect.resources().delay_buffer().expect("delay buffer allocated"))
        .unwrap()
}

fn assert_uniform(frame: &FrameBuffer, expected: [f32; 4]) {
    for px in frame.data.chunks_exact(4) {
        for c in 0..4 {
            assert!(
                (px[c] - expected[c]).abs() < EPS,
                "pixel {:?} differs from {:?}",
                px,
                expected
            );
        }
    }
}

#[test]
fn test_static_white_decays_exponentially_without_drift() {
    let device = CpuDevice::default();
    let mut effect = enabled_effect(&device, CompositeStrategy::RecursiveEcho);
    let white = FrameBuffer::solid(16, 8, [1.0; 4]);
    let params = EffectParameters::default();

    for n in 1..=12 {
        let (outcome, out) = render_frame(&device, &mut effect, &white, &params);
        assert_eq!(outcome, FrameOutcome::Composited);
        let expected = 1.0 - 0.5f32.powi(n);
        assert_uniform(&out, [expected; 4]);
        assert_eq!(delay_contents(&device, &effect), out);
    }
    assert_eq!(effect.stats().allocations, 1);
    assert_eq!(effect.stats().transfers, 12);
}

#[test]
fn test_small_source_accumulates_at_viewport_size() {
    let device = CpuDevice::default();
    let mut effect = enabled_effect(&device, CompositeStrategy::RecursiveEcho);
    let params = EffectParameters::default();
    let viewport = Viewport::new(8, 8);
    let src = device.upload(&FrameBuffer::solid(4, 4, [1.0; 4])).unwrap();
    let mut dest = device.create_texture(&TextureDesc::new("camera_target", 8, 8)).unwrap();

    for n in 1..=5 {
        effect.on_update(&params);
        let outcome = effect.on_render(&src, &mut dest, viewport);
        assert_eq!(outcome, FrameOutcome::Composited);
        let expected = 1.0 - 0.5f32.powi(n);
        assert_uniform(&device.download(&dest).unwrap(), [expected; 4]);
        assert_eq!(effect.resources().delay_dimensions(), Some((8, 8)));
    }
    assert_eq!(effect.stats().allocations, 1);
    assert_eq!(effect.stats().reallocations, 0);

    device.release_texture(src);
    device.release_texture(dest);
}

#[test]
fn test_delay_buffer_follows_recurrence_for_changing_sources() {
    let device = CpuDevice::default();
    let mut effect = enabled_effect(&device, CompositeStrategy::RecursiveEcho);
    let params = EffectParameters::default();

    let mut expected = 0.0f32;
    for n in 0..9 {
        let level = (n % 3) as f32 * 0.25;
        let source = FrameBuffer::solid(8, 8, [level, level, level, 1.0]);
        render_frame(&device, &mut effect, &source, &params);

        expected = level + (expected - level) * 0.5;
        let delay = delay_contents(&device, &effect);
        let px = delay.get_pixel(3, 5).unwrap();
        assert!((px[0] - expected).abs() < EPS, "frame {}: {} vs {}", n, px[0], expected);
    }
}

#[test]
fn test_horizontal_offset_moves_trail_one_pixel_per_frame() {
    let device = CpuDevice::default();
    let mut effect = enabled_effect(&device, CompositeStrategy::RecursiveEcho);
    // 0.05 UV per frame is one pixel on a 20 pixel wide frame.
    let params = EffectParameters {
        offset_x: 1.0,
        jaggies: true,
        ..Default::default()
    };

    let mut spark = FrameBuffer::new(20, 4);
    for y in 0..4 {
        spark.set_pixel(2, y, [1.0, 1.0, 1.0, 1.0]);
    }
    let dark = FrameBuffer::new(20, 4);

    for n in 1..=10u32 {
        let source = if n == 1 { &spark } else { &dark };
        let (_, out) = render_frame(&device, &mut effect, source, &params);
        let column = 1 + n;
        let expected = 0.5f32.powi(n as i32);
        for x in 0..20 {
            let px = out.get_pixel(x, 1).unwrap();
            if x == column {
                assert!((px[0] - expected).abs() < EPS, "frame {}: {:?}", n, px);
            } else {
                assert_eq!(px[0], 0.0, "frame {}: stray value at x={}", n, x);
            }
        }
    }
}

#[test]
fn test_resize_shows_one_empty_feedback_frame() {
    let device = CpuDevice::default();
    let mut effect = enabled_effect(&device, CompositeStrategy::RecursiveEcho);
    let params = EffectParameters::default();

    let small = FrameBuffer::solid(8, 8, [1.0; 4]);
    for _ in 0..3 {
        render_frame(&device, &mut effect, &small, &params);
    }
    assert_uniform(&delay_contents(&device, &effect), [0.875; 4]);

    let large = FrameBuffer::solid(16, 8, [1.0; 4]);
    let (outcome, out) = render_frame(&device, &mut effect, &large, &params);
    assert_eq!(outcome, FrameOutcome::Composited);
    // The reallocated delay buffer is empty, so only the source contributes.
    assert_uniform(&out, [0.5; 4]);
    assert_eq!(effect.resources().delay_dimensions(), Some((16, 8)));

    let (_, out) = render_frame(&device, &mut effect, &large, &params);
    assert_uniform(&out, [0.75; 4]);

    let stats = effect.stats();
    assert_eq!(stats.reallocations, 1);
    assert_eq!(stats.allocations, 2);
}

#[test]
fn test_double_blit_records_source_only() {
    let device = CpuDevice::default();
    let mut effect = enabled_effect(&device, CompositeStrategy::DoubleBlit);
    let params = EffectParameters {
        rotation_degrees: 3.0,
        ..Default::default()
    };

    for n in 0..4 {
        let level = 0.2 * n as f32;
        let source = FrameBuffer::solid(6, 6, [level, 0.5, 1.0, 1.0]);
        let (outcome, out) = render_frame(&device, &mut effect, &source, &params);
        assert_eq!(outcome, FrameOutcome::Composited);
        assert_eq!(out, source);
        assert_eq!(delay_contents(&device, &effect), source);
    }
    assert_eq!(device.stats().blend_invocations, 0);
}

#[test]
fn test_command_list_matches_echo_color() {
    let echo_device = CpuDevice::default();
    let mut echo = enabled_effect(&echo_device, CompositeStrategy::RecursiveEcho);
    let list_device = CpuDevice::default();
    let mut list = enabled_effect(&list_device, CompositeStrategy::CommandList);
    let params = EffectParameters::default();

    for n in 0..6 {
        let level = [0.9, 0.1, 0.4][n % 3];
        let source = FrameBuffer::solid(8, 4, [level, 1.0 - level, 0.5, 1.0]);
        let (_, a) = render_frame(&echo_device, &mut echo, &source, &params);
        let (_, b) = render_frame(&list_device, &mut list, &source, &params);
        for (pa, pb) in a.data.chunks_exact(4).zip(b.data.chunks_exact(4)) {
            for c in 0..3 {
                assert!((pa[c] - pb[c]).abs() < EPS);
            }
            // The overlay keeps the camera target's alpha.
            assert_eq!(pb[3], 1.0);
        }
    }
    assert_eq!(list.stats().commands_recorded, 1);
}

#[test]
fn test_command_list_rerecords_after_resize_and_filter_change() {
    let device = CpuDevice::default();
    let mut effect = enabled_effect(&device, CompositeStrategy::CommandList);
    let smooth = EffectParameters::default();
    let jagged = EffectParameters {
        jaggies: true,
        ..Default::default()
    };

    let small = FrameBuffer::solid(8, 8, [1.0; 4]);
    let large = FrameBuffer::solid(12, 8, [1.0; 4]);
    render_frame(&device, &mut effect, &small, &smooth);
    render_frame(&device, &mut effect, &small, &smooth);
    assert_eq!(effect.stats().commands_recorded, 1);

    render_frame(&device, &mut effect, &large, &smooth);
    assert_eq!(effect.stats().commands_recorded, 2);
    assert_eq!(effect.stats().command_invalidations, 1);

    render_frame(&device, &mut effect, &large, &jagged);
    assert_eq!(effect.stats().commands_recorded, 3);
    render_frame(&device, &mut effect, &large, &jagged);
    assert_eq!(effect.stats().commands_recorded, 3);

    let bound = effect.resources().command().unwrap().bound_texture();
    let delay = effect.resources().delay_buffer().unwrap();
    assert_eq!(bound, feedback_render::TextureHandle::id(delay));

    effect.on_disable();
    let stats = device.stats();
    assert_eq!(stats.live_commands(), 0);
    assert_eq!(stats.live_textures(), 0);
}

#[test]
fn test_allocation_failure_disables_effect() {
    let device = CpuDevice::default();
    let mut effect = enabled_effect(&device, CompositeStrategy::RecursiveEcho);
    let params = EffectParameters::default();
    let source = FrameBuffer::solid(4, 4, [0.25, 0.5, 0.75, 1.0]);

    render_frame(&device, &mut effect, &source, &params);
    // source and camera target succeed, the echo target fails
    device.fail_allocation_after(2);
    let (outcome, out) = render_frame(&device, &mut effect, &source, &params);
    assert_eq!(outcome, FrameOutcome::Passthrough);
    assert_eq!(out, source);
    assert!(matches!(effect.state(), EffectState::Faulted(_)));

    let stats = device.stats();
    assert_eq!(stats.live_textures(), 0);
    assert_eq!(stats.live_programs(), 0);

    // Stays in passthrough and allocates nothing until re-enabled.
    let (outcome, _) = render_frame(&device, &mut effect, &source, &params);
    assert_eq!(outcome, FrameOutcome::Passthrough);
    assert!(!effect.resources().is_ready());

    effect.on_enable();
    let (outcome, _) = render_frame(&device, &mut effect, &source, &params);
    assert_eq!(outcome, FrameOutcome::Composited);
}

#[test]
fn test_memory_budget_exhaustion_is_fatal() {
    let device = CpuDevice::default();
    let mut effect = enabled_effect(&device, CompositeStrategy::RecursiveEcho);
    // Room for the source, the camera target and the delay buffer, not the echo target.
    device.set_memory_budget(Some(3 * 4 * 4 * 16));
    let source = FrameBuffer::solid(4, 4, [1.0; 4]);

    let (outcome, out) = render_frame(&device, &mut effect, &source, &EffectParameters::default());
    assert_eq!(outcome, FrameOutcome::Passthrough);
    assert_eq!(out, source);
    assert!(matches!(effect.state(), EffectState::Faulted(_)));
    assert_eq!(device.stats().live_texture_bytes, 0);
}

#[test]
fn test_missing_program_passes_through() {
    let device = CpuDevice::new(ProgramLibrary::empty());
    let mut effect = enabled_effect(&device, CompositeStrategy::RecursiveEcho);
    let source = FrameBuffer::solid(4, 4, [0.3, 0.3, 0.3, 1.0]);

    let (outcome, out) = render_frame(&device, &mut effect, &source, &EffectParameters::default());
    assert_eq!(outcome, FrameOutcome::Passthrough);
    assert_eq!(out, source);
    match effect.state() {
        EffectState::Faulted(reason) => assert!(reason.contains("feedback")),
        other => panic!("expected a fault, got {:?}", other),
    }
    assert_eq!(device.stats().live_textures(), 0);
}

#[test]
fn test_disable_twice_then_drop_releases_everything() {
    let device = CpuDevice::default();
    let mut effect = enabled_effect(&device, CompositeStrategy::CommandList);
    let source = FrameBuffer::solid(4, 4, [1.0; 4]);
    render_frame(&device, &mut effect, &source, &EffectParameters::default());

    effect.on_disable();
    effect.on_disable();
    assert!(effect.resources().delay_buffer().is_none());
    assert!(effect.resources().command().is_none());
    assert_eq!(effect.stats().releases, 1);

    let (outcome, out) = render_frame(&device, &mut effect, &source, &EffectParameters::default());
    assert_eq!(outcome, FrameOutcome::Passthrough);
    assert_eq!(out, source);

    effect.on_enable();
    render_frame(&device, &mut effect, &source, &EffectParameters::default());
    drop(effect);
    let stats = device.stats();
    assert_eq!(stats.live_textures(), 0);
    assert_eq!(stats.live_programs(), 0);
    assert_eq!(stats.live_commands(), 0);
}

#[test]
fn test_reload_switches_strategy() {
    let device = CpuDevice::default();
    let mut effect = enabled_effect(&device, CompositeStrategy::RecursiveEcho);
    let source = FrameBuffer::solid(4, 4, [1.0; 4]);
    render_frame(&device, &mut effect, &source, &EffectParameters::default());

    effect.reload(&settings(CompositeStrategy::DoubleBlit));
    assert!(!effect.resources().is_ready());
    let (_, out) = render_frame(&device, &mut effect, &source, &EffectParameters::default());
    assert_eq!(out, source);
    assert_eq!(effect.compositor().strategy(), CompositeStrategy::DoubleBlit);
}

#[test]
fn test_sequences_hash_identically() {
    let run = || {
        let device = CpuDevice::default();
        let mut effect = enabled_effect(&device, CompositeStrategy::RecursiveEcho);
        let params = EffectParameters {
            offset_x: 0.4,
            offset_y: -0.2,
            rotation_degrees: 2.5,
            scale: 1.03,
            ..Default::default()
        };
        let mut frames = Vec::new();
        for n in 0..5 {
            let mut source = FrameBuffer::new(24, 16);
            source.set_pixel(4 + n, 8, [1.0, 0.5, 0.25, 1.0]);
            frames.push(render_frame(&device, &mut effect, &source, &params).1);
        }
        hash_frames(&frames)
    };
    assert_eq!(run(), run());
}
