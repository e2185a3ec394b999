//! Host lifecycle of the feedback effect.

use feedback_core::config::EffectSettings;
use feedback_core::{EffectParameters, FeedbackError, Viewport};

use crate::compositor::FrameCompositor;
use crate::device::RenderDevice;
use crate::resources::{ResourceManager, ResourceStats};

/// What ended up in the destination after a render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The feedback composite.
    Composited,
    /// The unmodified source.
    Passthrough,
}

/// Hooks a host engine calls on a per-camera image effect.
///
/// Per frame the host calls [`on_update`](Self::on_update) and then
/// [`on_render`](Self::on_render). The effect never schedules itself.
pub trait ImageEffect {
    type Texture;

    fn on_enable(&mut self);

    fn on_disable(&mut self);

    fn on_update(&mut self, params: &EffectParameters);

    /// Leave the composited image, or the source, in `destination`.
    fn on_render(
        &mut self,
        source: &Self::Texture,
        destination: &mut Self::Texture,
        viewport: Viewport,
    ) -> FrameOutcome;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectState {
    Disabled,
    Enabled,
    /// Disabled by a fatal error until the next `on_enable`.
    Faulted(String),
}

/// The frame-echo effect for one camera.
pub struct FeedbackEffect<D: RenderDevice> {
    resources: ResourceManager<D>,
    compositor: FrameCompositor,
    params: EffectParameters,
    state: EffectState,
    frames: u64,
}

impl<D: RenderDevice> FeedbackEffect<D> {
    /// Create a disabled effect. Nothing is allocated until the first rendered frame.
    pub fn new(device: D, settings: &EffectSettings) -> Self {
        Self {
            resources: ResourceManager::new(device, settings.program.clone()),
            compositor: FrameCompositor::from_settings(settings),
            params: EffectParameters::default(),
            state: EffectState::Disabled,
            frames: 0,
        }
    }

    pub fn state(&self) -> &EffectState {
        &self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state == EffectState::Enabled
    }

    pub fn parameters(&self) -> &EffectParameters {
        &self.params
    }

    pub fn compositor(&self) -> &FrameCompositor {
        &self.compositor
    }

    pub fn resources(&self) -> &ResourceManager<D> {
        &self.resources
    }

    pub fn stats(&self) -> ResourceStats {
        self.resources.stats()
    }

    /// Frames composited since creation.
    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn device(&self) -> &D {
        self.resources.device()
    }

    /// Apply new settings. Everything allocated so far is released.
    pub fn reload(&mut self, settings: &EffectSettings) {
        self.resources.release_all();
        self.resources.set_program(&settings.program);
        self.compositor = FrameCompositor::from_settings(settings);
        tracing::info!(
            "feedback effect reloaded: strategy {}, program '{}'",
            settings.strategy,
            settings.program
        );
    }

    fn passthrough(&self, source: &D::Texture, destination: &mut D::Texture) -> FrameOutcome {
        if let Err(e) = self.resources.device().blit(source, destination) {
            tracing::error!("passthrough copy failed: {}", e);
        }
        FrameOutcome::Passthrough
    }

    fn fault(&mut self, error: &FeedbackError) {
        tracing::error!("feedback effect disabled: {}", error);
        self.resources.release_all();
        self.state = EffectState::Faulted(error.to_string());
    }
}

impl<D: RenderDevice> ImageEffect for FeedbackEffect<D> {
    type Texture = D::Texture;

    fn on_enable(&mut self) {
        if let EffectState::Faulted(reason) = &self.state {
            tracing::info!("re-enabling feedback effect after fault: {}", reason);
        } else {
            tracing::info!("feedback effect enabled ({})", self.compositor.strategy());
        }
        self.state = EffectState::Enabled;
    }

    fn on_disable(&mut self) {
        if self.state == EffectState::Enabled {
            tracing::info!("feedback effect disabled");
        }
        self.resources.release_all();
        self.state = EffectState::Disabled;
    }

    fn on_update(&mut self, params: &EffectParameters) {
        self.params = match params.validate() {
            Ok(()) => *params,
            Err(e) => {
                tracing::warn!("{}; clamping", e);
                params.clamped()
            }
        };
    }

    fn on_render(
        &mut self,
        source: &D::Texture,
        destination: &mut D::Texture,
        viewport: Viewport,
    ) -> FrameOutcome {
        if !self.is_enabled() || viewport.is_empty() {
            return self.passthrough(source, destination);
        }

        match self.compositor.composite(
            &mut self.resources,
            &self.params,
            source,
            destination,
            viewport,
        ) {
            Ok(()) => {
                self.frames += 1;
                FrameOutcome::Composited
            }
            Err(e) if e.is_fatal() => {
                self.fault(&e);
                self.passthrough(source, destination)
            }
            Err(e) => {
                tracing::warn!("feedback frame skipped: {}", e);
                self.passthrough(source, destination)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuDevice;
    use crate::device::{ProgramLibrary, TextureDesc};
    use feedback_core::FrameBuffer;

    fn textures(device: &CpuDevice, w: u32, h: u32) -> (crate::cpu::CpuTexture, crate::cpu::CpuTexture) {
        let source = device.upload(&FrameBuffer::solid(w, h, [1.0; 4])).unwrap();
        let dest = device.create_texture(&TextureDesc::new("dest", w, h)).unwrap();
        (source, dest)
    }

    #[test]
    fn test_disabled_effect_passes_through() {
        let device = CpuDevice::default();
        let mut effect = FeedbackEffect::new(device.clone(), &EffectSettings::default());
        let (source, mut dest) = textures(&device, 4, 4);
        let outcome = effect.on_render(&source, &mut dest, Viewport::new(4, 4));
        assert_eq!(outcome, FrameOutcome::Passthrough);
        assert_eq!(device.download(&dest).unwrap(), *source.pixels());
        assert!(!effect.resources().is_ready());
    }

    #[test]
    fn test_enabled_effect_composites() {
        let device = CpuDevice::default();
        let mut effect = FeedbackEffect::new(device.clone(), &EffectSettings::default());
        effect.on_enable();
        effect.on_update(&EffectParameters::default());
        let (source, mut dest) = textures(&device, 4, 4);
        let outcome = effect.on_render(&source, &mut dest, Viewport::new(4, 4));
        assert_eq!(outcome, FrameOutcome::Composited);
        assert_eq!(effect.frames_rendered(), 1);
        assert!(effect.resources().is_ready());
    }

    #[test]
    fn test_missing_program_faults_and_recovers_on_enable() {
        let device = CpuDevice::new(ProgramLibrary::empty());
        let mut effect = FeedbackEffect::new(device.clone(), &EffectSettings::default());
        effect.on_enable();
        let (source, mut dest) = textures(&device, 4, 4);
        let outcome = effect.on_render(&source, &mut dest, Viewport::new(4, 4));
        assert_eq!(outcome, FrameOutcome::Passthrough);
        assert!(matches!(effect.state(), EffectState::Faulted(_)));

        // stays off until re-enabled
        let outcome = effect.on_render(&source, &mut dest, Viewport::new(4, 4));
        assert_eq!(outcome, FrameOutcome::Passthrough);
        effect.on_enable();
        assert!(effect.is_enabled());
    }

    #[test]
    fn test_out_of_range_parameters_are_clamped() {
        let mut effect = FeedbackEffect::new(CpuDevice::default(), &EffectSettings::default());
        effect.on_update(&EffectParameters {
            rotation_degrees: 20.0,
            scale: 0.5,
            ..Default::default()
        });
        assert_eq!(effect.parameters().rotation_degrees, 5.0);
        assert_eq!(effect.parameters().scale, 0.95);
    }

    #[test]
    fn test_disable_releases_resources() {
        let device = CpuDevice::default();
        let mut effect = FeedbackEffect::new(device.clone(), &EffectSettings::default());
        effect.on_enable();
        let (source, mut dest) = textures(&device, 4, 4);
        effect.on_render(&source, &mut dest, Viewport::new(4, 4));
        effect.on_disable();
        effect.on_disable();
        assert!(!effect.resources().is_ready());
        assert_eq!(device.stats().live_programs(), 0);
        // source and dest only
        assert_eq!(device.stats().live_textures(), 2);
    }
}
