//! Per-frame compositing strategies.
//!
//! Every strategy leaves the viewport's source image, blended with the
//! transformed delay buffer, in `dest`, and leaves the delay buffer holding
//! what the next frame should feed back.

use feedback_core::config::{CompositeStrategy, EffectSettings, InsertionPoint};
use feedback_core::{EffectParameters, FeedbackResult, Viewport};

use crate::device::{BlendInputs, RenderDevice, TextureDesc, TextureHandle};
use crate::resources::ResourceManager;

/// Drives one strategy over a [`ResourceManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameCompositor {
    strategy: CompositeStrategy,
    insertion_point: InsertionPoint,
}

impl FrameCompositor {
    pub fn new(strategy: CompositeStrategy, insertion_point: InsertionPoint) -> Self {
        Self {
            strategy,
            insertion_point,
        }
    }

    pub fn from_settings(settings: &EffectSettings) -> Self {
        Self::new(settings.strategy, settings.insertion_point)
    }

    pub fn strategy(&self) -> CompositeStrategy {
        self.strategy
    }

    pub fn insertion_point(&self) -> InsertionPoint {
        self.insertion_point
    }

    /// Composite one frame.
    pub fn composite<D: RenderDevice>(
        &self,
        resources: &mut ResourceManager<D>,
        params: &EffectParameters,
        source: &D::Texture,
        dest: &mut D::Texture,
        viewport: Viewport,
    ) -> FeedbackResult<()> {
        let mut lease = resources.ensure_resources(viewport)?;
        let uniforms = lease.apply_parameters(params);
        let device = lease.device();

        match self.strategy {
            CompositeStrategy::RecursiveEcho => {
                let mut target = device.create_texture(&TextureDesc::new(
                    "feedback_echo_target",
                    viewport.width,
                    viewport.height,
                ))?;
                let inputs = BlendInputs {
                    source,
                    feedback: lease.delay(),
                };
                if let Err(e) = device.invoke_blend_program(
                    lease.material().program(),
                    inputs,
                    &uniforms,
                    &mut target,
                ) {
                    device.release_texture(target);
                    return Err(e);
                }
                lease.transfer_delay(target);
                device.blit(lease.delay(), dest)
            }
            CompositeStrategy::DoubleBlit => {
                device.blit(source, lease.delay_mut())?;
                device.blit(source, dest)
            }
            CompositeStrategy::CommandList => {
                lease.ensure_command(self.insertion_point)?;
                device.blit(source, dest)?;
                if let Some(command) = lease.command() {
                    device.execute_command(command, lease.delay(), &uniforms, dest)?;
                }
                device.blit(dest, lease.delay_mut())
            }
        }
    }
}
