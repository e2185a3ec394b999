//! Lifetime of the delay buffer, blend material and recorded command.
//!
//! Resources are either absent or all present; the tagged
//! [`ResourceState`] makes every access handle both cases. Once acquired
//! they are released by [`ResourceManager::release_all`], which also runs on
//! drop.

use feedback_core::config::InsertionPoint;
use feedback_core::{EffectParameters, FeedbackError, FeedbackResult, FilterMode, Uniforms, Viewport};

use crate::device::{RenderDevice, TextureDesc, TextureHandle};
use crate::material::BlendMaterial;

/// Counters describing what the manager has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceStats {
    /// Delay buffers allocated, including reallocations.
    pub allocations: u64,
    /// Delay buffers replaced because the viewport changed size.
    pub reallocations: u64,
    /// Times a full set of resources was released.
    pub releases: u64,
    pub commands_recorded: u64,
    /// Recorded commands torn down because what they bound changed.
    pub command_invalidations: u64,
    /// Delay buffers replaced by a freshly rendered target.
    pub transfers: u64,
}

struct RecordedCommand<C> {
    handle: C,
    point: InsertionPoint,
}

/// Everything the compositor needs for one frame.
pub struct ReadyResources<D: RenderDevice> {
    material: BlendMaterial<D::Program>,
    delay: D::Texture,
    command: Option<RecordedCommand<D::Command>>,
}

enum ResourceState<D: RenderDevice> {
    Uninitialized,
    Ready(ReadyResources<D>),
}

fn delay_desc(viewport: Viewport) -> TextureDesc {
    TextureDesc::new("feedback_delay_buffer", viewport.width, viewport.height)
}

/// Owns the GPU resources of one effect instance.
pub struct ResourceManager<D: RenderDevice> {
    device: D,
    program: String,
    state: ResourceState<D>,
    stats: ResourceStats,
}

impl<D: RenderDevice> ResourceManager<D> {
    pub fn new(device: D, program: impl Into<String>) -> Self {
        Self {
            device,
            program: program.into(),
            state: ResourceState::Uninitialized,
            stats: ResourceStats::default(),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn program_name(&self) -> &str {
        &self.program
    }

    /// Switch to another blend program. Releases everything if it changed.
    pub fn set_program(&mut self, program: &str) {
        if self.program != program {
            self.release_all();
            self.program = program.to_string();
        }
    }

    pub fn stats(&self) -> ResourceStats {
        self.stats
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ResourceState::Ready(_))
    }

    pub fn delay_buffer(&self) -> Option<&D::Texture> {
        match &self.state {
            ResourceState::Ready(ready) => Some(&ready.delay),
            ResourceState::Uninitialized => None,
        }
    }

    pub fn delay_dimensions(&self) -> Option<(u32, u32)> {
        self.delay_buffer().map(|delay| delay.dimensions())
    }

    pub fn material(&self) -> Option<&BlendMaterial<D::Program>> {
        match &self.state {
            ResourceState::Ready(ready) => Some(&ready.material),
            ResourceState::Uninitialized => None,
        }
    }

    pub fn command(&self) -> Option<&D::Command> {
        match &self.state {
            ResourceState::Ready(ready) => ready.command.as_ref().map(|c| &c.handle),
            ResourceState::Uninitialized => None,
        }
    }

    /// Guarantee a material and a delay buffer matching `viewport`.
    ///
    /// Idempotent while the viewport is unchanged. A resized viewport
    /// releases the delay buffer and allocates a cleared one, invalidating
    /// any recorded command. On failure nothing stays allocated.
    pub fn ensure_resources(&mut self, viewport: Viewport) -> FeedbackResult<ResourceLease<'_, D>> {
        if viewport.is_empty() {
            return Err(FeedbackError::InvalidDimensions(viewport.width, viewport.height));
        }

        let ready = match std::mem::replace(&mut self.state, ResourceState::Uninitialized) {
            ResourceState::Uninitialized => self.acquire(viewport)?,
            ResourceState::Ready(ready)
                if ready.delay.dimensions() == (viewport.width, viewport.height) =>
            {
                ready
            }
            ResourceState::Ready(ready) => self.reallocate(ready, viewport)?,
        };
        self.state = ResourceState::Ready(ready);

        match &mut self.state {
            ResourceState::Ready(ready) => Ok(ResourceLease {
                device: &self.device,
                ready,
                stats: &mut self.stats,
            }),
            ResourceState::Uninitialized => unreachable!("resources were just acquired"),
        }
    }

    fn acquire(&mut self, viewport: Viewport) -> FeedbackResult<ReadyResources<D>> {
        let program = self.device.load_blend_program(&self.program)?;
        let delay = match self.device.create_texture(&delay_desc(viewport)) {
            Ok(delay) => delay,
            Err(e) => {
                self.device.release_program(program);
                return Err(e);
            }
        };
        self.stats.allocations += 1;
        tracing::debug!(
            "acquired feedback resources: program '{}', delay buffer {} on {}",
            self.program,
            viewport,
            self.device.backend_name()
        );
        Ok(ReadyResources {
            material: BlendMaterial::new(program),
            delay,
            command: None,
        })
    }

    fn reallocate(
        &mut self,
        ready: ReadyResources<D>,
        viewport: Viewport,
    ) -> FeedbackResult<ReadyResources<D>> {
        let ReadyResources {
            material,
            delay,
            command,
        } = ready;
        if let Some(command) = command {
            self.device.release_command(command.handle);
            self.stats.command_invalidations += 1;
        }
        let (old_w, old_h) = delay.dimensions();
        let filter = delay.filter_mode();
        self.device.release_texture(delay);

        match self.device.create_texture(&delay_desc(viewport)) {
            Ok(mut delay) => {
                self.device.set_filter_mode(&mut delay, filter);
                self.stats.allocations += 1;
                self.stats.reallocations += 1;
                tracing::debug!(
                    "viewport resized {}x{} -> {}, delay buffer reallocated",
                    old_w,
                    old_h,
                    viewport
                );
                Ok(ReadyResources {
                    material,
                    delay,
                    command: None,
                })
            }
            Err(e) => {
                self.device.release_program(material.into_program());
                self.stats.releases += 1;
                Err(e)
            }
        }
    }

    /// Release the delay buffer, material and recorded command.
    /// Safe to call any number of times.
    pub fn release_all(&mut self) {
        if let ResourceState::Ready(ready) =
            std::mem::replace(&mut self.state, ResourceState::Uninitialized)
        {
            let ReadyResources {
                material,
                delay,
                command,
            } = ready;
            if let Some(command) = command {
                self.device.release_command(command.handle);
            }
            self.device.release_texture(delay);
            self.device.release_program(material.into_program());
            self.stats.releases += 1;
            tracing::debug!("released feedback resources");
        }
        self.device.reclaim();
    }
}

impl<D: RenderDevice> Drop for ResourceManager<D> {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Mutable access to ready resources for the duration of one frame.
pub struct ResourceLease<'a, D: RenderDevice> {
    device: &'a D,
    ready: &'a mut ReadyResources<D>,
    stats: &'a mut ResourceStats,
}

impl<'a, D: RenderDevice> ResourceLease<'a, D> {
    pub fn device(&self) -> &'a D {
        self.device
    }

    pub fn material(&self) -> &BlendMaterial<D::Program> {
        &self.ready.material
    }

    pub fn delay(&self) -> &D::Texture {
        &self.ready.delay
    }

    pub fn delay_mut(&mut self) -> &mut D::Texture {
        &mut self.ready.delay
    }

    /// Translate this frame's parameters into the material and apply the
    /// filter mode to the delay buffer.
    pub fn apply_parameters(&mut self, params: &EffectParameters) -> Uniforms {
        let uniforms = self.ready.material.apply(params);
        self.set_feedback_filter(uniforms.filter_mode);
        uniforms
    }

    /// A recorded command bakes the sampler in, so a filter change drops it.
    fn set_feedback_filter(&mut self, mode: FilterMode) {
        if self.ready.delay.filter_mode() == mode {
            return;
        }
        self.device.set_filter_mode(&mut self.ready.delay, mode);
        self.invalidate_command();
    }

    fn invalidate_command(&mut self) {
        if let Some(command) = self.ready.command.take() {
            self.device.release_command(command.handle);
            self.stats.command_invalidations += 1;
        }
    }

    /// Make `next` the delay buffer and release the previous one.
    ///
    /// The old handle is moved out and released here, so it can never be
    /// read again or released twice.
    pub fn transfer_delay(&mut self, next: D::Texture) {
        let previous = std::mem::replace(&mut self.ready.delay, next);
        let filter = previous.filter_mode();
        self.device.set_filter_mode(&mut self.ready.delay, filter);
        self.device.release_texture(previous);
        self.invalidate_command();
        self.stats.transfers += 1;
    }

    /// Record the feedback command at `point` unless one is already recorded there.
    pub fn ensure_command(&mut self, point: InsertionPoint) -> FeedbackResult<()> {
        if let Some(recorded) = &self.ready.command {
            if recorded.point == point {
                return Ok(());
            }
        }
        self.invalidate_command();
        let handle =
            self.device
                .record_command(self.ready.material.program(), &self.ready.delay, point)?;
        self.ready.command = Some(RecordedCommand { handle, point });
        self.stats.commands_recorded += 1;
        tracing::debug!("recorded feedback command at {}", point);
        Ok(())
    }

    pub fn command(&self) -> Option<&D::Command> {
        self.ready.command.as_ref().map(|c| &c.handle)
    }
}
