//! Reference [`RenderDevice`] that keeps textures in host memory.
//!
//! Deterministic and GPU-free, so frame sequences can be verified exactly.
//! It also tracks live allocations and can simulate running out of memory.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use feedback_core::config::InsertionPoint;
use feedback_core::{FeedbackError, FeedbackResult, FilterMode, FrameBuffer, Uniforms};

use crate::device::{
    BlendInputs, BlendProgramDesc, ProgramLibrary, RenderDevice, TextureDesc, TextureHandle,
    TextureId,
};
use crate::kernel;

/// Bytes per pixel of a CPU texture (4 x f32).
const BYTES_PER_PIXEL: u64 = 16;

#[derive(Debug)]
pub struct CpuTexture {
    id: TextureId,
    filter: FilterMode,
    pixels: FrameBuffer,
}

impl CpuTexture {
    pub fn pixels(&self) -> &FrameBuffer {
        &self.pixels
    }
}

impl TextureHandle for CpuTexture {
    fn id(&self) -> TextureId {
        self.id
    }

    fn width(&self) -> u32 {
        self.pixels.width
    }

    fn height(&self) -> u32 {
        self.pixels.height
    }

    fn filter_mode(&self) -> FilterMode {
        self.filter
    }
}

#[derive(Debug)]
pub struct CpuProgram {
    desc: BlendProgramDesc,
}

impl CpuProgram {
    pub fn desc(&self) -> &BlendProgramDesc {
        &self.desc
    }
}

#[derive(Debug)]
pub struct CpuCommand {
    persistence: f32,
    bound: TextureId,
    filter: FilterMode,
}

impl CpuCommand {
    pub fn bound_texture(&self) -> TextureId {
        self.bound
    }
}

/// Counters exposed for leak and lifecycle checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuDeviceStats {
    pub textures_created: u64,
    pub textures_released: u64,
    pub live_texture_bytes: u64,
    pub programs_loaded: u64,
    pub programs_released: u64,
    pub commands_recorded: u64,
    pub commands_released: u64,
    pub blend_invocations: u64,
    pub command_executions: u64,
    pub blits: u64,
}

impl CpuDeviceStats {
    pub fn live_textures(&self) -> u64 {
        self.textures_created - self.textures_released
    }

    pub fn live_programs(&self) -> u64 {
        self.programs_loaded - self.programs_released
    }

    pub fn live_commands(&self) -> u64 {
        self.commands_recorded - self.commands_released
    }
}

#[derive(Debug, Default)]
struct FaultPlan {
    /// Number of upcoming allocations that succeed before one fails.
    fail_after: Option<u64>,
    memory_budget: Option<u64>,
}

#[derive(Debug)]
struct CpuState {
    library: ProgramLibrary,
    next_id: AtomicU64,
    stats: Mutex<CpuDeviceStats>,
    faults: Mutex<FaultPlan>,
}

/// Host-memory render device. Cloning yields another handle to the same device.
#[derive(Debug, Clone)]
pub struct CpuDevice {
    state: Arc<CpuState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CpuDevice {
    pub fn new(library: ProgramLibrary) -> Self {
        Self {
            state: Arc::new(CpuState {
                library,
                next_id: AtomicU64::new(1),
                stats: Mutex::new(CpuDeviceStats::default()),
                faults: Mutex::new(FaultPlan::default()),
            }),
        }
    }

    /// Device with the stock feedback program at the given persistence.
    pub fn with_default_program(persistence: f32) -> Self {
        Self::new(ProgramLibrary::with_default(persistence))
    }

    pub fn stats(&self) -> CpuDeviceStats {
        *lock(&self.state.stats)
    }

    /// Let `successes` more allocations through, then fail the next one.
    pub fn fail_allocation_after(&self, successes: u64) {
        lock(&self.state.faults).fail_after = Some(successes);
    }

    /// Cap the bytes of live textures; allocations beyond it fail.
    pub fn set_memory_budget(&self, bytes: Option<u64>) {
        lock(&self.state.faults).memory_budget = bytes;
    }

    fn next_id(&self) -> TextureId {
        self.state.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn allocate(&self, desc: &TextureDesc, pixels: FrameBuffer) -> FeedbackResult<CpuTexture> {
        if desc.width == 0 || desc.height == 0 {
            return Err(FeedbackError::InvalidDimensions(desc.width, desc.height));
        }
        let bytes = desc.byte_size(BYTES_PER_PIXEL);
        {
            let mut faults = lock(&self.state.faults);
            match faults.fail_after {
                Some(0) => {
                    faults.fail_after = None;
                    return Err(FeedbackError::allocation(format!(
                        "{} ({}x{}): out of memory",
                        desc.label, desc.width, desc.height
                    )));
                }
                Some(n) => faults.fail_after = Some(n - 1),
                None => {}
            }
            if let Some(budget) = faults.memory_budget {
                let live = lock(&self.state.stats).live_texture_bytes;
                if live + bytes > budget {
                    return Err(FeedbackError::allocation(format!(
                        "{} ({}x{}): {} bytes requested, {} of {} in use",
                        desc.label, desc.width, desc.height, bytes, live, budget
                    )));
                }
            }
        }
        let mut stats = lock(&self.state.stats);
        stats.textures_created += 1;
        stats.live_texture_bytes += bytes;
        Ok(CpuTexture {
            id: self.next_id(),
            filter: FilterMode::default(),
            pixels,
        })
    }
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::with_default_program(0.5)
    }
}

impl RenderDevice for CpuDevice {
    type Texture = CpuTexture;
    type Program = CpuProgram;
    type Command = CpuCommand;

    fn backend_name(&self) -> &'static str {
        "cpu"
    }

    fn create_texture(&self, desc: &TextureDesc) -> FeedbackResult<CpuTexture> {
        self.allocate(desc, FrameBuffer::new(desc.width, desc.height))
    }

    fn release_texture(&self, texture: CpuTexture) {
        let mut stats = lock(&self.state.stats);
        stats.textures_released += 1;
        stats.live_texture_bytes = stats
            .live_texture_bytes
            .saturating_sub(texture.pixels.pixel_count() as u64 * BYTES_PER_PIXEL);
    }

    fn set_filter_mode(&self, texture: &mut CpuTexture, mode: FilterMode) {
        texture.filter = mode;
    }

    fn upload(&self, frame: &FrameBuffer) -> FeedbackResult<CpuTexture> {
        let desc = TextureDesc::new("upload", frame.width, frame.height);
        self.allocate(&desc, frame.clone())
    }

    fn download(&self, texture: &CpuTexture) -> FeedbackResult<FrameBuffer> {
        Ok(texture.pixels.clone())
    }

    fn blit(&self, src: &CpuTexture, dst: &mut CpuTexture) -> FeedbackResult<()> {
        kernel::copy(&src.pixels, &mut dst.pixels);
        lock(&self.state.stats).blits += 1;
        Ok(())
    }

    fn load_blend_program(&self, name: &str) -> FeedbackResult<CpuProgram> {
        let desc = self.state.library.resolve(name)?.clone();
        lock(&self.state.stats).programs_loaded += 1;
        Ok(CpuProgram { desc })
    }

    fn release_program(&self, _program: CpuProgram) {
        lock(&self.state.stats).programs_released += 1;
    }

    fn invoke_blend_program(
        &self,
        program: &CpuProgram,
        inputs: BlendInputs<'_, CpuTexture>,
        uniforms: &Uniforms,
        target: &mut CpuTexture,
    ) -> FeedbackResult<()> {
        kernel::blend(
            &inputs.source.pixels,
            &inputs.feedback.pixels,
            inputs.feedback.filter,
            uniforms,
            program.desc.persistence,
            &mut target.pixels,
        );
        lock(&self.state.stats).blend_invocations += 1;
        Ok(())
    }

    fn record_command(
        &self,
        program: &CpuProgram,
        feedback: &CpuTexture,
        point: InsertionPoint,
    ) -> FeedbackResult<CpuCommand> {
        lock(&self.state.stats).commands_recorded += 1;
        tracing::trace!("cpu command at {} bound to texture {}", point, feedback.id);
        Ok(CpuCommand {
            persistence: program.desc.persistence,
            bound: feedback.id,
            filter: feedback.filter,
        })
    }

    fn execute_command(
        &self,
        command: &CpuCommand,
        feedback: &CpuTexture,
        uniforms: &Uniforms,
        target: &mut CpuTexture,
    ) -> FeedbackResult<()> {
        if command.bound != feedback.id {
            return Err(FeedbackError::StaleCommand {
                recorded: command.bound,
                current: feedback.id,
            });
        }
        // The filter is part of the recorded binding, like a baked sampler.
        kernel::overlay(
            &feedback.pixels,
            command.filter,
            uniforms,
            command.persistence,
            &mut target.pixels,
        );
        lock(&self.state.stats).command_executions += 1;
        Ok(())
    }

    fn release_command(&self, _command: CpuCommand) {
        lock(&self.state.stats).commands_released += 1;
    }
}
