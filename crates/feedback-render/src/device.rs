//! The seam between the effect and whatever executes GPU work.
//!
//! ```text
//! FeedbackEffect
//!     └── ResourceManager / FrameCompositor
//!             └── RenderDevice trait
//!                     ├── CpuDevice   (rayon reference implementation)
//!                     └── WgpuDevice  (WGSL pipelines)
//! ```
//!
//! Blend programs are opaque to the effect: it resolves one by name and
//! invokes it with a source, a feedback texture and [`Uniforms`].

use std::collections::HashMap;

use feedback_core::config::{InsertionPoint, DEFAULT_BLEND_PROGRAM};
use feedback_core::{FeedbackError, FeedbackResult, FilterMode, FrameBuffer, Uniforms};

/// Identity of one texture allocation. Never reused within a device.
pub type TextureId = u64;

/// Handle to an HDR color texture owned by a device.
pub trait TextureHandle {
    fn id(&self) -> TextureId;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// Sampling mode used when this texture is read as feedback.
    fn filter_mode(&self) -> FilterMode;
}

/// Allocation request for an HDR color texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
}

impl TextureDesc {
    pub fn new(label: &'static str, width: u32, height: u32) -> Self {
        Self {
            label,
            width,
            height,
        }
    }

    /// Bytes of memory the texture occupies on a device storing `bytes_per_pixel`.
    pub fn byte_size(&self, bytes_per_pixel: u64) -> u64 {
        self.width as u64 * self.height as u64 * bytes_per_pixel
    }
}

/// Textures read by one blend invocation.
pub struct BlendInputs<'a, T> {
    /// The frame just rendered by the camera.
    pub source: &'a T,
    /// The delay buffer holding the previous output.
    pub feedback: &'a T,
}

/// A blend program a device can build.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendProgramDesc {
    pub name: String,
    /// Weight of the transformed feedback against the source, in [0, 1].
    pub persistence: f32,
}

/// Blend programs known to a device, looked up by name.
#[derive(Debug, Clone, Default)]
pub struct ProgramLibrary {
    programs: HashMap<String, BlendProgramDesc>,
}

impl ProgramLibrary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Library holding the stock feedback program.
    pub fn with_default(persistence: f32) -> Self {
        let mut library = Self::empty();
        library.register(BlendProgramDesc {
            name: DEFAULT_BLEND_PROGRAM.to_string(),
            persistence,
        });
        library
    }

    pub fn register(&mut self, desc: BlendProgramDesc) {
        self.programs.insert(desc.name.clone(), desc);
    }

    pub fn resolve(&self, name: &str) -> FeedbackResult<&BlendProgramDesc> {
        self.programs
            .get(name)
            .ok_or_else(|| FeedbackError::MissingBlendProgram(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.programs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// GPU operations the feedback effect needs from its host.
///
/// All methods take `&self`; devices are cheap handles and the effect is
/// driven from a single render thread.
pub trait RenderDevice {
    type Texture: TextureHandle;
    type Program;
    type Command;

    fn backend_name(&self) -> &'static str;

    /// Allocate a cleared HDR texture.
    fn create_texture(&self, desc: &TextureDesc) -> FeedbackResult<Self::Texture>;

    /// Return a texture to the device. The handle is consumed.
    fn release_texture(&self, texture: Self::Texture);

    fn set_filter_mode(&self, texture: &mut Self::Texture, mode: FilterMode);

    /// Create a texture holding `frame`.
    fn upload(&self, frame: &FrameBuffer) -> FeedbackResult<Self::Texture>;

    /// Read a texture back to the host.
    fn download(&self, texture: &Self::Texture) -> FeedbackResult<FrameBuffer>;

    /// Copy `src` into `dst`, resampling when their sizes differ.
    fn blit(&self, src: &Self::Texture, dst: &mut Self::Texture) -> FeedbackResult<()>;

    /// Resolve a blend program by name.
    fn load_blend_program(&self, name: &str) -> FeedbackResult<Self::Program>;

    fn release_program(&self, program: Self::Program);

    /// Run `program` over `inputs`, writing every pixel of `target`.
    fn invoke_blend_program(
        &self,
        program: &Self::Program,
        inputs: BlendInputs<'_, Self::Texture>,
        uniforms: &Uniforms,
        target: &mut Self::Texture,
    ) -> FeedbackResult<()>;

    /// Pre-record the feedback draw. The command binds `feedback` (and its
    /// current filter mode) by reference.
    fn record_command(
        &self,
        program: &Self::Program,
        feedback: &Self::Texture,
        point: InsertionPoint,
    ) -> FeedbackResult<Self::Command>;

    /// Replay a recorded command over the current contents of `target`.
    /// Fails with [`FeedbackError::StaleCommand`] if `feedback` is not the
    /// texture the command was recorded with.
    fn execute_command(
        &self,
        command: &Self::Command,
        feedback: &Self::Texture,
        uniforms: &Uniforms,
        target: &mut Self::Texture,
    ) -> FeedbackResult<()>;

    fn release_command(&self, command: Self::Command);

    /// Free any memory the device keeps for reuse.
    fn reclaim(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_library_resolves_feedback() {
        let library = ProgramLibrary::with_default(0.5);
        let desc = library.resolve("feedback").unwrap();
        assert_eq!(desc.persistence, 0.5);
        assert_eq!(library.names(), vec!["feedback"]);
    }

    #[test]
    fn test_unknown_program_is_missing() {
        let library = ProgramLibrary::empty();
        match library.resolve("feedback") {
            Err(FeedbackError::MissingBlendProgram(name)) => assert_eq!(name, "feedback"),
            other => panic!("expected MissingBlendProgram, got {:?}", other),
        }
    }

    #[test]
    fn test_texture_desc_byte_size() {
        assert_eq!(TextureDesc::new("t", 1920, 1080).byte_size(8), 1920 * 1080 * 8);
    }
}
