//! # feedback-render
//!
//! The frame-echo effect and the devices it runs on. A [`FeedbackEffect`]
//! owns a delay buffer through its [`ResourceManager`] and composites every
//! frame with a [`FrameCompositor`] strategy. GPU work goes through the
//! [`RenderDevice`] trait, implemented on the CPU by [`CpuDevice`] and on
//! wgpu by [`WgpuDevice`].

pub mod compositor;
pub mod cpu;
pub mod device;
pub mod effect;
pub mod gpu;
pub mod image_io;
pub mod kernel;
pub mod material;
pub mod resources;
pub mod wgpu_device;

pub use compositor::FrameCompositor;
pub use cpu::{CpuDevice, CpuDeviceStats};
pub use device::{BlendProgramDesc, ProgramLibrary, RenderDevice, TextureDesc, TextureHandle};
pub use effect::{EffectState, FeedbackEffect, FrameOutcome, ImageEffect};
pub use gpu::GpuContext;
pub use resources::{ResourceManager, ResourceStats};
pub use wgpu_device::WgpuDevice;
