//! # feedback-core
//!
//! Core types for the frame-echo feedback effect: the user-facing
//! parameters, their translation into blend-program uniforms, HDR frames,
//! configuration and the shared error type. Nothing here touches a GPU.

pub mod color;
pub mod config;
pub mod error;
pub mod frame;
pub mod hash;
pub mod params;
pub mod uniforms;

pub use config::*;

pub use color::Color;
pub use error::{FeedbackError, FeedbackResult};
pub use frame::{FrameBuffer, Viewport};
pub use params::EffectParameters;
pub use uniforms::{translate, FilterMode, Uniforms};
