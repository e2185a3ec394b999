//! PNG and friends in and out of HDR frames.
//! Decoding goes through `image`; values are stored as linear f32 in [0, 1].

use std::path::Path;

use feedback_core::{FeedbackError, FeedbackResult, FrameBuffer};

fn from_dynamic(img: image::DynamicImage) -> FeedbackResult<FrameBuffer> {
    let rgba = img.to_rgba32f();
    let (width, height) = rgba.dimensions();
    FrameBuffer::from_raw(width, height, rgba.into_raw())
        .ok_or_else(|| FeedbackError::Image(format!("decoded buffer does not match {}x{}", width, height)))
}

/// Load an image file into a frame.
pub fn load_image(path: &Path) -> FeedbackResult<FrameBuffer> {
    let img = image::open(path).map_err(|e| {
        FeedbackError::Image(format!("failed to load image '{}': {}", path.display(), e))
    })?;
    from_dynamic(img)
}

/// Decode an image held in memory.
pub fn load_image_from_bytes(data: &[u8]) -> FeedbackResult<FrameBuffer> {
    let img = image::load_from_memory(data)
        .map_err(|e| FeedbackError::Image(format!("failed to decode image: {}", e)))?;
    from_dynamic(img)
}

/// Quantize `frame` to 8 bits per channel and write it to `path`.
/// The format follows the file extension.
pub fn save_image(frame: &FrameBuffer, path: &Path) -> FeedbackResult<()> {
    let img = image::RgbaImage::from_raw(frame.width, frame.height, frame.to_rgba8())
        .ok_or_else(|| FeedbackError::Image("frame buffer size mismatch".to_string()))?;
    img.save(path).map_err(|e| {
        FeedbackError::Image(format!("failed to write image '{}': {}", path.display(), e))
    })
}
