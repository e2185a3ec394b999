//! Content hashing for deterministic output verification.
//!
//! Produces a SHA-256 hash of HDR frame data so two runs of the same frame
//! sequence can be compared bit-exactly.

use sha2::{Digest, Sha256};

use crate::frame::FrameBuffer;

/// A content hash digest (SHA-256, 32 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash {
    bytes: [u8; 32],
}

impl ContentHash {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Get the hash as a hex string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

fn update_frame(hasher: &mut Sha256, frame: &FrameBuffer) {
    // Dimensions go in first so equal data at different sizes hashes differently.
    hasher.update(frame.width.to_le_bytes());
    hasher.update(frame.height.to_le_bytes());
    for value in &frame.data {
        // -0.0 and 0.0 are the same pixel.
        let value = if *value == 0.0 { 0.0f32 } else { *value };
        hasher.update(value.to_le_bytes());
    }
}

fn finish(hasher: Sha256) -> ContentHash {
    let result = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    ContentHash::from_bytes(bytes)
}

/// Compute the content hash of a single frame.
pub fn hash_frame(frame: &FrameBuffer) -> ContentHash {
    let mut hasher = Sha256::new();
    update_frame(&mut hasher, frame);
    finish(hasher)
}

/// Compute the content hash of a frame sequence.
pub fn hash_frames(frames: &[FrameBuffer]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update((frames.len() as u64).to_le_bytes());
    for frame in frames {
        update_frame(&mut hasher, frame);
    }
    finish(hasher)
}
