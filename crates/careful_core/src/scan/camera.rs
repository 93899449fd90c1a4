//! Platform camera and barcode decoding seams.

use std::sync::Arc;

use async_trait::async_trait;
use shared::error::CoreError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// Rear camera.
    Environment,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraConstraints {
    pub facing_mode: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            facing_mode: FacingMode::Environment,
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// An open camera stream. Exclusively owned by one scan session.
#[async_trait]
pub trait CameraStream: Send + Sync {
    /// Next frame, or `None` once the stream has ended or been released.
    async fn next_frame(&self) -> Option<VideoFrame>;
    fn supports_torch(&self) -> bool;
    fn apply_torch(&self, on: bool) -> Result<(), CoreError>;
    /// Releases the underlying device. Must be idempotent.
    fn release(&self);
}

#[async_trait]
pub trait CameraProvider: Send + Sync {
    /// Opens a stream; failures are [`CoreError::DeviceAccess`].
    async fn open(&self, constraints: &CameraConstraints)
        -> Result<Arc<dyn CameraStream>, CoreError>;
}

#[derive(Debug, Error)]
#[error("frame decode failed: {0}")]
pub struct DecodeError(pub String);

pub trait BarcodeDecoder: Send + Sync {
    /// `Ok(None)` when the frame holds no readable code; `Err` is fatal for the session.
    fn decode(&self, frame: &VideoFrame) -> Result<Option<String>, DecodeError>;
}
