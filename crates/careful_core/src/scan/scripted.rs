//! Camera that plays back a fixed list of frames, for replays and tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use shared::error::CoreError;
use tracing::debug;

use super::camera::{
    BarcodeDecoder, CameraConstraints, CameraProvider, CameraStream, DecodeError, VideoFrame,
};

/// Builds a frame whose bytes are the barcode payload itself.
pub fn text_frame(payload: &str) -> VideoFrame {
    VideoFrame {
        width: 1280,
        height: 720,
        data: payload.as_bytes().to_vec(),
    }
}

pub struct ScriptedStream {
    frames: Mutex<VecDeque<VideoFrame>>,
    torch_supported: bool,
    torch_on: AtomicBool,
    released: AtomicBool,
}

impl ScriptedStream {
    fn new(frames: Vec<VideoFrame>, torch_supported: bool) -> Self {
        Self {
            frames: Mutex::new(frames.into()),
            torch_supported,
            torch_on: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn torch_on(&self) -> bool {
        self.torch_on.load(Ordering::SeqCst)
    }

    pub fn remaining_frames(&self) -> usize {
        self.frames.lock().map(|frames| frames.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CameraStream for ScriptedStream {
    async fn next_frame(&self) -> Option<VideoFrame> {
        tokio::task::yield_now().await;
        if self.is_released() {
            return None;
        }
        self.frames.lock().ok()?.pop_front()
    }

    fn supports_torch(&self) -> bool {
        self.torch_supported
    }

    fn apply_torch(&self, on: bool) -> Result<(), CoreError> {
        if !self.torch_supported {
            return Err(CoreError::CapabilityUnsupported("torch".into()));
        }
        self.torch_on.store(on, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            debug!("scripted camera released");
        }
    }
}

/// Provider handing out one [`ScriptedStream`] per `open`, or a fixed failure.
pub struct ScriptedCamera {
    frames: Vec<VideoFrame>,
    torch_supported: bool,
    failure: Option<String>,
    opened: Mutex<Vec<Arc<ScriptedStream>>>,
}

impl ScriptedCamera {
    pub fn new(frames: Vec<VideoFrame>) -> Self {
        Self {
            frames,
            torch_supported: false,
            failure: None,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn from_payloads<'a>(payloads: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(payloads.into_iter().map(text_frame).collect())
    }

    pub fn failing(message: impl Into<String>) -> Self {
        let mut camera = Self::new(Vec::new());
        camera.failure = Some(message.into());
        camera
    }

    pub fn with_torch(mut self, supported: bool) -> Self {
        self.torch_supported = supported;
        self
    }

    pub fn opened_streams(&self) -> Vec<Arc<ScriptedStream>> {
        self.opened
            .lock()
            .map(|opened| opened.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CameraProvider for ScriptedCamera {
    async fn open(
        &self,
        _constraints: &CameraConstraints,
    ) -> Result<Arc<dyn CameraStream>, CoreError> {
        if let Some(message) = &self.failure {
            return Err(CoreError::DeviceAccess(message.clone()));
        }
        let stream = Arc::new(ScriptedStream::new(self.frames.clone(), self.torch_supported));
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(Arc::clone(&stream));
        }
        Ok(stream)
    }
}

/// Treats frame bytes as the UTF-8 payload; blank frames hold no code.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8PayloadDecoder;

impl BarcodeDecoder for Utf8PayloadDecoder {
    fn decode(&self, frame: &VideoFrame) -> Result<Option<String>, DecodeError> {
        let text = std::str::from_utf8(&frame.data)
            .map_err(|err| DecodeError(format!("frame is not valid UTF-8: {err}")))?;
        let text = text.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }
}
