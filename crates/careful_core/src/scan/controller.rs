use std::sync::Arc;

use shared::domain::ScanSessionId;
use tracing::{debug, info, warn};

use super::camera::{CameraConstraints, CameraStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Acquiring,
    Scanning,
    Failed { message: String },
}

impl ScanState {
    pub fn is_active(&self) -> bool {
        matches!(self, ScanState::Acquiring | ScanState::Scanning)
    }
}

pub enum ScanInput {
    Start,
    Stop,
    ToggleTorch,
    CameraOpened {
        session: ScanSessionId,
        stream: Arc<dyn CameraStream>,
    },
    CameraFailed {
        session: ScanSessionId,
        message: String,
    },
    FrameDecoded {
        session: ScanSessionId,
        payload: String,
    },
    FrameFailed {
        session: ScanSessionId,
        message: String,
    },
}

impl ScanInput {
    fn name(&self) -> &'static str {
        match self {
            ScanInput::Start => "start",
            ScanInput::Stop => "stop",
            ScanInput::ToggleTorch => "toggle_torch",
            ScanInput::CameraOpened { .. } => "camera_opened",
            ScanInput::CameraFailed { .. } => "camera_failed",
            ScanInput::FrameDecoded { .. } => "frame_decoded",
            ScanInput::FrameFailed { .. } => "frame_failed",
        }
    }
}

pub enum ScanOutput {
    /// Open a camera for `session`; report back with `CameraOpened` or `CameraFailed`.
    AcquireCamera {
        session: ScanSessionId,
        constraints: CameraConstraints,
    },
    /// Start evaluating frames from `stream`; report back with `FrameDecoded` or `FrameFailed`.
    BeginDecoding {
        session: ScanSessionId,
        stream: Arc<dyn CameraStream>,
    },
    StateChanged(ScanState),
    Decoded {
        session: ScanSessionId,
        payload: String,
    },
    TorchChanged(bool),
}

/// Scan session lifecycle as a state machine: inputs in, outputs out.
///
/// Results tagged with anything but the current session are stale and are
/// discarded; a stale camera stream is released on arrival. Dropping the
/// controller releases any stream it holds.
pub struct ScanSessionController {
    state: ScanState,
    session: Option<ScanSessionId>,
    stream: Option<Arc<dyn CameraStream>>,
    torch_on: bool,
    constraints: CameraConstraints,
}

impl ScanSessionController {
    pub fn new(constraints: CameraConstraints) -> Self {
        Self {
            state: ScanState::Idle,
            session: None,
            stream: None,
            torch_on: false,
            constraints,
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn torch_on(&self) -> bool {
        self.torch_on
    }

    pub fn active_session(&self) -> Option<ScanSessionId> {
        self.session
    }

    pub fn handle(&mut self, input: ScanInput) -> Vec<ScanOutput> {
        debug!(input = input.name(), state = ?self.state, "scan input");
        match input {
            ScanInput::Start => self.start(),
            ScanInput::Stop => self.stop(),
            ScanInput::ToggleTorch => self.toggle_torch(),
            ScanInput::CameraOpened { session, stream } => self.camera_opened(session, stream),
            ScanInput::CameraFailed { session, message } => {
                if !self.is_current(session, &ScanState::Acquiring) {
                    debug!(%session, "ignoring camera failure for stale session");
                    return Vec::new();
                }
                warn!(%session, error = %message, "camera acquisition failed");
                self.fail(message)
            }
            ScanInput::FrameDecoded { session, payload } => {
                if !self.is_current(session, &ScanState::Scanning) {
                    debug!(%session, "dropping decode result for inactive session");
                    return Vec::new();
                }
                self.release();
                self.state = ScanState::Idle;
                info!(%session, "barcode decoded");
                vec![
                    ScanOutput::StateChanged(ScanState::Idle),
                    ScanOutput::Decoded { session, payload },
                ]
            }
            ScanInput::FrameFailed { session, message } => {
                if !self.is_current(session, &ScanState::Scanning) {
                    debug!(%session, "dropping frame failure for inactive session");
                    return Vec::new();
                }
                warn!(%session, error = %message, "frame processing failed");
                self.fail(message)
            }
        }
    }

    fn start(&mut self) -> Vec<ScanOutput> {
        if self.state.is_active() {
            debug!("scan already in progress; start ignored");
            return Vec::new();
        }
        let session = ScanSessionId::new();
        self.session = Some(session);
        self.torch_on = false;
        self.state = ScanState::Acquiring;
        info!(%session, "scan session starting");
        vec![
            ScanOutput::StateChanged(ScanState::Acquiring),
            ScanOutput::AcquireCamera {
                session,
                constraints: self.constraints,
            },
        ]
    }

    fn stop(&mut self) -> Vec<ScanOutput> {
        self.release();
        if self.state == ScanState::Idle {
            return Vec::new();
        }
        self.state = ScanState::Idle;
        info!("scan session stopped");
        vec![ScanOutput::StateChanged(ScanState::Idle)]
    }

    fn camera_opened(
        &mut self,
        session: ScanSessionId,
        stream: Arc<dyn CameraStream>,
    ) -> Vec<ScanOutput> {
        if !self.is_current(session, &ScanState::Acquiring) {
            stream.release();
            debug!(%session, "released camera opened for stale session");
            return Vec::new();
        }
        self.stream = Some(Arc::clone(&stream));
        self.state = ScanState::Scanning;
        vec![
            ScanOutput::StateChanged(ScanState::Scanning),
            ScanOutput::BeginDecoding { session, stream },
        ]
    }

    fn toggle_torch(&mut self) -> Vec<ScanOutput> {
        let Some(stream) = self.stream.as_ref() else {
            debug!("torch toggle ignored without an active stream");
            return Vec::new();
        };
        if !stream.supports_torch() {
            debug!("torch not supported by active camera");
            return Vec::new();
        }
        let target = !self.torch_on;
        match stream.apply_torch(target) {
            Ok(()) => {
                self.torch_on = target;
                vec![ScanOutput::TorchChanged(target)]
            }
            Err(err) => {
                warn!(error = %err, "torch toggle not applied");
                Vec::new()
            }
        }
    }

    fn fail(&mut self, message: String) -> Vec<ScanOutput> {
        self.release();
        let state = ScanState::Failed { message };
        self.state = state.clone();
        vec![ScanOutput::StateChanged(state)]
    }

    fn is_current(&self, session: ScanSessionId, expected: &ScanState) -> bool {
        self.session == Some(session) && &self.state == expected
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.release();
        }
        self.session = None;
        self.torch_on = false;
    }
}

impl Drop for ScanSessionController {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
