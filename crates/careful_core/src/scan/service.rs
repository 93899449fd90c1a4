use std::sync::Arc;

use shared::{domain::ScanSessionId, error::CoreError};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info};

use super::{
    camera::{BarcodeDecoder, CameraConstraints, CameraProvider, CameraStream},
    controller::{ScanInput, ScanOutput, ScanSessionController, ScanState},
};

const NOTIFICATION_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanNotification {
    StateChanged(ScanState),
    Decoded { payload: String },
    TorchChanged(bool),
}

/// Cloneable handle to a running scan service. Calls enqueue and return immediately.
#[derive(Clone)]
pub struct ScanHandle {
    inputs: mpsc::UnboundedSender<ScanInput>,
    notifications: broadcast::Sender<ScanNotification>,
}

impl ScanHandle {
    /// Must be triggered by a user gesture on platforms that gate camera access.
    pub fn start(&self) -> Result<(), CoreError> {
        self.send(ScanInput::Start)
    }

    pub fn stop(&self) -> Result<(), CoreError> {
        self.send(ScanInput::Stop)
    }

    pub fn toggle_torch(&self) -> Result<(), CoreError> {
        self.send(ScanInput::ToggleTorch)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanNotification> {
        self.notifications.subscribe()
    }

    fn send(&self, input: ScanInput) -> Result<(), CoreError> {
        self.inputs
            .send(input)
            .map_err(|_| CoreError::Internal("scan service is no longer running".into()))
    }
}

pub struct ScanService {
    controller: ScanSessionController,
    camera: Arc<dyn CameraProvider>,
    decoder: Arc<dyn BarcodeDecoder>,
    inputs: mpsc::WeakUnboundedSender<ScanInput>,
    notifications: broadcast::Sender<ScanNotification>,
}

impl ScanService {
    /// Spawns the service task. It runs until every [`ScanHandle`] is dropped,
    /// then releases any camera it still holds.
    pub fn spawn(
        camera: Arc<dyn CameraProvider>,
        decoder: Arc<dyn BarcodeDecoder>,
        constraints: CameraConstraints,
    ) -> (ScanHandle, JoinHandle<()>) {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        let service = Self {
            controller: ScanSessionController::new(constraints),
            camera,
            decoder,
            inputs: input_tx.downgrade(),
            notifications: notifications.clone(),
        };
        let task = tokio::spawn(service.run(input_rx));

        (
            ScanHandle {
                inputs: input_tx,
                notifications,
            },
            task,
        )
    }

    async fn run(mut self, mut input_rx: mpsc::UnboundedReceiver<ScanInput>) {
        while let Some(input) = input_rx.recv().await {
            for output in self.controller.handle(input) {
                self.dispatch(output);
            }
        }
        info!("scan service shutting down");
    }

    fn dispatch(&self, output: ScanOutput) {
        match output {
            ScanOutput::AcquireCamera {
                session,
                constraints,
            } => self.spawn_acquisition(session, constraints),
            ScanOutput::BeginDecoding { session, stream } => {
                self.spawn_decode_loop(session, stream)
            }
            ScanOutput::StateChanged(state) => self.notify(ScanNotification::StateChanged(state)),
            ScanOutput::Decoded { payload, .. } => {
                self.notify(ScanNotification::Decoded { payload })
            }
            ScanOutput::TorchChanged(on) => self.notify(ScanNotification::TorchChanged(on)),
        }
    }

    fn notify(&self, notification: ScanNotification) {
        // No subscribers is fine.
        let _ = self.notifications.send(notification);
    }

    fn spawn_acquisition(&self, session: ScanSessionId, constraints: CameraConstraints) {
        let inputs = self.inputs.clone();
        let camera = Arc::clone(&self.camera);
        tokio::spawn(async move {
            let input = match camera.open(&constraints).await {
                Ok(stream) => ScanInput::CameraOpened { session, stream },
                Err(err) => ScanInput::CameraFailed {
                    session,
                    message: err.to_string(),
                },
            };
            if let Err(input) = send_weak(&inputs, input) {
                if let ScanInput::CameraOpened { stream, .. } = input {
                    stream.release();
                }
            }
        });
    }

    fn spawn_decode_loop(&self, session: ScanSessionId, stream: Arc<dyn CameraStream>) {
        let inputs = self.inputs.clone();
        let decoder = Arc::clone(&self.decoder);
        tokio::spawn(async move {
            let mut evaluated = 0usize;
            while let Some(frame) = stream.next_frame().await {
                evaluated += 1;
                let input = match decoder.decode(&frame) {
                    Ok(None) => continue,
                    Ok(Some(payload)) => ScanInput::FrameDecoded { session, payload },
                    Err(err) => ScanInput::FrameFailed {
                        session,
                        message: err.to_string(),
                    },
                };
                let _ = send_weak(&inputs, input);
                break;
            }
            debug!(%session, frames = evaluated, "decode loop finished");
        });
    }
}

/// Background tasks never keep the service alive; they only reach it while a handle exists.
fn send_weak(
    inputs: &mpsc::WeakUnboundedSender<ScanInput>,
    input: ScanInput,
) -> Result<(), ScanInput> {
    match inputs.upgrade() {
        Some(sender) => sender.send(input).map_err(|err| err.0),
        None => Err(input),
    }
}

#[cfg(test)]
#[path = "tests/service_tests.rs"]
mod tests;
