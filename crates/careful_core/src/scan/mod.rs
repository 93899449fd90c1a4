//! Barcode scan sessions: a pure controller plus the task that drives it.

pub mod camera;
pub mod controller;
pub mod scripted;
pub mod service;

pub use camera::{
    BarcodeDecoder, CameraConstraints, CameraProvider, CameraStream, DecodeError, FacingMode,
    VideoFrame,
};
pub use controller::{ScanInput, ScanOutput, ScanSessionController, ScanState};
pub use scripted::{text_frame, ScriptedCamera, ScriptedStream, Utf8PayloadDecoder};
pub use service::{ScanHandle, ScanNotification, ScanService};
