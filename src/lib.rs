//! camwatch
//!
//! Pulls frames from cameras behind an NVR and overlays object detections
//! in near real time.
//!
//! # Architecture
//!
//! Every camera has its own capture worker that keeps only the newest frame
//! in a single-slot mailbox. One controller loop polls the mailboxes at its
//! own pace, runs detection on whatever is fresh and presents the annotated
//! image on a surface named after the camera. Frames the controller had no
//! time for are discarded.
//!
//! # Module Structure
//!
//! - `camera`: camera identity, NVR URLs, discovery and snapshots
//! - `mailbox`: single-slot overwrite hand-off
//! - `ingest`: frame sources (RTSP stream, snapshot polling)
//! - `capture`: per-camera worker threads
//! - `detect`: preprocessing, inference backends, decoding, suppression
//! - `render`: detection overlay
//! - `display`: display sinks
//! - `orchestrator`: the controller loop
//! - `config`: settings file and environment overrides

pub mod camera;
pub mod cancel;
pub mod capture;
pub mod config;
pub mod detect;
pub mod display;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod mailbox;
pub mod orchestrator;
pub mod render;

pub use camera::{CameraHandle, StreamState};
pub use cancel::CancellationToken;
pub use capture::{Camera, CaptureStats};
pub use config::CamwatchConfig;
pub use detect::{
    Detection, DetectionEngine, DetectionSet, EngineSettings, InferenceBackend, Labels,
    StubBackend, Thresholds,
};
pub use display::{Display, ImageDirDisplay, LogDisplay};
pub use error::{Error, Result};
pub use frame::Frame;
pub use ingest::{CaptureMode, Connector, FrameSource, NvrConnector};
pub use orchestrator::{Orchestrator, OrchestratorSettings, RunSummary, StopReason};
pub use render::Overlay;
