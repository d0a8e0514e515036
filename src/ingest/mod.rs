//! Frame sources.
//!
//! A camera is captured either as a continuous stream or by polling its
//! snapshot endpoint:
//! - `RtspSource`: RTSP via GStreamer, or a synthetic stream for `stub://` URLs
//! - `SnapshotSource`: single-shot HTTP stills fetched on an interval
//!
//! All sources produce `Frame` instances that the capture worker deposits
//! into the camera's mailbox. A source owns its connection; dropping it
//! releases the stream.

pub mod rtsp;
pub mod snapshot;

use std::time::Duration;

use crate::camera::{snapshot_url, CameraHandle};
use crate::config::{CaptureSettings, NvrSettings};
use crate::error::{Error, Result};
use crate::frame::Frame;

pub use rtsp::{RtspConfig, RtspSource};
pub use snapshot::SnapshotSource;

/// How frames are acquired from a camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureMode {
    /// Continuous decode of the camera's RTSP stream.
    Stream,
    /// Poll the still image endpoint every `interval`.
    Snapshot { interval: Duration },
}

/// Blocking producer of decoded frames.
///
/// `next_frame` may block for up to the source's read timeout. Any error is
/// terminal for the capture worker that owns the source.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> anyhow::Result<Frame>;
}

/// Opens a frame source for a camera handle.
pub trait Connector: Send + Sync {
    fn open(&self, camera: &CameraHandle) -> Result<Box<dyn FrameSource>>;
}

/// Connector backed by the configured NVR and capture mode.
#[derive(Clone, Debug)]
pub struct NvrConnector {
    nvr: NvrSettings,
    capture: CaptureSettings,
}

impl NvrConnector {
    pub fn new(nvr: NvrSettings, capture: CaptureSettings) -> Self {
        Self { nvr, capture }
    }
}

impl Connector for NvrConnector {
    fn open(&self, camera: &CameraHandle) -> Result<Box<dyn FrameSource>> {
        match self.capture.mode {
            CaptureMode::Stream => {
                let config = RtspConfig {
                    url: camera.stream_url.clone(),
                    target_fps: self.capture.target_fps,
                    read_timeout: self.capture.read_timeout,
                    ..RtspConfig::default()
                };
                let mut source =
                    RtspSource::new(config).map_err(|e| Error::stream_open(&camera.name, format!("{:#}", e)))?;
                source
                    .connect()
                    .map_err(|e| Error::stream_open(&camera.name, format!("{:#}", e)))?;
                Ok(Box::new(source))
            }
            CaptureMode::Snapshot { interval } => {
                let url = snapshot_url(&self.nvr, camera.id);
                let source = SnapshotSource::new(url, interval, self.nvr.request_timeout);
                Ok(Box::new(source))
            }
        }
    }
}
