use thiserror::Error;

/// Failures surfaced by the capture and detection core.
///
/// Per-camera variants carry the camera name so log lines stay attributable
/// once several workers are running.
#[derive(Debug, Error)]
pub enum Error {
    #[error("camera '{camera}': stream could not be opened: {reason}")]
    StreamOpen { camera: String, reason: String },

    #[error("camera '{camera}': stream read failed: {reason}")]
    StreamRead { camera: String, reason: String },

    #[error("camera discovery failed: {0}")]
    Discovery(String),

    #[error("model artifacts could not be loaded: {0}")]
    ModelLoad(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

impl Error {
    pub fn stream_open(camera: &str, reason: impl ToString) -> Self {
        Self::StreamOpen {
            camera: camera.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn stream_read(camera: &str, reason: impl ToString) -> Self {
        Self::StreamRead {
            camera: camera.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
