//! Object detection.
//!
//! `DetectionEngine` turns a frame into a `DetectionSet`:
//! - `preprocess`: resize to the model input and lay out as NCHW `f32`
//! - `InferenceBackend`: one forward pass
//! - `decode`: score filtering, coordinate rescaling and overlap suppression
//! - `Labels`: class id to display name

mod backend;
mod backends;
mod decode;
mod engine;
mod labels;
mod preprocess;
mod result;

pub use backend::{InferenceBackend, InputTensor, RawOutput};
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use decode::{decode_outputs, iou, suppress, BoxRect, Candidate, RowLayout};
pub use engine::{DetectionEngine, EngineSettings};
pub use labels::Labels;
pub use preprocess::preprocess;
pub use result::{Detection, DetectionSet};

/// Score and overlap thresholds.
///
/// `confidence` is both the per-row score cut and the suppression score cut.
/// Candidates are kept on a strictly greater score; a candidate is suppressed
/// on a strictly greater IoU.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    pub confidence: f32,
    pub iou: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            confidence: 0.5,
            iou: 0.4,
        }
    }
}
