use crate::config::ModelSettings;
use crate::error::{Error, Result};
use crate::frame::Frame;

use super::backend::InferenceBackend;
use super::decode::{decode_outputs, suppress, RowLayout};
use super::labels::Labels;
use super::preprocess::preprocess;
use super::result::{Detection, DetectionSet};
use super::Thresholds;

/// Model input geometry, row layout and thresholds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineSettings {
    pub input_width: u32,
    pub input_height: u32,
    pub layout: RowLayout,
    pub thresholds: Thresholds,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            input_width: 320,
            input_height: 320,
            layout: RowLayout::default(),
            thresholds: Thresholds::default(),
        }
    }
}

impl From<&ModelSettings> for EngineSettings {
    fn from(model: &ModelSettings) -> Self {
        Self {
            input_width: model.input_width,
            input_height: model.input_height,
            layout: RowLayout {
                objectness: model.objectness,
            },
            thresholds: model.thresholds,
        }
    }
}

/// Loaded model plus labels. Immutable once built and shareable across
/// threads.
pub struct DetectionEngine {
    backend: Box<dyn InferenceBackend>,
    labels: Labels,
    settings: EngineSettings,
}

impl DetectionEngine {
    pub fn new(backend: Box<dyn InferenceBackend>, labels: Labels, settings: EngineSettings) -> Self {
        Self {
            backend,
            labels,
            settings,
        }
    }

    /// Load the configured network and labels.
    pub fn load(model: &ModelSettings) -> Result<Self> {
        check_artifacts(model)?;
        let labels = Labels::load(&model.labels)?;
        let backend = load_backend(model)?;
        log::info!(
            "loaded {} model {} ({} labels, input {}x{})",
            backend.name(),
            model.network.display(),
            labels.len(),
            model.input_width,
            model.input_height
        );
        Ok(Self::new(backend, labels, EngineSettings::from(model)))
    }

    /// Detect objects in `frame`.
    ///
    /// Malformed frames and backend failures yield an empty set; the latter
    /// is logged.
    pub fn detect(&self, frame: &Frame) -> DetectionSet {
        let settings = &self.settings;
        let Some(input) = preprocess(frame, settings.input_width, settings.input_height) else {
            log::debug!(
                "skipping malformed frame {}x{} ({} bytes)",
                frame.width,
                frame.height,
                frame.byte_len()
            );
            return DetectionSet::default();
        };

        let outputs = match self.backend.forward(&input) {
            Ok(outputs) => outputs,
            Err(err) => {
                log::warn!("{}", err);
                return DetectionSet::default();
            }
        };

        let candidates = decode_outputs(
            &outputs,
            settings.layout,
            frame.width,
            frame.height,
            settings.thresholds.confidence,
        );
        let kept = suppress(
            &candidates,
            settings.thresholds.confidence,
            settings.thresholds.iou,
        );

        DetectionSet::new(
            kept.into_iter()
                .map(|candidate| Detection {
                    x: candidate.rect.x,
                    y: candidate.rect.y,
                    width: candidate.rect.width,
                    height: candidate.rect.height,
                    class_id: candidate.class_id,
                    label: self.labels.name(candidate.class_id),
                    confidence: candidate.confidence,
                })
                .collect(),
        )
    }
}

fn check_artifacts(model: &ModelSettings) -> Result<()> {
    if !model.network.is_file() {
        return Err(Error::ModelLoad(format!(
            "network file {} not found",
            model.network.display()
        )));
    }
    if let Some(weights) = &model.weights {
        if !weights.is_file() {
            return Err(Error::ModelLoad(format!(
                "weights file {} not found",
                weights.display()
            )));
        }
    }
    Ok(())
}

#[cfg(feature = "backend-tract")]
fn load_backend(model: &ModelSettings) -> Result<Box<dyn InferenceBackend>> {
    let backend =
        super::backends::TractBackend::new(&model.network, model.input_width, model.input_height)?;
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn load_backend(model: &ModelSettings) -> Result<Box<dyn InferenceBackend>> {
    Err(Error::ModelLoad(format!(
        "cannot run {}: built without the backend-tract feature",
        model.network.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{RawOutput, StubBackend};
    use std::path::PathBuf;

    fn engine(backend: StubBackend) -> DetectionEngine {
        DetectionEngine::new(
            Box::new(backend),
            Labels::parse("person\nbicycle\ncar"),
            EngineSettings::default(),
        )
    }

    fn frame() -> Frame {
        Frame::new(vec![0; 640 * 480 * 3], 640, 480)
    }

    #[test]
    fn detects_and_labels_boxes() {
        let output = RawOutput::from_rows(&[vec![0.5, 0.5, 0.25, 0.25, 0.1, 0.2, 0.9]]);
        let set = engine(StubBackend::with_outputs(vec![output])).detect(&frame());
        assert_eq!(set.len(), 1);
        let detection = &set.as_slice()[0];
        assert_eq!(
            (detection.x, detection.y, detection.width, detection.height),
            (240, 180, 160, 120)
        );
        assert_eq!(detection.label, "car");
        assert_eq!(detection.class_id, 2);
    }

    #[test]
    fn overlapping_boxes_collapse_to_the_strongest() {
        let output = RawOutput::from_rows(&[
            vec![0.5, 0.5, 0.25, 0.25, 0.8],
            vec![0.51, 0.5, 0.25, 0.25, 0.95],
            vec![0.1, 0.1, 0.05, 0.05, 0.6],
        ]);
        let set = engine(StubBackend::with_outputs(vec![output])).detect(&frame());
        let confidences: Vec<f32> = set.iter().map(|d| d.confidence).collect();
        assert_eq!(confidences, vec![0.95, 0.6]);
    }

    #[test]
    fn no_survivors_is_an_empty_set() {
        let output = RawOutput::from_rows(&[vec![0.5, 0.5, 0.25, 0.25, 0.3]]);
        assert!(engine(StubBackend::with_outputs(vec![output]))
            .detect(&frame())
            .is_empty());
    }

    #[test]
    fn backend_failure_yields_empty_set() {
        let engine = engine(StubBackend::failing("device lost"));
        assert!(engine.detect(&frame()).is_empty());
    }

    #[test]
    fn malformed_frame_skips_inference() {
        let engine = DetectionEngine::new(
            Box::new(StubBackend::new()),
            Labels::default(),
            EngineSettings::default(),
        );
        assert!(engine.detect(&Frame::new(vec![1, 2, 3], 4, 4)).is_empty());
        assert!(engine.detect(&Frame::new(Vec::new(), 0, 0)).is_empty());
    }

    #[test]
    fn missing_network_is_a_model_load_error() {
        let model = ModelSettings {
            network: PathBuf::from("/nonexistent/yolo.onnx"),
            weights: None,
            labels: PathBuf::from("/nonexistent/coco.names"),
            input_width: 320,
            input_height: 320,
            objectness: false,
            thresholds: Thresholds::default(),
        };
        let err = DetectionEngine::load(&model).err().expect("load must fail");
        assert!(matches!(err, Error::ModelLoad(_)));
    }
}
