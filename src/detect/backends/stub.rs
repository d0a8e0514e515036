use crate::detect::backend::{InferenceBackend, InputTensor, RawOutput};
use crate::error::{Error, Result};

/// Scripted backend for tests and model-less runs.
///
/// Returns the same outputs for every frame, or fails every call.
#[derive(Debug, Default)]
pub struct StubBackend {
    outputs: Vec<RawOutput>,
    failure: Option<String>,
}

impl StubBackend {
    /// A backend that never finds anything.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outputs(outputs: Vec<RawOutput>) -> Self {
        Self {
            outputs,
            ..Self::default()
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }
}

impl InferenceBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn forward(&self, _input: &InputTensor) -> Result<Vec<RawOutput>> {
        match &self.failure {
            Some(reason) => Err(Error::Inference(reason.clone())),
            None => Ok(self.outputs.clone()),
        }
    }
}
