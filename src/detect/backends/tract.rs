#![cfg(feature = "backend-tract")]

use std::path::Path;

use tract_onnx::prelude::*;

use crate::detect::backend::{InferenceBackend, InputTensor, RawOutput};
use crate::error::{Error, Result};

/// Tract-based backend for ONNX inference.
///
/// Loads a local model file once; forward passes run on a shared plan.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk with a fixed `1x3xHxW` input.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let load_err =
            |stage: &str, e: TractError| Error::ModelLoad(format!("{} {}: {}", stage, model_path.display(), e));

        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(|e| load_err("failed to load ONNX model from", e))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .map_err(|e| load_err("failed to set input fact for", e))?
            .into_optimized()
            .map_err(|e| load_err("failed to optimize", e))?
            .into_runnable()
            .map_err(|e| load_err("failed to build runnable plan for", e))?;

        Ok(Self {
            model,
            width,
            height,
        })
    }

    fn build_input(&self, input: &InputTensor) -> Result<Tensor> {
        if input.width != self.width || input.height != self.height {
            return Err(Error::Inference(format!(
                "input {}x{} does not match model input {}x{}",
                input.width, input.height, self.width, self.height
            )));
        }
        let tensor = tract_ndarray::Array4::from_shape_vec(input.shape(), input.data.clone())
            .map_err(|e| Error::Inference(format!("input tensor shape: {}", e)))?;
        Ok(tensor.into_tensor())
    }
}

/// Flatten every leading axis into rows; the last axis is the row width.
fn to_raw_output(tensor: &Tensor) -> Result<RawOutput> {
    let view = tensor
        .to_array_view::<f32>()
        .map_err(|e| Error::Inference(format!("model output tensor was not f32: {}", e)))?;
    let cols = view.shape().last().copied().unwrap_or(0);
    Ok(RawOutput::new(cols, view.iter().copied().collect()))
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn forward(&self, input: &InputTensor) -> Result<Vec<RawOutput>> {
        let input = self.build_input(input)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| Error::Inference(format!("ONNX inference failed: {}", e)))?;
        outputs.iter().map(|output| to_raw_output(output)).collect()
    }
}
