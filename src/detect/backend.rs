use crate::error::Result;

/// Preprocessed model input: one image, NCHW, RGB, values in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct InputTensor {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl InputTensor {
    /// `(batch, channels, height, width)`.
    pub fn shape(&self) -> [usize; 4] {
        [1, 3, self.height as usize, self.width as usize]
    }
}

/// One output layer, as rows of `[cx, cy, w, h, (objectness,) scores...]`.
///
/// Box values are fractions of the model input.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawOutput {
    cols: usize,
    data: Vec<f32>,
}

impl RawOutput {
    /// Wrap a row-major buffer. Trailing values that do not fill a row are
    /// ignored.
    pub fn new(cols: usize, data: Vec<f32>) -> Self {
        Self { cols, data }
    }

    pub fn from_rows(rows: &[Vec<f32>]) -> Self {
        let cols = rows.first().map_or(0, Vec::len);
        let data = rows
            .iter()
            .filter(|row| row.len() == cols)
            .flatten()
            .copied()
            .collect();
        Self { cols, data }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact panics on zero.
        self.data.chunks_exact(self.cols.max(1)).filter(move |_| self.cols > 0)
    }
}

/// Forward pass of a loaded network.
///
/// Backends are loaded once and shared read-only, so `forward` takes `&self`.
pub trait InferenceBackend: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run the network on one preprocessed image.
    fn forward(&self, input: &InputTensor) -> Result<Vec<RawOutput>>;
}
