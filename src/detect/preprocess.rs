use image::imageops::{self, FilterType};

use super::backend::InputTensor;
use crate::frame::Frame;

/// Resize `frame` to `width` x `height` and lay it out as NCHW RGB scaled
/// to `[0, 1]`. Returns `None` for malformed frames.
pub fn preprocess(frame: &Frame, width: u32, height: u32) -> Option<InputTensor> {
    if width == 0 || height == 0 {
        return None;
    }
    let view = frame.as_image()?;
    let resized;
    let pixels: &[u8] = if frame.width == width && frame.height == height {
        frame.data()
    } else {
        resized = imageops::resize(&view, width, height, FilterType::Triangle);
        resized.as_raw()
    };

    let plane = width as usize * height as usize;
    let mut data = vec![0f32; plane * 3];
    for (idx, rgb) in pixels.chunks_exact(3).enumerate() {
        for (channel, &value) in rgb.iter().enumerate() {
            data[channel * plane + idx] = f32::from(value) / 255.0;
        }
    }

    Some(InputTensor {
        width,
        height,
        data,
    })
}
