//! Decoded video frames.
//!
//! A `Frame` is a packed RGB8 buffer. It carries no timestamp: the capture
//! path is latest-frame-wins, so ordering only matters inside one camera's
//! mailbox.

use image::RgbImage;

/// Bytes per pixel of every frame that flows through the crate.
pub const CHANNELS: usize = 3;

/// Decoded RGB8 image buffer.
///
/// Not `Clone`: a frame moves from the capture worker through the mailbox to
/// the consumer and is owned by one side at a time.
#[derive(Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Wrap a decoded image without copying the pixel buffer.
    pub fn from_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// True when the dimensions are non-zero and match the buffer length.
    pub fn is_well_formed(&self) -> bool {
        let Some(expected) = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|px| px.checked_mul(CHANNELS))
        else {
            return false;
        };
        expected != 0 && self.data.len() == expected
    }

    /// Borrowing conversion for read-only image operations.
    pub fn as_image(&self) -> Option<image::ImageBuffer<image::Rgb<u8>, &[u8]>> {
        if !self.is_well_formed() {
            return None;
        }
        image::ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())
    }

    /// Consume the frame into an owned image for drawing.
    pub fn into_image(self) -> Option<RgbImage> {
        if !self.is_well_formed() {
            return None;
        }
        RgbImage::from_raw(self.width, self.height, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_requires_matching_length() {
        assert!(Frame::new(vec![0; 2 * 2 * 3], 2, 2).is_well_formed());
        assert!(!Frame::new(vec![0; 11], 2, 2).is_well_formed());
        assert!(!Frame::new(Vec::new(), 0, 0).is_well_formed());
        assert!(!Frame::new(vec![0; 3], 1, 0).is_well_formed());
    }

    #[test]
    fn image_round_trip_keeps_pixels() {
        let mut image = RgbImage::new(4, 3);
        image.put_pixel(1, 2, image::Rgb([10, 20, 30]));
        let frame = Frame::from_image(image);
        assert_eq!(frame.width, 4);
        assert_eq!(frame.height, 3);
        assert_eq!(frame.byte_len(), 36);

        let view = frame.as_image().expect("view");
        assert_eq!(view.get_pixel(1, 2).0, [10, 20, 30]);

        let owned = frame.into_image().expect("owned");
        assert_eq!(owned.get_pixel(1, 2).0, [10, 20, 30]);
    }

    #[test]
    fn malformed_frame_has_no_image() {
        let frame = Frame::new(vec![1, 2, 3], 5, 5);
        assert!(frame.as_image().is_none());
        assert!(frame.into_image().is_none());
    }
}
