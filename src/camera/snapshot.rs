//! Still image retrieval from a channel's `/picture` endpoint.

use std::io::Read;

use anyhow::{anyhow, Context};

use super::discovery::{describe, http_agent};
use super::{redact, snapshot_url};
use crate::config::NvrSettings;
use crate::frame::Frame;

const MAX_SNAPSHOT_BYTES: u64 = 16 * 1024 * 1024;

/// Fetch one still image for camera `id`. Failures are logged and yield
/// `None`.
pub fn fetch_snapshot(nvr: &NvrSettings, id: u32) -> Option<Frame> {
    let url = snapshot_url(nvr, id);
    match fetch_frame(&http_agent(nvr), &url) {
        Ok(frame) => Some(frame),
        Err(err) => {
            log::error!("error getting image from {}: {:#}", redact(&url), err);
            None
        }
    }
}

/// GET `url` and decode the JPEG/PNG payload into an RGB frame.
pub(crate) fn fetch_frame(agent: &ureq::Agent, url: &str) -> anyhow::Result<Frame> {
    let response = agent
        .get(url)
        .call()
        .map_err(|e| anyhow!("snapshot request failed: {}", describe(&e)))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_SNAPSHOT_BYTES)
        .read_to_end(&mut bytes)
        .context("read snapshot body")?;
    decode_image(&bytes)
}

pub(crate) fn decode_image(bytes: &[u8]) -> anyhow::Result<Frame> {
    if bytes.is_empty() {
        return Err(anyhow!("empty snapshot payload"));
    }
    let image = image::load_from_memory(bytes).context("decode snapshot")?;
    Ok(Frame::from_image(image.into_rgb8()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    #[test]
    fn decodes_png_payload() {
        let mut png = Vec::new();
        RgbImage::from_pixel(8, 6, image::Rgb([1, 2, 3]))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let frame = decode_image(&png).unwrap();
        assert_eq!((frame.width, frame.height), (8, 6));
        assert!(frame.is_well_formed());
        assert_eq!(&frame.data()[..3], &[1, 2, 3]);
    }

    #[test]
    fn rejects_empty_and_garbage_payloads() {
        assert!(decode_image(&[]).is_err());
        assert!(decode_image(b"definitely not an image").is_err());
    }
}
