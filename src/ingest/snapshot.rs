//! Snapshot polling source.
//!
//! Fetches a still image from the channel's `/picture` endpoint at most once
//! per `interval`. Cameras that cannot keep an RTSP session open can still be
//! watched this way, at a lower frame rate.

use std::time::{Duration, Instant};

use anyhow::Result;

use super::FrameSource;
use crate::camera::snapshot::fetch_frame;
use crate::frame::Frame;

pub struct SnapshotSource {
    agent: ureq::Agent,
    url: String,
    interval: Duration,
    last_fetch: Option<Instant>,
}

impl SnapshotSource {
    pub fn new(url: String, interval: Duration, request_timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(request_timeout).build(),
            url,
            interval,
            last_fetch: None,
        }
    }

    fn wait_for_slot(&self) {
        if let Some(last) = self.last_fetch {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }
    }
}

impl FrameSource for SnapshotSource {
    fn next_frame(&mut self) -> Result<Frame> {
        self.wait_for_slot();
        self.last_fetch = Some(Instant::now());
        fetch_frame(&self.agent, &self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_endpoint_is_a_read_error() {
        let mut source = SnapshotSource::new(
            "http://192.0.2.1:9/ISAPI/Streaming/channels/102/picture".to_string(),
            Duration::from_millis(10),
            Duration::from_millis(50),
        );
        assert!(source.next_frame().is_err());
    }
}
