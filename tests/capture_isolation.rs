use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use camwatch::config::{CaptureSettings, NvrSettings};
use camwatch::{Camera, CameraHandle, CaptureMode, Connector, Frame, FrameSource, NvrConnector, StreamState};

fn nvr() -> NvrSettings {
    NvrSettings {
        host: "127.0.0.1".to_string(),
        http_port: 8080,
        rtsp_port: 554,
        username: "admin".to_string(),
        password: "secret".to_string(),
        channel: 2,
        request_timeout: Duration::from_millis(200),
    }
}

fn capture() -> CaptureSettings {
    CaptureSettings {
        mode: CaptureMode::Stream,
        target_fps: 200,
        read_timeout: Duration::from_millis(200),
        stop_timeout: Duration::from_millis(500),
        first_frame_grace: Duration::from_secs(1),
        idle_poll: Duration::from_millis(1),
    }
}

fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

#[test]
fn failing_camera_does_not_affect_its_neighbour() {
    let connector = NvrConnector::new(nvr(), capture());
    let mut healthy = Camera::new(
        CameraHandle::new(1, "healthy", "stub://healthy"),
        Duration::from_millis(500),
    );
    let mut flaky = Camera::new(
        CameraHandle::new(2, "flaky", "stub://flaky?fail_after=3"),
        Duration::from_millis(500),
    );

    healthy.start(&connector).expect("start healthy");
    flaky.start(&connector).expect("start flaky");

    assert!(wait_until(Duration::from_secs(2), || flaky.state() == StreamState::Stopped));
    assert_eq!(healthy.state(), StreamState::Streaming);

    let before = healthy.stats().expect("stats").frames_captured;
    assert!(wait_until(Duration::from_secs(2), || {
        healthy.stats().expect("stats").frames_captured > before
    }));
    assert!(wait_until(Duration::from_secs(1), || healthy.latest_frame().is_some()));

    healthy.stop();
    flaky.stop();
    assert_eq!(healthy.state(), StreamState::Stopped);
}

#[test]
fn latest_frame_never_repeats_and_skips_stale_frames() {
    let connector = NvrConnector::new(nvr(), capture());
    let mut camera = Camera::new(
        CameraHandle::new(1, "drift", "stub://drift"),
        Duration::from_millis(500),
    );
    camera.start(&connector).expect("start");

    // Let several frames pile up behind an idle consumer.
    std::thread::sleep(Duration::from_millis(100));
    let first = camera.latest_frame().expect("a frame is waiting");
    // The slot was emptied by the fetch.
    let immediate = camera.latest_frame();
    if let Some(next) = immediate {
        assert_ne!(first.data(), next.data());
    }
    assert!(camera.stats().expect("stats").frames_captured > 1);

    camera.stop();
}

struct StuckSource {
    released: Arc<AtomicBool>,
}

impl FrameSource for StuckSource {
    fn next_frame(&mut self) -> anyhow::Result<Frame> {
        while !self.released.load(Ordering::Acquire) {
            std::thread::sleep(Duration::from_millis(5));
        }
        Err(anyhow::anyhow!("released"))
    }
}

struct StuckConnector {
    released: Arc<AtomicBool>,
}

impl Connector for StuckConnector {
    fn open(&self, _camera: &CameraHandle) -> camwatch::Result<Box<dyn FrameSource>> {
        Ok(Box::new(StuckSource {
            released: Arc::clone(&self.released),
        }))
    }
}

#[test]
fn stop_is_bounded_when_a_read_hangs() {
    let released = Arc::new(AtomicBool::new(false));
    let connector = StuckConnector {
        released: Arc::clone(&released),
    };
    let mut camera = Camera::new(
        CameraHandle::new(9, "stuck", "stub://stuck"),
        Duration::from_millis(100),
    );
    camera.start(&connector).expect("start");

    let started = Instant::now();
    camera.stop();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(2));
    assert_eq!(camera.state(), StreamState::Stopped);
    assert!(camera.latest_frame().is_none());

    // Let the detached worker finish.
    released.store(true, Ordering::Release);
}

struct BlankSource;

impl FrameSource for BlankSource {
    fn next_frame(&mut self) -> anyhow::Result<Frame> {
        std::thread::sleep(Duration::from_millis(2));
        Ok(Frame::new(vec![0; 4 * 4 * 3], 4, 4))
    }
}

/// First session hangs until released, later sessions stream normally.
struct HangsOnceConnector {
    released: Arc<AtomicBool>,
    opened: AtomicUsize,
}

impl Connector for HangsOnceConnector {
    fn open(&self, _camera: &CameraHandle) -> camwatch::Result<Box<dyn FrameSource>> {
        if self.opened.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(Box::new(StuckSource {
                released: Arc::clone(&self.released),
            }))
        } else {
            Ok(Box::new(BlankSource))
        }
    }
}

#[test]
fn detached_worker_does_not_stop_a_restarted_camera() {
    let released = Arc::new(AtomicBool::new(false));
    let connector = HangsOnceConnector {
        released: Arc::clone(&released),
        opened: AtomicUsize::new(0),
    };
    let mut camera = Camera::new(
        CameraHandle::new(4, "gate", "stub://gate"),
        Duration::from_millis(50),
    );

    camera.start(&connector).expect("first start");
    std::thread::sleep(Duration::from_millis(50));
    camera.stop();
    camera.start(&connector).expect("restart");
    assert!(wait_until(Duration::from_secs(1), || camera
        .stats()
        .is_some_and(|stats| stats.frames_captured > 0)));

    // The old read now fails in the detached worker.
    released.store(true, Ordering::Release);
    std::thread::sleep(Duration::from_millis(100));

    assert_eq!(camera.state(), StreamState::Streaming);
    assert!(camera.latest_frame().is_some());
    camera.stop();
}
