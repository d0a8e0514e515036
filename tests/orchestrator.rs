use std::time::Duration;

use anyhow::Result;
use image::RgbImage;

use camwatch::config::{CaptureSettings, NvrSettings};
use camwatch::detect::RawOutput;
use camwatch::display::{Display, ImageDirDisplay};
use camwatch::orchestrator::{CameraOutcome, Phase};
use camwatch::{
    CameraHandle, CaptureMode, DetectionEngine, EngineSettings, Labels, NvrConnector,
    Orchestrator, OrchestratorSettings, StopReason, StubBackend,
};

/// Image directory sink that presses the quit key after `quit_after` images.
struct ScriptedKeys {
    inner: ImageDirDisplay,
    shown: Vec<String>,
    quit_after: usize,
    closed: bool,
}

impl Display for ScriptedKeys {
    fn show(&mut self, surface: &str, image: &RgbImage) -> Result<()> {
        self.shown.push(surface.to_string());
        self.inner.show(surface, image)
    }

    fn poll_key(&mut self) -> Option<char> {
        (self.shown.len() >= self.quit_after).then_some('Q')
    }

    fn close(&mut self) {
        self.closed = true;
        self.inner.close();
    }
}

fn connector() -> NvrConnector {
    let nvr = NvrSettings {
        host: "127.0.0.1".to_string(),
        http_port: 8080,
        rtsp_port: 554,
        username: "admin".to_string(),
        password: "secret".to_string(),
        channel: 2,
        request_timeout: Duration::from_millis(200),
    };
    let capture = CaptureSettings {
        mode: CaptureMode::Stream,
        target_fps: 100,
        read_timeout: Duration::from_millis(200),
        stop_timeout: Duration::from_millis(500),
        first_frame_grace: Duration::from_secs(1),
        idle_poll: Duration::from_millis(1),
    };
    NvrConnector::new(nvr, capture)
}

fn engine() -> DetectionEngine {
    let output = RawOutput::from_rows(&[vec![0.5, 0.5, 0.25, 0.25, 0.9]]);
    DetectionEngine::new(
        Box::new(StubBackend::with_outputs(vec![output])),
        Labels::parse("person"),
        EngineSettings::default(),
    )
}

#[test]
fn quit_key_drains_and_lost_cameras_are_dropped() {
    let dir = tempfile::tempdir().expect("temp dir");
    let display = ScriptedKeys {
        inner: ImageDirDisplay::new(dir.path()).expect("output dir"),
        shown: Vec::new(),
        quit_after: 25,
        closed: false,
    };
    let mut orchestrator = Orchestrator::new(
        engine(),
        Box::new(connector()),
        display,
        OrchestratorSettings::default(),
    );

    let summary = orchestrator.run(vec![
        CameraHandle::new(1, "Front Door", "stub://front"),
        CameraHandle::new(2, "flaky", "stub://flaky?fail_after=2"),
    ]);

    assert_eq!(summary.reason, StopReason::QuitKey);
    assert_eq!(orchestrator.phase(), Phase::Terminated);
    assert!(orchestrator.display().closed);

    let front = summary.report("Front Door").expect("front report");
    assert_eq!(front.outcome, CameraOutcome::Drained);
    assert!(front.frames_shown > 0);
    assert_eq!(front.detections, front.frames_shown);

    let flaky = summary.report("flaky").expect("flaky report");
    assert_eq!(flaky.outcome, CameraOutcome::Lost);
    assert!(flaky.frames_shown <= 2);

    assert!(dir.path().join("Front_Door.jpg").is_file());
}

#[test]
fn run_ends_when_every_camera_is_lost() {
    let dir = tempfile::tempdir().expect("temp dir");
    let display = ImageDirDisplay::new(dir.path()).expect("output dir");
    let mut orchestrator = Orchestrator::new(
        engine(),
        Box::new(connector()),
        display,
        OrchestratorSettings::default(),
    );

    let summary = orchestrator.run(vec![
        CameraHandle::new(1, "a", "stub://a?fail_after=1"),
        CameraHandle::new(2, "b", "stub://b?fail_after=1"),
    ]);

    assert_eq!(summary.reason, StopReason::NoActiveCameras);
    assert!(summary
        .cameras
        .iter()
        .all(|report| report.outcome == CameraOutcome::Lost));
}

#[test]
fn unopenable_cameras_are_excluded() {
    let dir = tempfile::tempdir().expect("temp dir");
    let display = ImageDirDisplay::new(dir.path()).expect("output dir");
    let mut orchestrator = Orchestrator::new(
        engine(),
        Box::new(connector()),
        display,
        OrchestratorSettings::default(),
    );
    let cancel = orchestrator.cancellation();
    cancel.cancel();

    let summary = orchestrator.run(vec![
        CameraHandle::new(1, "good", "stub://good"),
        CameraHandle::new(2, "bad", "stub://bad?fail_after=never"),
    ]);

    assert_eq!(summary.reason, StopReason::Cancelled);
    assert!(matches!(
        summary.report("bad").expect("bad report").outcome,
        CameraOutcome::FailedToStart(_)
    ));
    assert_eq!(
        summary.report("good").expect("good report").outcome,
        CameraOutcome::Drained
    );
}
