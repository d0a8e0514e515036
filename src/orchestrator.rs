//! Controller loop.
//!
//! `Setup -> Running -> Draining -> Terminated`. While running, each pass
//! visits the active cameras in registration order, runs detection on any
//! fresh frame and presents the annotated image on the camera's surface.
//! The pass never waits on a camera; cameras whose stream failed are
//! dropped from the active set.

use std::time::Duration;

use crate::camera::{CameraHandle, StreamState};
use crate::cancel::CancellationToken;
use crate::capture::Camera;
use crate::config::CamwatchConfig;
use crate::detect::DetectionEngine;
use crate::display::Display;
use crate::ingest::Connector;
use crate::render::Overlay;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Running,
    Draining,
    Terminated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    QuitKey,
    NoActiveCameras,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrchestratorSettings {
    pub stop_timeout: Duration,
    pub idle_poll: Duration,
    pub first_frame_grace: Duration,
    pub quit_key: char,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(2),
            idle_poll: Duration::from_millis(1),
            first_frame_grace: Duration::from_secs(10),
            quit_key: 'q',
        }
    }
}

impl From<&CamwatchConfig> for OrchestratorSettings {
    fn from(config: &CamwatchConfig) -> Self {
        Self {
            stop_timeout: config.capture.stop_timeout,
            idle_poll: config.capture.idle_poll,
            first_frame_grace: config.capture.first_frame_grace,
            quit_key: config.display.quit_key,
        }
    }
}

/// Per-camera outcome of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraReport {
    pub name: String,
    pub frames_shown: u64,
    pub detections: u64,
    pub outcome: CameraOutcome,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CameraOutcome {
    /// Never started; the stream could not be opened.
    FailedToStart(String),
    /// The stream failed while running.
    Lost,
    /// Still streaming when the run drained.
    Drained,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub reason: StopReason,
    pub passes: u64,
    pub cameras: Vec<CameraReport>,
}

impl RunSummary {
    pub fn report(&self, name: &str) -> Option<&CameraReport> {
        self.cameras.iter().find(|report| report.name == name)
    }
}

struct Active {
    camera: Camera,
    frames_shown: u64,
    detections: u64,
    grace_warned: bool,
}

impl Active {
    fn into_report(self, outcome: CameraOutcome) -> CameraReport {
        CameraReport {
            name: self.camera.name().to_string(),
            frames_shown: self.frames_shown,
            detections: self.detections,
            outcome,
        }
    }
}

pub struct Orchestrator<D: Display> {
    engine: DetectionEngine,
    connector: Box<dyn Connector>,
    display: D,
    overlay: Overlay,
    settings: OrchestratorSettings,
    cancel: CancellationToken,
    phase: Phase,
}

impl<D: Display> Orchestrator<D> {
    pub fn new(
        engine: DetectionEngine,
        connector: Box<dyn Connector>,
        display: D,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            engine,
            connector,
            display,
            overlay: Overlay::new(),
            settings,
            cancel: CancellationToken::new(),
            phase: Phase::Setup,
        }
    }

    pub fn with_overlay(mut self, overlay: Overlay) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    /// Start every camera, loop until cancelled or out of cameras, then
    /// drain and close the display.
    pub fn run(&mut self, cameras: Vec<CameraHandle>) -> RunSummary {
        self.phase = Phase::Setup;
        let mut reports = Vec::new();
        let mut active = Vec::with_capacity(cameras.len());
        for handle in cameras {
            let mut camera = Camera::new(handle, self.settings.stop_timeout);
            match camera.start(self.connector.as_ref()) {
                Ok(()) => active.push(Active {
                    camera,
                    frames_shown: 0,
                    detections: 0,
                    grace_warned: false,
                }),
                Err(err) => {
                    log::error!("{}; excluding camera", err);
                    reports.push(CameraReport {
                        name: camera.name().to_string(),
                        frames_shown: 0,
                        detections: 0,
                        outcome: CameraOutcome::FailedToStart(err.to_string()),
                    });
                }
            }
        }
        log::info!("watching {} camera(s)", active.len());

        self.phase = Phase::Running;
        let mut passes = 0;
        let reason = loop {
            if active.is_empty() {
                log::warn!("no active cameras left");
                break StopReason::NoActiveCameras;
            }
            passes += 1;
            let produced = self.pass(&mut active, &mut reports);

            if let Some(key) = self.display.poll_key() {
                if key.eq_ignore_ascii_case(&self.settings.quit_key) {
                    break StopReason::QuitKey;
                }
            }
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if !produced {
                std::thread::sleep(self.settings.idle_poll);
            }
        };
        log::info!("stopping after {} passes ({:?})", passes, reason);

        self.phase = Phase::Draining;
        for mut entry in active {
            entry.camera.stop();
            reports.push(entry.into_report(CameraOutcome::Drained));
        }

        self.phase = Phase::Terminated;
        self.display.close();

        RunSummary {
            reason,
            passes,
            cameras: reports,
        }
    }

    /// One visit of every active camera. True when any camera had a frame.
    fn pass(&mut self, active: &mut Vec<Active>, reports: &mut Vec<CameraReport>) -> bool {
        let mut produced = false;
        let mut idx = 0;
        while idx < active.len() {
            if active[idx].camera.state() == StreamState::Stopped {
                let mut entry = active.remove(idx);
                log::warn!("camera '{}' stopped streaming; dropping it", entry.camera.name());
                entry.camera.stop();
                reports.push(entry.into_report(CameraOutcome::Lost));
                continue;
            }

            let entry = &mut active[idx];
            match entry.camera.latest_frame() {
                Some(frame) => {
                    produced = true;
                    let detections = self.engine.detect(&frame);
                    entry.detections += detections.len() as u64;
                    if let Some(mut image) = frame.into_image() {
                        self.overlay.draw(&mut image, &detections);
                        match self.display.show(entry.camera.name(), &image) {
                            Ok(()) => entry.frames_shown += 1,
                            Err(err) => log::warn!(
                                "could not present '{}': {:#}",
                                entry.camera.name(),
                                err
                            ),
                        }
                    }
                }
                None => self.check_first_frame(entry),
            }
            idx += 1;
        }
        produced
    }

    fn check_first_frame(&self, entry: &mut Active) {
        if entry.grace_warned {
            return;
        }
        let Some(stats) = entry.camera.stats() else {
            return;
        };
        if stats.frames_captured == 0 && stats.since_start >= self.settings.first_frame_grace {
            log::warn!(
                "camera '{}' has produced no frame after {:?}",
                entry.camera.name(),
                stats.since_start
            );
            entry.grace_warned = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{EngineSettings, Labels, StubBackend};
    use crate::display::LogDisplay;
    use crate::error::{Error, Result};
    use crate::frame::Frame;
    use crate::ingest::FrameSource;

    struct BlankSource;

    impl FrameSource for BlankSource {
        fn next_frame(&mut self) -> anyhow::Result<Frame> {
            std::thread::sleep(Duration::from_millis(2));
            Ok(Frame::new(vec![0; 8 * 8 * 3], 8, 8))
        }
    }

    struct RefuseNamed(&'static str);

    impl Connector for RefuseNamed {
        fn open(&self, camera: &CameraHandle) -> Result<Box<dyn FrameSource>> {
            if camera.name == self.0 {
                return Err(Error::stream_open(&camera.name, "refused"));
            }
            Ok(Box::new(BlankSource))
        }
    }

    fn engine() -> DetectionEngine {
        DetectionEngine::new(
            Box::new(StubBackend::new()),
            Labels::default(),
            EngineSettings::default(),
        )
    }

    #[test]
    fn all_cameras_refused_terminates_immediately() {
        let mut orchestrator = Orchestrator::new(
            engine(),
            Box::new(RefuseNamed("a")),
            LogDisplay::new(),
            OrchestratorSettings::default(),
        );
        let summary = orchestrator.run(vec![CameraHandle::new(1, "a", "stub://a")]);
        assert_eq!(summary.reason, StopReason::NoActiveCameras);
        assert_eq!(summary.passes, 0);
        assert!(matches!(
            summary.report("a").unwrap().outcome,
            CameraOutcome::FailedToStart(_)
        ));
        assert_eq!(orchestrator.phase(), Phase::Terminated);
    }

    #[test]
    fn cancellation_drains_running_cameras() {
        let mut orchestrator = Orchestrator::new(
            engine(),
            Box::new(RefuseNamed("b")),
            LogDisplay::new(),
            OrchestratorSettings::default(),
        );
        let cancel = orchestrator.cancellation();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            cancel.cancel();
        });
        let summary = orchestrator.run(vec![
            CameraHandle::new(1, "a", "stub://a"),
            CameraHandle::new(2, "b", "stub://b"),
        ]);
        canceller.join().unwrap();

        assert_eq!(summary.reason, StopReason::Cancelled);
        let a = summary.report("a").unwrap();
        assert_eq!(a.outcome, CameraOutcome::Drained);
        assert!(a.frames_shown > 0);
        assert_eq!(orchestrator.display().shown("a"), a.frames_shown);
        assert_eq!(orchestrator.display().shown("b"), 0);
    }
}
