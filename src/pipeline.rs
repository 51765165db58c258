//! Capture -> detect -> render -> display loop.
//!
//! The loop is an explicit two-state machine. It starts `Running` once the camera and
//! model are ready, and moves to `Stopped` at an iteration boundary when the quit key
//! is seen, the stop signal fires, or an optional frame limit is reached. Every stage
//! blocks; errors from any stage end the run immediately.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::camera::FrameSource;
use crate::detect::{Detection, Detector};
use crate::display::Display;
use crate::render::{ImageCanvas, LabelFont, Renderer};

/// Why the loop left `Running`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    QuitKey,
    Interrupted,
    FrameLimit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped(StopReason),
}

/// Shared stop flag, checked at iteration boundaries.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal wired to Ctrl-C. Only one handler may be installed per process.
    pub fn install_ctrlc() -> Result<Self> {
        let signal = Self::new();
        let handle = signal.clone();
        ctrlc::set_handler(move || handle.trigger()).context("install Ctrl-C handler")?;
        Ok(signal)
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct LoopOptions {
    pub quit_key: char,
    pub key_wait: Duration,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            quit_key: 'q',
            key_wait: Duration::from_millis(42),
            max_frames: None,
        }
    }
}

/// Totals reported when the loop stops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub detections: u64,
    pub reason: StopReason,
}

#[derive(Serialize)]
struct FrameReport<'a> {
    frame: u64,
    detections: &'a [Detection],
}

/// Owns every per-process resource and drives one frame per `step`.
pub struct Pipeline {
    source: Box<dyn FrameSource>,
    detector: Detector,
    renderer: Renderer,
    font: LabelFont,
    display: Box<dyn Display>,
    options: LoopOptions,
    stop: StopSignal,
    report: Option<Box<dyn Write>>,
    state: LoopState,
    frames: u64,
    detections: u64,
}

impl Pipeline {
    /// Build a running loop. `source` must already be started.
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Detector,
        renderer: Renderer,
        font: LabelFont,
        display: Box<dyn Display>,
        options: LoopOptions,
    ) -> Self {
        Self {
            source,
            detector,
            renderer,
            font,
            display,
            options,
            stop: StopSignal::new(),
            report: None,
            state: LoopState::Running,
            frames: 0,
            detections: 0,
        }
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Write one JSON line per frame with that frame's detections.
    pub fn with_report(mut self, writer: Box<dyn Write>) -> Self {
        self.report = Some(writer);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Run one iteration, or return the terminal state if already stopped.
    pub fn step(&mut self) -> Result<LoopState> {
        if let LoopState::Stopped(_) = self.state {
            return Ok(self.state);
        }
        if self.stop.is_triggered() {
            self.state = LoopState::Stopped(StopReason::Interrupted);
            return Ok(self.state);
        }

        let mut frame = self.source.capture().context("capture frame")?;
        let detections = self.detector.detect(&frame)?;

        let mut canvas = ImageCanvas::new(frame.image_mut(), &self.font);
        self.renderer.render(&mut canvas, &detections);
        self.display.show(&frame).context("display frame")?;

        self.frames += 1;
        self.detections += detections.len() as u64;
        if let Some(report) = self.report.as_mut() {
            let line = serde_json::to_string(&FrameReport {
                frame: frame.sequence,
                detections: &detections,
            })?;
            writeln!(report, "{}", line).context("write detection report")?;
        }

        let key = self.display.poll_key(self.options.key_wait)?;
        if key == Some(self.options.quit_key) {
            self.state = LoopState::Stopped(StopReason::QuitKey);
        } else if self
            .options
            .max_frames
            .is_some_and(|limit| self.frames >= limit)
        {
            self.state = LoopState::Stopped(StopReason::FrameLimit);
        } else if self.stop.is_triggered() {
            self.state = LoopState::Stopped(StopReason::Interrupted);
        }
        Ok(self.state)
    }

    /// Loop until stopped.
    pub fn run(&mut self) -> Result<RunSummary> {
        log::info!(
            "running: {} -> {} -> {} (press '{}' to quit)",
            self.source.describe(),
            self.detector.backend_name(),
            self.display.name(),
            self.options.quit_key
        );
        loop {
            if let LoopState::Stopped(reason) = self.step()? {
                let summary = RunSummary {
                    frames: self.frames,
                    detections: self.detections,
                    reason,
                };
                log::info!(
                    "stopped ({:?}) after {} frame(s), {} detection(s)",
                    summary.reason,
                    summary.frames,
                    summary.detections
                );
                return Ok(summary);
            }
        }
    }
}
