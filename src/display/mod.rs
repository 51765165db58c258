//! Live output of annotated frames.
//!
//! - `HighguiDisplay`: OpenCV window (feature: display-opencv)
//! - `HeadlessDisplay`: no window; optional PNG snapshot of the latest frame
//!
//! A display shows one frame per loop iteration and then polls the keyboard with a
//! short bounded wait. It never decides when the loop stops; the caller interprets keys.

#[cfg(feature = "display-opencv")]
pub mod highgui;

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::DisplaySettings;
use crate::frame::Frame;

#[cfg(feature = "display-opencv")]
pub use highgui::HighguiDisplay;

/// Which display backend to open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Window when compiled in, headless otherwise.
    #[default]
    Auto,
    Window,
    Headless,
}

impl DisplayMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(DisplayMode::Auto),
            "window" => Ok(DisplayMode::Window),
            "headless" => Ok(DisplayMode::Headless),
            other => Err(anyhow::anyhow!(
                "display mode must be auto, window or headless (got '{}')",
                other
            )),
        }
    }
}

/// Output surface for annotated frames.
pub trait Display {
    fn name(&self) -> &'static str;

    /// Present `frame`, replacing the previous one.
    fn show(&mut self, frame: &Frame) -> Result<()>;

    /// Wait up to `timeout` for a key press.
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<char>>;
}

/// Display without a window.
pub struct HeadlessDisplay {
    snapshot_path: Option<PathBuf>,
    frames_shown: u64,
}

impl HeadlessDisplay {
    pub fn new(snapshot_path: Option<PathBuf>) -> Self {
        Self {
            snapshot_path,
            frames_shown: 0,
        }
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }
}

impl Display for HeadlessDisplay {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn show(&mut self, frame: &Frame) -> Result<()> {
        self.frames_shown += 1;
        if let Some(path) = &self.snapshot_path {
            frame.save_png(path)?;
        }
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<char>> {
        if !timeout.is_zero() {
            std::thread::sleep(timeout);
        }
        Ok(None)
    }
}

/// Open the display selected by `settings.mode`.
pub fn open_display(settings: &DisplaySettings) -> Result<Box<dyn Display>> {
    match settings.mode {
        DisplayMode::Headless => Ok(Box::new(HeadlessDisplay::new(
            settings.snapshot_path.clone(),
        ))),
        DisplayMode::Window => open_window(settings),
        DisplayMode::Auto => {
            if cfg!(feature = "display-opencv") {
                open_window(settings)
            } else {
                log::info!("no window backend compiled in; running headless");
                Ok(Box::new(HeadlessDisplay::new(
                    settings.snapshot_path.clone(),
                )))
            }
        }
    }
}

#[cfg(feature = "display-opencv")]
fn open_window(settings: &DisplaySettings) -> Result<Box<dyn Display>> {
    Ok(Box::new(HighguiDisplay::open(&settings.window_name)?))
}

#[cfg(not(feature = "display-opencv"))]
fn open_window(settings: &DisplaySettings) -> Result<Box<dyn Display>> {
    Err(anyhow::anyhow!(
        "window '{}' requires the display-opencv feature",
        settings.window_name
    ))
}
