//! OpenCV highgui window.

use anyhow::{Context, Result};
use opencv::{highgui, imgproc, prelude::*};
use std::time::Duration;

use super::Display;
use crate::frame::Frame;

/// Named OpenCV window fed with RGB frames.
pub struct HighguiDisplay {
    window_name: String,
}

impl HighguiDisplay {
    pub fn open(window_name: &str) -> Result<Self> {
        highgui::named_window(window_name, highgui::WINDOW_AUTOSIZE)
            .with_context(|| format!("open display window '{}'", window_name))?;
        log::info!("display window '{}' opened", window_name);
        Ok(Self {
            window_name: window_name.to_string(),
        })
    }
}

impl Display for HighguiDisplay {
    fn name(&self) -> &'static str {
        "highgui"
    }

    fn show(&mut self, frame: &Frame) -> Result<()> {
        let packed = Mat::from_slice(frame.as_bytes()).context("wrap frame bytes")?;
        let shaped = packed
            .reshape(3, frame.height() as i32)
            .context("reshape frame to RGB rows")?;
        let mut bgr = Mat::default();
        imgproc::cvt_color(&*shaped, &mut bgr, imgproc::COLOR_RGB2BGR, 0)
            .context("convert frame to BGR")?;
        highgui::imshow(&self.window_name, &bgr).context("show frame")?;
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<char>> {
        let wait_ms = timeout.as_millis().clamp(1, i32::MAX as u128) as i32;
        let key = highgui::wait_key(wait_ms).context("poll key")?;
        if key < 0 {
            return Ok(None);
        }
        Ok(char::from_u32((key & 0xff) as u32))
    }
}
