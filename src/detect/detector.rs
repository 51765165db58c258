use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Turns frames into detections through a file-path model backend.
///
/// Each call writes the frame to a uniquely named scratch PNG, hands its path to the
/// backend, and removes the file before returning. The file is removed on every exit
/// path, including encode and inference failures.
pub struct Detector {
    backend: Box<dyn DetectorBackend>,
    scratch_dir: PathBuf,
}

impl Detector {
    /// Scratch files go to the OS temp dir.
    pub fn new(backend: Box<dyn DetectorBackend>) -> Self {
        Self::with_scratch_dir(backend, std::env::temp_dir())
    }

    pub fn with_scratch_dir(backend: Box<dyn DetectorBackend>, scratch_dir: PathBuf) -> Self {
        Self {
            backend,
            scratch_dir,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn warm_up(&mut self) -> Result<()> {
        self.backend.warm_up()
    }

    /// Detect objects in `frame`. Detections keep the backend's order.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        log::debug!("Detecting trash in frame {}", frame.sequence);

        let mut scratch = tempfile::Builder::new()
            .prefix("trash-detect-")
            .suffix(".png")
            .tempfile_in(&self.scratch_dir)
            .with_context(|| {
                format!(
                    "create detector scratch image in {}",
                    self.scratch_dir.display()
                )
            })?;
        frame.write_png(scratch.as_file_mut())?;

        let inferred = self
            .backend
            .infer(scratch.path())
            .with_context(|| format!("{} inference failed", self.backend.name()));
        let removed = scratch.close().context("remove detector scratch image");

        let rows = inferred?;
        removed?;

        Ok(rows.iter().map(Detection::from).collect())
    }
}
