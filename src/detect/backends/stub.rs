use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;

/// Stub backend for tests and dry runs. Returns a scripted table for every image.
#[derive(Default)]
pub struct StubBackend {
    rows: Vec<RawDetection>,
    failure: Option<String>,
    seen: Vec<PathBuf>,
}

impl StubBackend {
    /// Backend that never detects anything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that reports `rows` for every image.
    pub fn with_rows(rows: Vec<RawDetection>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// Backend whose every inference fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Image paths passed to `infer`, in call order.
    pub fn seen_paths(&self) -> &[PathBuf] {
        &self.seen
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, image: &Path) -> Result<Vec<RawDetection>> {
        self.seen.push(image.to_path_buf());
        let meta = std::fs::metadata(image)
            .with_context(|| format!("stub backend cannot read {}", image.display()))?;
        if meta.len() == 0 {
            return Err(anyhow!("stub backend received empty image {}", image.display()));
        }
        if let Some(message) = &self.failure {
            return Err(anyhow!("{}", message));
        }
        Ok(self.rows.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn bottle() -> RawDetection {
        RawDetection {
            xmin: 1.0,
            ymin: 2.0,
            xmax: 3.0,
            ymax: 4.0,
            confidence: 0.5,
            name: "bottle".to_string(),
        }
    }

    #[test]
    fn stub_backend_replays_rows() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"not really a png")?;

        let mut backend = StubBackend::with_rows(vec![bottle()]);
        assert_eq!(backend.infer(file.path())?, vec![bottle()]);
        assert_eq!(backend.infer(file.path())?.len(), 1);
        assert_eq!(backend.seen_paths().len(), 2);
        Ok(())
    }

    #[test]
    fn stub_backend_requires_existing_image() {
        let mut backend = StubBackend::new();
        assert!(backend.infer(Path::new("/nonexistent/frame.png")).is_err());
    }

    #[test]
    fn failing_stub_reports_message() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"x")?;

        let mut backend = StubBackend::failing("model exploded");
        let err = backend.infer(file.path()).unwrap_err();
        assert!(err.to_string().contains("model exploded"));
        Ok(())
    }
}
