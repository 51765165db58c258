mod backend;
mod backends;
mod detector;
mod result;
pub mod yolo;

use anyhow::Result;

use crate::config::ModelSettings;

pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use detector::Detector;
pub use result::{confidence_percent, Detection, Point, RawDetection};

/// Open the backend named by `settings.path`.
///
/// `stub://` paths select the empty `StubBackend`; anything else is an ONNX model file
/// and needs the `backend-tract` feature.
pub fn open_backend(settings: &ModelSettings) -> Result<Box<dyn DetectorBackend>> {
    if settings.path.starts_with("stub://") {
        log::info!("model {} uses the stub backend", settings.path);
        return Ok(Box::new(StubBackend::new()));
    }
    #[cfg(feature = "backend-tract")]
    {
        let labels = match &settings.labels_path {
            Some(path) => yolo::Labels::load(path)?,
            None => yolo::Labels::default(),
        };
        if labels.is_empty() {
            log::warn!("no class labels configured; detections will be named class<N>");
        }
        let backend = TractBackend::new(&settings.path, settings.input_size)?
            .with_params(settings.yolo_params())
            .with_labels(labels);
        log::info!(
            "model {} loaded ({}x{} input)",
            settings.path,
            settings.input_size,
            settings.input_size
        );
        Ok(Box::new(backend))
    }
    #[cfg(not(feature = "backend-tract"))]
    {
        Err(anyhow::anyhow!(
            "model {} requires the backend-tract feature",
            settings.path
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_model_path_opens_stub_backend() -> Result<()> {
        let settings = ModelSettings {
            path: "stub://empty".to_string(),
            ..ModelSettings::default()
        };
        assert_eq!(open_backend(&settings)?.name(), "stub");
        Ok(())
    }

    #[test]
    fn missing_model_file_is_fatal() {
        let settings = ModelSettings {
            path: "/nonexistent/trash_model.onnx".to_string(),
            ..ModelSettings::default()
        };
        assert!(open_backend(&settings).is_err());
    }
}
