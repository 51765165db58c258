use anyhow::Result;
use std::path::Path;

use crate::detect::result::RawDetection;

/// Model inference backend.
///
/// A backend is loaded once at startup and invoked once per frame with the path of an
/// image file holding that frame. It returns the model's detection table in model order.
pub trait DetectorBackend {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run inference on the image stored at `image`.
    ///
    /// The file is only valid for the duration of this call.
    fn infer(&mut self, image: &Path) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<B: DetectorBackend + ?Sized> DetectorBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn infer(&mut self, image: &Path) -> Result<Vec<RawDetection>> {
        (**self).infer(image)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
