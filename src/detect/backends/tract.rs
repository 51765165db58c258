use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::detect::yolo::{
    decode_yolov5, non_max_suppression, to_table, Labels, Letterbox, YoloParams,
};

/// Tract-based backend for YOLOv5 ONNX exports.
///
/// Loads the model once, then for each image: letterbox to the square input size, run
/// the network, decode `[1, N, 5 + classes]`, apply NMS, and map boxes back onto the
/// source image.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
    params: YoloParams,
    labels: Labels,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            params: YoloParams::default(),
            labels: Labels::default(),
        })
    }

    /// Override the post-processing thresholds.
    pub fn with_params(mut self, params: YoloParams) -> Self {
        self.params = params;
        self
    }

    /// Attach class names.
    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    fn build_input(&self, letterboxed: &image::RgbImage) -> Tensor {
        let size = self.input_size as usize;
        tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, channel, y, x)| {
            letterboxed.get_pixel(x as u32, y as u32).0[channel] as f32 / 255.0
        })
        .into_tensor()
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&mut self, image: &Path) -> Result<Vec<RawDetection>> {
        let source = image::open(image)
            .with_context(|| format!("failed to read inference image {}", image.display()))?
            .to_rgb8();
        let (width, height) = source.dimensions();
        let letterbox = Letterbox::fit(width, height, self.input_size)?;
        let input = self.build_input(&letterbox.apply(&source));

        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;

        let shape = output.shape();
        if shape.len() != 3 {
            return Err(anyhow!(
                "expected YOLOv5 output of rank 3, got shape {:?}",
                shape
            ));
        }
        let row_len = shape[2];
        let values = output
            .as_slice::<f32>()
            .context("model output tensor was not f32")?;

        let candidates = decode_yolov5(values, row_len, &self.params)?;
        let kept = non_max_suppression(candidates, &self.params);
        Ok(to_table(&kept, &letterbox, width, height, &self.labels))
    }

    fn warm_up(&mut self) -> Result<()> {
        let size = self.input_size as usize;
        let blank = tract_ndarray::Array4::<f32>::zeros((1, 3, size, size)).into_tensor();
        self.model
            .run(tvec!(blank.into()))
            .context("ONNX warm-up inference failed")?;
        Ok(())
    }
}
