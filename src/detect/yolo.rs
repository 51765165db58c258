//! YOLOv5 pre- and post-processing.
//!
//! Pure geometry and decoding shared by the ONNX backend: letterbox resize, output
//! row decoding, greedy non-maximum suppression, and mapping boxes back onto the
//! source image. Nothing here touches the inference runtime.

use anyhow::{anyhow, Context, Result};
use image::{imageops, Rgb, RgbImage};
use std::path::Path;

use crate::detect::result::RawDetection;

/// Padding value YOLOv5 uses for letterbox borders.
pub const LETTERBOX_FILL: u8 = 114;

/// Boxes, objectness, then one score per class.
const YOLOV5_BOX_FIELDS: usize = 5;

/// Post-processing thresholds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YoloParams {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 1000,
        }
    }
}

// ----------------------------------------------------------------------------
// Letterbox
// ----------------------------------------------------------------------------

/// Scale and padding applied when fitting a source image into the square model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub resized_width: u32,
    pub resized_height: u32,
    pub input_size: u32,
}

impl Letterbox {
    pub fn fit(src_width: u32, src_height: u32, input_size: u32) -> Result<Self> {
        if src_width == 0 || src_height == 0 {
            return Err(anyhow!("cannot letterbox an empty image"));
        }
        let size = input_size as f32;
        let scale = (size / src_width as f32).min(size / src_height as f32);
        let resized_width = ((src_width as f32 * scale).round() as u32).clamp(1, input_size);
        let resized_height = ((src_height as f32 * scale).round() as u32).clamp(1, input_size);
        Ok(Self {
            scale,
            pad_x: (input_size - resized_width) as f32 / 2.0,
            pad_y: (input_size - resized_height) as f32 / 2.0,
            resized_width,
            resized_height,
            input_size,
        })
    }

    /// Resize `image` into a padded square model input.
    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        let resized = imageops::resize(
            image,
            self.resized_width,
            self.resized_height,
            imageops::FilterType::Triangle,
        );
        let mut canvas = RgbImage::from_pixel(
            self.input_size,
            self.input_size,
            Rgb([LETTERBOX_FILL; 3]),
        );
        imageops::replace(
            &mut canvas,
            &resized,
            self.pad_x.floor() as i64,
            self.pad_y.floor() as i64,
        );
        canvas
    }

    /// Map a model-input coordinate back to source pixels.
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_x.floor()) / self.scale,
            (y - self.pad_y.floor()) / self.scale,
        )
    }
}

// ----------------------------------------------------------------------------
// Decoding and NMS
// ----------------------------------------------------------------------------

/// A decoded box in model-input coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
    pub class_id: usize,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    pub fn iou(&self, other: &Candidate) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Decode a flat `[N, 5 + classes]` YOLOv5 output (cx, cy, w, h, objectness, scores...).
pub fn decode_yolov5(
    output: &[f32],
    row_len: usize,
    params: &YoloParams,
) -> Result<Vec<Candidate>> {
    if row_len <= YOLOV5_BOX_FIELDS {
        return Err(anyhow!(
            "YOLOv5 output rows need more than {} values, got {}",
            YOLOV5_BOX_FIELDS,
            row_len
        ));
    }
    if output.len() % row_len != 0 {
        return Err(anyhow!(
            "YOLOv5 output length {} is not a multiple of row length {}",
            output.len(),
            row_len
        ));
    }

    let mut candidates = Vec::new();
    for row in output.chunks_exact(row_len) {
        let objectness = row[4];
        if objectness < params.confidence_threshold {
            continue;
        }
        let Some((class_id, class_score)) = row[YOLOV5_BOX_FIELDS..]
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
        else {
            continue;
        };
        let score = objectness * class_score;
        if score < params.confidence_threshold {
            continue;
        }
        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
        candidates.push(Candidate {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
            score,
            class_id,
        });
    }
    Ok(candidates)
}

/// Greedy per-class NMS. Output is sorted by descending score and capped at `max_detections`.
pub fn non_max_suppression(mut boxes: Vec<Candidate>, params: &YoloParams) -> Vec<Candidate> {
    boxes.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Candidate> = Vec::new();
    let mut suppressed = vec![false; boxes.len()];

    for i in 0..boxes.len() {
        if suppressed[i] {
            continue;
        }
        kept.push(boxes[i]);
        if kept.len() >= params.max_detections {
            break;
        }
        for j in (i + 1)..boxes.len() {
            if boxes[j].class_id == boxes[i].class_id
                && boxes[i].iou(&boxes[j]) > params.iou_threshold
            {
                suppressed[j] = true;
            }
        }
    }

    kept
}

/// Convert kept candidates into detection table rows in source-image pixels.
pub fn to_table(
    candidates: &[Candidate],
    letterbox: &Letterbox,
    src_width: u32,
    src_height: u32,
    labels: &Labels,
) -> Vec<RawDetection> {
    let max_x = src_width as f32;
    let max_y = src_height as f32;
    candidates
        .iter()
        .map(|c| {
            let (x1, y1) = letterbox.to_source(c.x1, c.y1);
            let (x2, y2) = letterbox.to_source(c.x2, c.y2);
            RawDetection {
                xmin: x1.clamp(0.0, max_x) as f64,
                ymin: y1.clamp(0.0, max_y) as f64,
                xmax: x2.clamp(0.0, max_x) as f64,
                ymax: y2.clamp(0.0, max_y) as f64,
                confidence: c.score as f64,
                name: labels.name(c.class_id),
            }
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Labels
// ----------------------------------------------------------------------------

/// Class names indexed by model class id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Labels {
    names: Vec<String>,
}

impl Labels {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Read one class name per line; blank lines are skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read labels file {}", path.display()))?;
        Ok(Self::parse(&raw))
    }

    pub fn parse(raw: &str) -> Self {
        Self::new(
            raw.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn name(&self, class_id: usize) -> String {
        self.names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class{}", class_id))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
