use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::camera::{CameraConfig, PixelFormat};
use crate::detect::yolo::YoloParams;
use crate::display::DisplayMode;
use crate::render::RenderStyle;

const DEFAULT_MODEL_PATH: &str = "trash_model.onnx";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const DEFAULT_MAX_DETECTIONS: usize = 1000;
const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_WARMUP_MS: u64 = 1000;
const DEFAULT_WINDOW_NAME: &str = "Video";
const DEFAULT_KEY_WAIT_MS: u64 = 42;
const DEFAULT_QUIT_KEY: char = 'q';

#[derive(Debug, Deserialize, Default)]
struct TrashDetectConfigFile {
    model: Option<ModelConfigFile>,
    camera: Option<CameraConfigFile>,
    display: Option<DisplayConfigFile>,
    render: Option<RenderConfigFile>,
    scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<String>,
    labels_path: Option<PathBuf>,
    input_size: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    max_detections: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    pixel_format: Option<PixelFormat>,
    warmup_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    mode: Option<DisplayMode>,
    window_name: Option<String>,
    key_wait_ms: Option<u64>,
    quit_key: Option<char>,
    snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    color: Option<[u8; 3]>,
    thickness: Option<u32>,
    font_scale: Option<f32>,
    label_offset: Option<i32>,
    font_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct TrashDetectConfig {
    pub model: ModelSettings,
    pub camera: CameraConfig,
    pub display: DisplaySettings,
    pub render: RenderSettings,
    /// Directory for per-frame scratch images. `None` uses the OS temp dir.
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// ONNX weights file, or `stub://<name>` for the stub backend.
    pub path: String,
    pub labels_path: Option<PathBuf>,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl ModelSettings {
    pub fn yolo_params(&self) -> YoloParams {
        YoloParams {
            confidence_threshold: self.confidence_threshold,
            iou_threshold: self.iou_threshold,
            max_detections: self.max_detections,
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            path: DEFAULT_MODEL_PATH.to_string(),
            labels_path: None,
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_detections: DEFAULT_MAX_DETECTIONS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub mode: DisplayMode,
    pub window_name: String,
    /// Bounded key poll after each shown frame.
    pub key_wait: Duration,
    pub quit_key: char,
    pub snapshot_path: Option<PathBuf>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Auto,
            window_name: DEFAULT_WINDOW_NAME.to_string(),
            key_wait: Duration::from_millis(DEFAULT_KEY_WAIT_MS),
            quit_key: DEFAULT_QUIT_KEY,
            snapshot_path: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderSettings {
    pub style: RenderStyle,
    pub font_path: Option<PathBuf>,
}

impl TrashDetectConfig {
    /// Defaults, then the JSON file named by `TRASH_DETECT_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TRASH_DETECT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TrashDetectConfigFile) -> Self {
        let model_file = file.model.unwrap_or_default();
        let model_defaults = ModelSettings::default();
        let model = ModelSettings {
            path: model_file.path.unwrap_or(model_defaults.path),
            labels_path: model_file.labels_path,
            input_size: model_file.input_size.unwrap_or(model_defaults.input_size),
            confidence_threshold: model_file
                .confidence_threshold
                .unwrap_or(model_defaults.confidence_threshold),
            iou_threshold: model_file
                .iou_threshold
                .unwrap_or(model_defaults.iou_threshold),
            max_detections: model_file
                .max_detections
                .unwrap_or(model_defaults.max_detections),
        };

        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraConfig {
            device: camera_file
                .device
                .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
            width: camera_file.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: camera_file.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
            target_fps: camera_file.target_fps.unwrap_or(0),
            pixel_format: camera_file.pixel_format.unwrap_or_default(),
            warmup: Duration::from_millis(camera_file.warmup_ms.unwrap_or(DEFAULT_WARMUP_MS)),
        };

        let display_file = file.display.unwrap_or_default();
        let display_defaults = DisplaySettings::default();
        let display = DisplaySettings {
            mode: display_file.mode.unwrap_or(display_defaults.mode),
            window_name: display_file
                .window_name
                .unwrap_or(display_defaults.window_name),
            key_wait: display_file
                .key_wait_ms
                .map(Duration::from_millis)
                .unwrap_or(display_defaults.key_wait),
            quit_key: display_file.quit_key.unwrap_or(display_defaults.quit_key),
            snapshot_path: display_file.snapshot_path,
        };

        let render_file = file.render.unwrap_or_default();
        let style_defaults = RenderStyle::default();
        let render = RenderSettings {
            style: RenderStyle {
                color: render_file.color.unwrap_or(style_defaults.color),
                thickness: render_file.thickness.unwrap_or(style_defaults.thickness),
                font_scale: render_file.font_scale.unwrap_or(style_defaults.font_scale),
                label_offset: render_file
                    .label_offset
                    .unwrap_or(style_defaults.label_offset),
            },
            font_path: render_file.font_path,
        };

        Self {
            model,
            camera,
            display,
            render,
            scratch_dir: file.scratch_dir,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = non_empty_env("TRASH_DETECT_MODEL") {
            self.model.path = path;
        }
        if let Some(path) = non_empty_env("TRASH_DETECT_LABELS") {
            self.model.labels_path = Some(PathBuf::from(path));
        }
        if let Some(device) = non_empty_env("TRASH_DETECT_CAMERA") {
            self.camera.device = device;
        }
        if let Some(mode) = non_empty_env("TRASH_DETECT_DISPLAY") {
            self.display.mode = DisplayMode::parse(&mode)
                .map_err(|e| anyhow!("TRASH_DETECT_DISPLAY: {}", e))?;
        }
        if let Some(path) = non_empty_env("TRASH_DETECT_FONT") {
            self.render.font_path = Some(PathBuf::from(path));
        }
        if let Some(path) = non_empty_env("TRASH_DETECT_SCRATCH_DIR") {
            self.scratch_dir = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.model.path.trim().is_empty() {
            return Err(anyhow!("model path must not be empty"));
        }
        check_unit_interval("confidence_threshold", self.model.confidence_threshold)?;
        check_unit_interval("iou_threshold", self.model.iou_threshold)?;
        if self.model.input_size == 0 || self.model.input_size % 32 != 0 {
            return Err(anyhow!(
                "model input_size must be a positive multiple of 32 (got {})",
                self.model.input_size
            ));
        }
        if self.model.max_detections == 0 {
            return Err(anyhow!("max_detections must be greater than zero"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!(
                "camera size must be non-zero (got {}x{})",
                self.camera.width,
                self.camera.height
            ));
        }
        if self.display.window_name.trim().is_empty() {
            return Err(anyhow!("window name must not be empty"));
        }
        if self.render.style.thickness == 0 {
            return Err(anyhow!("render thickness must be greater than zero"));
        }
        let font_scale = self.render.style.font_scale;
        if font_scale.is_nan() || font_scale <= 0.0 {
            return Err(anyhow!("render font_scale must be greater than zero"));
        }
        Ok(())
    }
}

fn check_unit_interval(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(anyhow!("{} must be within [0, 1] (got {})", name, value));
    }
    Ok(())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<TrashDetectConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> TrashDetectConfig {
        TrashDetectConfig::from_file(TrashDetectConfigFile::default())
    }

    #[test]
    fn defaults_cover_a_stock_webcam() -> Result<()> {
        let cfg = defaults();
        cfg.validate()?;
        assert_eq!(cfg.model.path, "trash_model.onnx");
        assert_eq!(cfg.display.window_name, "Video");
        assert_eq!(cfg.display.quit_key, 'q');
        assert_eq!(cfg.display.key_wait, Duration::from_millis(42));
        assert_eq!(cfg.camera.warmup, Duration::from_secs(1));
        assert_eq!(cfg.render.style.color, [255, 0, 0]);
        assert_eq!(cfg.render.style.thickness, 2);
        assert_eq!(cfg.render.style.label_offset, 10);
        Ok(())
    }

    #[test]
    fn partial_file_keeps_other_defaults() -> Result<()> {
        let file: TrashDetectConfigFile = serde_json::from_str(
            r#"{ "camera": { "pixel_format": "nv12", "width": 1280, "height": 720 } }"#,
        )?;
        let cfg = TrashDetectConfig::from_file(file);
        assert_eq!(cfg.camera.pixel_format, PixelFormat::Nv12);
        assert_eq!(cfg.camera.width, 1280);
        assert_eq!(cfg.camera.device, "/dev/video0");
        assert_eq!(cfg.model.input_size, 640);
        Ok(())
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = defaults();
        cfg.model.confidence_threshold = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = defaults();
        cfg.model.input_size = 100;
        assert!(cfg.validate().is_err());

        let mut cfg = defaults();
        cfg.render.style.thickness = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = defaults();
        cfg.render.style.font_scale = f32::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_pixel_format_is_a_parse_error() {
        let parsed: std::result::Result<TrashDetectConfigFile, _> =
            serde_json::from_str(r#"{ "camera": { "pixel_format": "yuyv" } }"#);
        assert!(parsed.is_err());
    }
}
