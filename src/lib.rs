//! Trash detector
//!
//! Live object detection over a camera feed: each frame is captured, handed to a
//! YOLO-style detector, annotated with one box and one `"{class} {confidence}%"` label
//! per detection, and shown until the quit key is pressed.
//!
//! # Module Structure
//!
//! - `frame`: RGB frame type and PNG encoding
//! - `camera`: frame sources (V4L2 devices, `stub://` synthetic cameras)
//! - `detect`: detector backends, YOLOv5 post-processing, detection table conversion
//! - `render`: box and label overlay
//! - `display`: OpenCV window or headless output
//! - `pipeline`: the capture -> detect -> render -> display loop
//! - `config`: JSON config file plus environment overrides
//! - `ui`: startup stage progress

pub mod camera;
pub mod config;
pub mod detect;
pub mod display;
pub mod frame;
pub mod pipeline;
pub mod render;
pub mod ui;

pub use camera::{Camera, CameraConfig, FrameSource, PixelFormat};
pub use config::{DisplaySettings, ModelSettings, RenderSettings, TrashDetectConfig};
pub use detect::{open_backend, Detection, Detector, DetectorBackend, Point, RawDetection};
pub use display::{open_display, Display, DisplayMode, HeadlessDisplay};
pub use frame::Frame;
pub use pipeline::{LoopOptions, LoopState, Pipeline, RunSummary, StopReason, StopSignal};
pub use render::{Canvas, ImageCanvas, LabelFont, RenderStyle, Renderer};
