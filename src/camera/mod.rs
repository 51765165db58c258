//! Camera frame sources.
//!
//! - Synthetic `stub://` devices (tests, dry runs without hardware)
//! - USB/CSI cameras through V4L2 (feature: camera-v4l2)
//!
//! Every source hands the main loop one RGB24 `Frame` per `capture()` call. Device byte
//! layouts are normalized at capture time; nothing downstream sees BGR or NV12.

mod normalize;
pub mod v4l2;

use anyhow::Result;

use crate::frame::Frame;

pub use normalize::PixelFormat;
pub use v4l2::{Camera, CameraConfig, CameraStats};

/// A blocking source of frames, started once and then polled by the main loop.
pub trait FrameSource {
    /// Open the device and wait for it to settle. Must be called before `capture`.
    fn start(&mut self) -> Result<()>;

    /// Block until the next frame is available.
    fn capture(&mut self) -> Result<Frame>;

    /// Human-readable source description for logs.
    fn describe(&self) -> String;
}
