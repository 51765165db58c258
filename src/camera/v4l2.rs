//! Camera source.
//!
//! `Camera` wraps either a synthetic generator (`stub://` device paths) or a V4L2
//! device node such as `/dev/video0`. The device is configured once for a fixed pixel
//! format and size; each `capture()` returns one normalized RGB24 frame.

use anyhow::{anyhow, Result};
use std::time::Duration;

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::FrameSource;
use crate::frame::{rgb_len, Frame, RGB_CHANNELS};

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0") or "stub://<name>" for a synthetic source.
    pub device: String,
    /// Requested frame width.
    pub width: u32,
    /// Requested frame height.
    pub height: u32,
    /// Requested frame rate. Zero keeps the device default.
    pub target_fps: u32,
    /// Byte layout requested from the device.
    pub pixel_format: PixelFormat,
    /// Settle time after the stream starts.
    pub warmup: Duration,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
            target_fps: 0,
            pixel_format: PixelFormat::Rgb24,
            warmup: Duration::from_secs(1),
        }
    }
}

/// Camera frame source.
pub struct Camera {
    backend: CameraBackend,
    warmup: Duration,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "camera-v4l2")]
    Device(device::DeviceCamera),
}

impl Camera {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!(
                "camera size must be non-zero (got {}x{})",
                config.width,
                config.height
            ));
        }
        let warmup = config.warmup;
        if config.device.starts_with("stub://") {
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
                warmup,
            });
        }
        #[cfg(feature = "camera-v4l2")]
        {
            Ok(Self {
                backend: CameraBackend::Device(device::DeviceCamera::new(config)),
                warmup,
            })
        }
        #[cfg(not(feature = "camera-v4l2"))]
        {
            Err(anyhow!(
                "camera device {} requires the camera-v4l2 feature",
                config.device
            ))
        }
    }

    /// Check if the camera is delivering frames.
    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(source) => source.is_healthy(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(source) => source.stats(),
        }
    }
}

impl FrameSource for Camera {
    fn start(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect()?,
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(source) => source.connect()?,
        }
        if !self.warmup.is_zero() {
            log::debug!("Camera: settling for {}ms", self.warmup.as_millis());
            std::thread::sleep(self.warmup);
        }
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(source) => source.next_frame(),
        }
    }

    fn describe(&self) -> String {
        let stats = self.stats();
        format!("camera {}", stats.device)
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub device: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
    connected: bool,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            connected: false,
        }
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!(
            "Camera: connected to {} ({}x{}, synthetic)",
            self.config.device,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            return Err(anyhow!("camera {} not started", self.config.device));
        }
        self.frame_count += 1;

        let raw = self.generate_synthetic_pixels()?;
        let rgb = normalize_to_rgb(
            &raw,
            self.config.width,
            self.config.height,
            PixelFormat::Rgb24,
        )?;
        Frame::from_rgb(self.config.width, self.config.height, rgb, self.frame_count)
    }

    /// Diagonal gradient that drifts one step per frame.
    fn generate_synthetic_pixels(&self) -> Result<Vec<u8>> {
        let len = rgb_len(self.config.width, self.config.height)?;
        let pixel_count = len / RGB_CHANNELS;
        let width = self.config.width as u64;
        let mut pixels = Vec::with_capacity(len);
        for i in 0..pixel_count as u64 {
            let x = i % width;
            let y = i / width;
            let base = x + y + self.frame_count;
            pixels.push((base % 256) as u8);
            pixels.push(((base / 2) % 256) as u8);
            pixels.push(((x * 3) % 256) as u8);
        }
        Ok(pixels)
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// V4L2 device source
// ----------------------------------------------------------------------------

#[cfg(feature = "camera-v4l2")]
mod device {
    use anyhow::{Context, Result};
    use ouroboros::self_referencing;
    use std::time::{Duration, Instant};

    use super::{CameraConfig, CameraStats};
    use crate::camera::normalize::{normalize_to_rgb, PixelFormat};
    use crate::frame::Frame;

    pub(super) struct DeviceCamera {
        config: CameraConfig,
        state: Option<DeviceState>,
        frame_count: u64,
        last_frame_at: Option<Instant>,
        last_error: Option<String>,
        active_width: u32,
        active_height: u32,
        active_format: PixelFormat,
    }

    #[self_referencing]
    struct DeviceState {
        device: v4l::Device,
        #[borrows(mut device)]
        #[covariant]
        stream: v4l::prelude::MmapStream<'this, v4l::Device>,
    }

    impl DeviceCamera {
        pub(super) fn new(config: CameraConfig) -> Self {
            Self {
                active_width: config.width,
                active_height: config.height,
                active_format: config.pixel_format,
                config,
                state: None,
                frame_count: 0,
                last_frame_at: None,
                last_error: None,
            }
        }

        pub(super) fn connect(&mut self) -> Result<()> {
            use v4l::buffer::Type;
            use v4l::video::Capture;

            let mut device = v4l::Device::with_path(&self.config.device)
                .with_context(|| format!("open v4l2 device {}", self.config.device))?;
            let mut format = device.format().context("read v4l2 format")?;
            format.width = self.config.width;
            format.height = self.config.height;
            format.fourcc = v4l::FourCC::new(&self.config.pixel_format.fourcc());

            let format = match device.set_format(&format) {
                Ok(format) => format,
                Err(err) => {
                    log::warn!(
                        "Camera: failed to set format on {}: {}",
                        self.config.device,
                        err
                    );
                    device
                        .format()
                        .context("read v4l2 format after set failure")?
                }
            };

            if self.config.target_fps > 0 {
                let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
                if let Err(err) = device.set_params(&params) {
                    log::warn!(
                        "Camera: failed to set fps on {}: {}",
                        self.config.device,
                        err
                    );
                }
            }

            self.active_format = PixelFormat::from_fourcc(format.fourcc.repr)
                .with_context(|| {
                    format!(
                        "device {} delivers unsupported fourcc {}",
                        self.config.device, format.fourcc
                    )
                })?;
            self.active_width = format.width;
            self.active_height = format.height;
            self.last_error = None;

            let state = DeviceStateBuilder {
                device,
                stream_builder: |device| {
                    v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                        .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
                },
            }
            .try_build()
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                err
            })?;
            self.state = Some(state);

            log::info!(
                "Camera: connected to {} ({}x{}, {:?})",
                self.config.device,
                self.active_width,
                self.active_height,
                self.active_format
            );
            Ok(())
        }

        pub(super) fn next_frame(&mut self) -> Result<Frame> {
            use v4l::io::traits::CaptureStream;

            let state = self.state.as_mut().context("v4l2 device not connected")?;
            let (buf, _meta) = state
                .with_mut(|fields| fields.stream.next())
                .map_err(|err| {
                    self.last_error = Some(err.to_string());
                    anyhow::Error::new(err).context("capture v4l2 frame")
                })?;

            let rgb = normalize_to_rgb(
                buf,
                self.active_width,
                self.active_height,
                self.active_format,
            )?;

            self.frame_count += 1;
            self.last_frame_at = Some(Instant::now());

            Frame::from_rgb(self.active_width, self.active_height, rgb, self.frame_count)
        }

        pub(super) fn is_healthy(&self) -> bool {
            if self.last_error.is_some() {
                return false;
            }
            let Some(last_frame_at) = self.last_frame_at else {
                return true;
            };
            last_frame_at.elapsed() <= self.health_grace()
        }

        pub(super) fn stats(&self) -> CameraStats {
            CameraStats {
                frames_captured: self.frame_count,
                device: self.config.device.clone(),
            }
        }

        fn health_grace(&self) -> Duration {
            let base_ms = if self.config.target_fps == 0 {
                2_000
            } else {
                (1000 / self.config.target_fps).saturating_mul(6)
            };
            Duration::from_millis(base_ms.max(2_000) as u64)
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
