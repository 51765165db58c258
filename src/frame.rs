//! Captured frame container.
//!
//! - `Frame`: one RGB24 image produced by a `FrameSource`, owned by the main loop for
//!   exactly one iteration.
//!
//! Every source normalizes its device layout to RGB24 before constructing a `Frame`, so
//! detectors and renderers never see BGR or planar data.

use anyhow::{anyhow, Context, Result};
use image::{ImageFormat, RgbImage};
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

/// Bytes per pixel for the normalized layout.
pub const RGB_CHANNELS: usize = 3;

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One captured RGB24 frame.
pub struct Frame {
    image: RgbImage,

    /// Per-source capture counter, starting at 1.
    pub sequence: u64,
}

impl Frame {
    /// Build a frame from packed RGB24 bytes (row-major, no padding).
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>, sequence: u64) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {} bytes for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, data)
            .ok_or_else(|| anyhow!("RGB frame buffer rejected for {}x{}", width, height))?;
        Ok(Self::from_image(image, sequence))
    }

    /// Wrap an already-decoded image.
    pub fn from_image(image: RgbImage, sequence: u64) -> Self {
        Self { image, sequence }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Packed RGB24 bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Mutable access for in-place annotation.
    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    /// RGB value at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        self.image.get_pixel_checked(x, y).map(|p| p.0)
    }

    /// Encode the frame as PNG into `writer`.
    pub fn write_png<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        let mut buffered = BufWriter::new(writer);
        self.image
            .write_to(&mut buffered, ImageFormat::Png)
            .context("encode frame as PNG")?;
        buffered.flush().context("flush PNG frame")?;
        Ok(())
    }

    /// Save the frame as a PNG file at `path`.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.image
            .save_with_format(path, ImageFormat::Png)
            .with_context(|| format!("save frame to {}", path.display()))
    }
}

/// Byte length of a packed RGB24 buffer, checked for overflow.
pub fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(RGB_CHANNELS))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frame_rejects_short_buffer() {
        let err = Frame::from_rgb(4, 4, vec![0u8; 10], 1).err().expect("length error");
        assert!(err.to_string().contains("length mismatch"));
    }

    #[test]
    fn frame_exposes_pixels() -> Result<()> {
        let mut data = vec![0u8; rgb_len(2, 2)?];
        data[3..6].copy_from_slice(&[1, 2, 3]);
        let frame = Frame::from_rgb(2, 2, data, 7)?;

        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.sequence, 7);
        assert_eq!(frame.pixel(1, 0), Some([1, 2, 3]));
        assert_eq!(frame.pixel(2, 0), None);
        Ok(())
    }

    #[test]
    fn png_encoding_decodes_to_same_pixels() -> Result<()> {
        let data: Vec<u8> = (0..rgb_len(3, 2)?).map(|i| i as u8 * 10).collect();
        let frame = Frame::from_rgb(3, 2, data.clone(), 1)?;

        let mut out = Cursor::new(Vec::new());
        frame.write_png(&mut out)?;

        let decoded = image::load_from_memory_with_format(out.get_ref(), ImageFormat::Png)?
            .to_rgb8();
        assert_eq!(decoded.as_raw(), &data);
        Ok(())
    }
}
