//! Detection overlay rendering.
//!
//! `Renderer` walks a detection list and issues one rectangle and one label per
//! detection against a `Canvas`. `ImageCanvas` is the in-memory implementation used by
//! the main loop: rectangles through `imageproc`, labels through an `ab_glyph` font.
//! A label font is required; startup fails if none can be loaded.

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

use crate::detect::{Detection, Point};

/// Label height in pixels at `font_scale == 1.0`.
const LABEL_BASE_PX: f32 = 24.0;

/// Fonts tried in order when no label font is configured.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Fixed drawing parameters for every overlay.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderStyle {
    pub color: [u8; 3],
    pub thickness: u32,
    pub font_scale: f32,
    /// Distance between the label baseline and the top edge of the box.
    pub label_offset: i32,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            color: [255, 0, 0],
            thickness: 2,
            font_scale: 1.0,
            label_offset: 10,
        }
    }
}

/// Drawing surface for overlays.
pub trait Canvas {
    /// Axis-aligned rectangle outline through both corners (inclusive).
    fn draw_rect(&mut self, top_left: Point, bottom_right: Point, color: [u8; 3], thickness: u32);

    /// Text whose baseline starts at `origin`.
    fn draw_text(&mut self, text: &str, origin: Point, color: [u8; 3], font_scale: f32);
}

/// Burns detection boxes and labels into a canvas.
#[derive(Clone, Debug, Default)]
pub struct Renderer {
    style: RenderStyle,
}

impl Renderer {
    pub fn new(style: RenderStyle) -> Self {
        Self { style }
    }

    /// Draw one rectangle and one label per detection, in list order.
    pub fn render<C: Canvas + ?Sized>(&self, canvas: &mut C, detections: &[Detection]) {
        if detections.is_empty() {
            return;
        }
        log::debug!("Drawing {} detection(s)", detections.len());
        let style = &self.style;
        for detection in detections {
            canvas.draw_rect(
                detection.top_left,
                detection.bottom_right,
                style.color,
                style.thickness,
            );
            let origin = Point::new(
                detection.top_left.x,
                detection.top_left.y - style.label_offset,
            );
            canvas.draw_text(&label_text(detection), origin, style.color, style.font_scale);
        }
    }
}

/// `"{class_name} {confidence}%"`.
pub fn label_text(detection: &Detection) -> String {
    format!(
        "{} {}%",
        detection.class_name,
        format_confidence(detection.confidence)
    )
}

/// Shortest round-trip decimal, always with a fractional digit (`87.5`, `87.0`).
pub fn format_confidence(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

// ----------------------------------------------------------------------------
// Label font
// ----------------------------------------------------------------------------

/// TrueType/OpenType font used for labels on image canvases.
pub struct LabelFont {
    font: FontVec,
    source: PathBuf,
}

impl LabelFont {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read label font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|_| anyhow!("invalid label font {}", path.display()))?;
        Ok(Self {
            font,
            source: path.to_path_buf(),
        })
    }

    /// Load `explicit` if given, otherwise the first installed candidate font.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        Self::first_of(FONT_CANDIDATES.iter().map(Path::new))
    }

    fn first_of<'p>(candidates: impl IntoIterator<Item = &'p Path>) -> Result<Self> {
        for candidate in candidates {
            if !candidate.is_file() {
                continue;
            }
            match Self::load(candidate) {
                Ok(font) => return Ok(font),
                Err(err) => log::debug!("skipping label font {}: {:#}", candidate.display(), err),
            }
        }
        Err(anyhow!(
            "no label font found; set render.font_path or TRASH_DETECT_FONT"
        ))
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

// ----------------------------------------------------------------------------
// ImageCanvas
// ----------------------------------------------------------------------------

/// Canvas over an in-memory RGB image.
pub struct ImageCanvas<'a> {
    image: &'a mut RgbImage,
    font: &'a LabelFont,
}

impl<'a> ImageCanvas<'a> {
    pub fn new(image: &'a mut RgbImage, font: &'a LabelFont) -> Self {
        Self { image, font }
    }
}

impl Canvas for ImageCanvas<'_> {
    fn draw_rect(&mut self, top_left: Point, bottom_right: Point, color: [u8; 3], thickness: u32) {
        let thickness = thickness.max(1) as i32;
        let inner = (thickness - 1) / 2;
        for step in 0..thickness {
            let grow = step - inner;
            let x1 = top_left.x - grow;
            let y1 = top_left.y - grow;
            let x2 = bottom_right.x + grow;
            let y2 = bottom_right.y + grow;
            if x2 < x1 || y2 < y1 {
                continue;
            }
            let rect = Rect::at(x1, y1).of_size((x2 - x1 + 1) as u32, (y2 - y1 + 1) as u32);
            imageproc::drawing::draw_hollow_rect_mut(&mut *self.image, rect, Rgb(color));
        }
    }

    fn draw_text(&mut self, text: &str, origin: Point, color: [u8; 3], font_scale: f32) {
        let px = LABEL_BASE_PX * font_scale;
        let top = origin.y - px.round() as i32;
        imageproc::drawing::draw_text_mut(
            &mut *self.image,
            Rgb(color),
            origin.x,
            top,
            PxScale::from(px),
            &self.font.font,
            text,
        );
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Op {
        Rect(Point, Point, [u8; 3], u32),
        Text(String, Point),
    }

    #[derive(Default)]
    struct RecordingCanvas {
        ops: Vec<Op>,
    }

    impl Canvas for RecordingCanvas {
        fn draw_rect(&mut self, tl: Point, br: Point, color: [u8; 3], thickness: u32) {
            self.ops.push(Op::Rect(tl, br, color, thickness));
        }

        fn draw_text(&mut self, text: &str, origin: Point, _color: [u8; 3], _scale: f32) {
            self.ops.push(Op::Text(text.to_string(), origin));
        }
    }

    fn fixture_font() -> LabelFont {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/DejaVuSans.ttf");
        LabelFont::load(&path).expect("fixture font")
    }

    fn bottle() -> Detection {
        Detection::new("bottle", Point::new(10, 10), Point::new(50, 60), 87.5)
    }

    #[test]
    fn label_formats_confidence_like_a_float() {
        assert_eq!(label_text(&bottle()), "bottle 87.5%");
        assert_eq!(
            label_text(&Detection::new("can", Point::default(), Point::default(), 87.0)),
            "can 87.0%"
        );
        assert_eq!(format_confidence(12.35), "12.35");
        assert_eq!(format_confidence(100.0), "100.0");
    }

    #[test]
    fn each_detection_gets_one_box_and_one_label() {
        let detections = vec![
            bottle(),
            Detection::new("can", Point::new(0, 30), Point::new(5, 40), 50.25),
            Detection::new("paper", Point::new(3, 3), Point::new(9, 9), 12.0),
        ];
        let mut canvas = RecordingCanvas::default();
        Renderer::default().render(&mut canvas, &detections);

        let rects = canvas.ops.iter().filter(|op| matches!(op, Op::Rect(..))).count();
        let texts: Vec<_> = canvas
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Text(text, _) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(rects, 3);
        assert_eq!(texts, vec!["bottle 87.5%", "can 50.25%", "paper 12.0%"]);
    }

    #[test]
    fn label_sits_ten_pixels_above_the_box() {
        let mut canvas = RecordingCanvas::default();
        Renderer::default().render(&mut canvas, &[bottle()]);

        assert_eq!(
            canvas.ops,
            vec![
                Op::Rect(Point::new(10, 10), Point::new(50, 60), [255, 0, 0], 2),
                Op::Text("bottle 87.5%".to_string(), Point::new(10, 0)),
            ]
        );
    }

    #[test]
    fn no_detections_leave_image_untouched() {
        let mut image = RgbImage::from_pixel(32, 32, Rgb([7, 8, 9]));
        let before = image.clone();
        let font = fixture_font();
        Renderer::default().render(&mut ImageCanvas::new(&mut image, &font), &[]);
        assert_eq!(image, before);
    }

    #[test]
    fn image_canvas_outlines_box() {
        let mut image = RgbImage::new(80, 80);
        let font = fixture_font();
        Renderer::default().render(&mut ImageCanvas::new(&mut image, &font), &[bottle()]);

        let red = Rgb([255, 0, 0]);
        assert_eq!(*image.get_pixel(10, 10), red);
        assert_eq!(*image.get_pixel(50, 60), red);
        assert_eq!(*image.get_pixel(30, 10), red);
        assert_eq!(*image.get_pixel(9, 9), red);
        assert_eq!(*image.get_pixel(11, 11), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(30, 30), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(5, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn boxes_past_the_edge_are_clipped() {
        let mut image = RgbImage::new(20, 20);
        let det = Detection::new("bag", Point::new(-5, -5), Point::new(30, 30), 40.0);
        let font = fixture_font();
        Renderer::default().render(&mut ImageCanvas::new(&mut image, &font), &[det]);
        assert_eq!(*image.get_pixel(10, 10), Rgb([0, 0, 0]));
    }

    #[test]
    fn image_canvas_draws_label_above_box() {
        let mut image = RgbImage::new(200, 80);
        let font = fixture_font();
        let det = Detection::new("bottle", Point::new(10, 40), Point::new(70, 70), 87.5);
        Renderer::default().render(&mut ImageCanvas::new(&mut image, &font), &[det]);

        // Baseline at y = 30; the box outline starts at y = 39.
        let inked = (0..37)
            .flat_map(|y| (0..200).map(move |x| (x, y)))
            .filter(|&(x, y)| *image.get_pixel(x, y) != Rgb([0, 0, 0]))
            .count();
        assert!(inked > 50, "label band has only {} inked pixels", inked);
        assert_eq!(*image.get_pixel(5, 20), Rgb([0, 0, 0]));
    }

    #[test]
    fn explicit_missing_font_is_an_error() {
        assert!(LabelFont::discover(Some(Path::new("/nonexistent/font.ttf"))).is_err());
    }

    #[test]
    fn no_loadable_candidate_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let broken = dir.path().join("broken.ttf");
        std::fs::write(&broken, b"not a font").expect("write broken font");
        let missing = dir.path().join("missing.ttf");

        let err = LabelFont::first_of([missing.as_path(), broken.as_path()])
            .err()
            .expect("no usable font");
        assert!(err.to_string().contains("no label font found"));

        let fixture = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/DejaVuSans.ttf");
        let font = LabelFont::first_of([broken.as_path(), fixture.as_path()]).expect("fixture");
        assert_eq!(font.source(), fixture.as_path());
    }
}
