//! Rendering of detections onto the source image: border, boxes, labels.

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use anyhow::Result;
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::pixelops::interpolate;
use imageproc::rect::Rect;
use thiserror::Error;

use crate::common::Detection;

/// Box outline color.
const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Box outline thickness in pixels.
const BOX_THICKNESS: i32 = 2;
/// Pixel size of the label font at `font_scale == 1.0`.
const BASE_FONT_PX: f32 = 32.0;
/// Average glyph width as a fraction of the font pixel size. Label
/// backgrounds are sized from this estimate, like the rest of the corpus
/// does, instead of exact glyph metrics.
const CHAR_WIDTH_FACTOR: f32 = 0.55;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid color {input:?}: expected \"R,G,B\" with components 0-255")]
pub struct ColorParseError {
    input: String,
}

/// Parses a `"R,G,B"` triple into a pixel.
pub fn parse_color_triple(input: &str) -> Result<Rgb<u8>, ColorParseError> {
    let err = || ColorParseError {
        input: input.to_string(),
    };

    let mut parts = input.split(',');
    let mut channels = [0u8; 3];
    for channel in &mut channels {
        *channel = parts
            .next()
            .ok_or_else(err)?
            .trim()
            .parse()
            .map_err(|_| err())?;
    }
    if parts.next().is_some() {
        return Err(err());
    }
    Ok(Rgb(channels))
}

/// Styling knobs for one render, with the service's documented defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Minimum confidence a detection needs to get drawn.
    pub conf_threshold: f32,
    pub border_size: u32,
    pub border_color: Rgb<u8>,
    pub font_scale: f32,
    pub font_thickness: u32,
    pub text_color: Rgb<u8>,
    pub background_color: Rgb<u8>,
    pub background_alpha: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            conf_threshold: 0.25,
            border_size: 50,
            border_color: Rgb([50, 50, 50]),
            font_scale: 0.7,
            font_thickness: 2,
            text_color: Rgb([255, 255, 255]),
            background_color: Rgb([0, 0, 0]),
            background_alpha: 0.5,
        }
    }
}

/// Surrounds `image` with a uniform frame of `size` pixels in `color`.
pub fn add_border(image: &RgbImage, size: u32, color: Rgb<u8>) -> RgbImage {
    let mut framed = RgbImage::from_pixel(
        image.width() + 2 * size,
        image.height() + 2 * size,
        color,
    );
    image::imageops::overlay(&mut framed, image, size as i64, size as i64);
    framed
}

/// Draws detections onto images. Holds the label font, loaded once.
///
/// The font is optional: when none can be found, boxes and label
/// backgrounds are still drawn and only the glyphs are skipped.
pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    /// Loads the font from `font_path` when given, otherwise searches the
    /// usual system locations.
    pub fn new(font_path: Option<&Path>) -> Self {
        let candidates: Vec<PathBuf> = match font_path {
            Some(path) => vec![path.to_path_buf()],
            None => system_font_candidates(),
        };

        for path in &candidates {
            match std::fs::read(path) {
                Ok(bytes) => match FontVec::try_from_vec(bytes) {
                    Ok(font) => {
                        log::info!("label font loaded from {}", path.display());
                        return Self { font: Some(font) };
                    }
                    Err(err) => log::warn!("{} is not a usable font: {err}", path.display()),
                },
                Err(_) => continue,
            }
        }

        log::warn!("no label font found, annotations will omit text");
        Self { font: None }
    }

    /// Renders `detections` onto a bordered copy of `image`.
    ///
    /// Detection coordinates are in the original image space and get
    /// shifted by the border size before drawing.
    pub fn render(
        &self,
        image: &RgbImage,
        detections: &[Detection],
        opts: &RenderOptions,
    ) -> RgbImage {
        let mut canvas = add_border(image, opts.border_size, opts.border_color);
        let shift = opts.border_size as i32;

        for det in detections {
            if det.confidence < opts.conf_threshold {
                continue;
            }
            let (x1, y1, x2, y2) = det.bbox.as_x1y1_x2y2_i32();
            self.draw_box(&mut canvas, x1 + shift, y1 + shift, x2 + shift, y2 + shift);
            self.draw_label(&mut canvas, det, x1 + shift, y1 + shift, opts);
        }

        canvas
    }

    fn draw_box(&self, canvas: &mut RgbImage, x1: i32, y1: i32, x2: i32, y2: i32) {
        // Corners are inclusive, so the outer rect spans x1..=x2.
        for t in 0..BOX_THICKNESS {
            let w = x2 - x1 + 1 - 2 * t;
            let h = y2 - y1 + 1 - 2 * t;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(x1 + t, y1 + t).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
        }
    }

    fn draw_label(
        &self,
        canvas: &mut RgbImage,
        det: &Detection,
        x1: i32,
        y1: i32,
        opts: &RenderOptions,
    ) {
        let label = format!("{} {:.2}", det.label, det.confidence);
        let font_px = BASE_FONT_PX * opts.font_scale;
        let text_w = (label.len() as f32 * font_px * CHAR_WIDTH_FACTOR) as i32;
        let text_h = font_px as i32;

        // Label sits just above the box top edge.
        let text_x = x1;
        let text_y = y1 - 10;

        blend_rect(
            canvas,
            text_x,
            text_y - text_h - 5,
            text_x + text_w + 5,
            text_y + 5,
            opts.background_color,
            opts.background_alpha,
        );

        if let Some(font) = &self.font {
            let scale = PxScale::from(font_px);
            let glyph_y = (text_y - text_h).max(0);
            // Repeated single-pixel offsets stand in for stroke thickness.
            for t in 0..opts.font_thickness.max(1) as i32 {
                draw_text_mut(
                    canvas,
                    opts.text_color,
                    text_x.max(0) + t,
                    glyph_y,
                    scale,
                    font,
                    &label,
                );
            }
        }
    }
}

/// Alpha-blends `color` over the rectangle `(x1, y1)..(x2, y2)`, clamped to
/// the canvas.
fn blend_rect(
    canvas: &mut RgbImage,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    color: Rgb<u8>,
    alpha: f32,
) {
    let alpha = alpha.clamp(0.0, 1.0);
    let x_lo = x1.max(0) as u32;
    let y_lo = y1.max(0) as u32;
    let x_hi = (x2.max(0) as u32).min(canvas.width());
    let y_hi = (y2.max(0) as u32).min(canvas.height());

    for y in y_lo..y_hi {
        for x in x_lo..x_hi {
            let px = canvas.get_pixel_mut(x, y);
            *px = interpolate(color, *px, alpha);
        }
    }
}

/// Encodes the final image as JPEG bytes.
pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = std::io::Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Jpeg)?;
    Ok(buf.into_inner())
}

fn system_font_candidates() -> Vec<PathBuf> {
    [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
        "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
        "/usr/share/fonts/noto/NotoSans-Regular.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::DetBox;

    #[test]
    fn parses_valid_color_triples() {
        assert_eq!(parse_color_triple("50,50,50"), Ok(Rgb([50, 50, 50])));
        assert_eq!(parse_color_triple(" 255, 0 , 10 "), Ok(Rgb([255, 0, 10])));
    }

    #[test]
    fn rejects_malformed_color_triples() {
        for bad in ["", "1,2", "1,2,3,4", "256,0,0", "a,b,c", "-1,0,0"] {
            assert!(parse_color_triple(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn border_grows_canvas_on_all_sides() {
        let image = RgbImage::from_pixel(10, 20, Rgb([255, 255, 255]));
        let framed = add_border(&image, 5, Rgb([1, 2, 3]));
        assert_eq!(framed.dimensions(), (20, 30));
        assert_eq!(*framed.get_pixel(0, 0), Rgb([1, 2, 3]));
        assert_eq!(*framed.get_pixel(5, 5), Rgb([255, 255, 255]));
    }

    #[test]
    fn render_without_detections_is_border_only() {
        let image = RgbImage::from_pixel(8, 8, Rgb([10, 10, 10]));
        let annotator = Annotator { font: None };
        let opts = RenderOptions::default();

        let rendered = annotator.render(&image, &[], &opts);
        let expected = add_border(&image, opts.border_size, opts.border_color);
        assert_eq!(rendered, expected);
    }

    #[test]
    fn render_draws_box_at_shifted_coordinates() {
        let image = RgbImage::from_pixel(40, 40, Rgb([0, 0, 0]));
        let annotator = Annotator { font: None };
        let opts = RenderOptions {
            border_size: 10,
            background_alpha: 0.0,
            ..RenderOptions::default()
        };
        let det = Detection::new(0, "obj", 0.9, DetBox::new(5.0, 5.0, 30.0, 30.0));

        let rendered = annotator.render(&image, &[det], &opts);
        // Top-left corner of the box lands at original + border shift.
        assert_eq!(*rendered.get_pixel(15, 15), BOX_COLOR);
    }

    #[test]
    fn blend_rect_mixes_colors_by_alpha() {
        let mut canvas = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        blend_rect(&mut canvas, 0, 0, 4, 4, Rgb([200, 200, 200]), 0.5);
        let px = canvas.get_pixel(1, 1);
        assert!(px[0] >= 99 && px[0] <= 101, "got {}", px[0]);
    }
}
