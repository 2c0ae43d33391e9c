//! Small raster drawing surface used for placeholders and generated cards.
//!
//! Geometry follows the usual 2D canvas conventions: strokes are centered on
//! the rectangle outline and text is positioned by its baseline.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use fontdue::{Font, FontSettings};
use image::{Rgba, RgbaImage};

pub const fn rgb(r: u8, g: u8, b: u8) -> Rgba<u8> {
    Rgba([r, g, b, 255])
}

pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Rgba<u8> {
    Rgba([r, g, b, a])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

#[derive(Debug, Clone, Copy)]
pub struct TextStyle {
    pub size: f32,
    pub color: Rgba<u8>,
    pub bold: bool,
    pub align: Align,
}

impl TextStyle {
    pub fn new(size: f32, color: Rgba<u8>) -> Self {
        Self {
            size,
            color,
            bold: false,
            align: Align::Left,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn centered(mut self) -> Self {
        self.align = Align::Center;
        self
    }
}

/// Font used for text on generated images. Without a font, text calls are
/// no-ops and only the shapes are drawn.
#[derive(Default)]
pub struct FontSet {
    font: Option<Font>,
}

impl FontSet {
    pub fn none() -> Self {
        Self { font: None }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|err| anyhow!("failed to parse font: {err}"))?;
        Ok(Self { font: Some(font) })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("failed to read font {:?}", path))?;
        Self::from_bytes(&bytes).with_context(|| format!("failed to load font {:?}", path))
    }

    pub fn is_available(&self) -> bool {
        self.font.is_some()
    }

    pub fn measure(&self, text: &str, size: f32) -> f32 {
        let Some(font) = &self.font else {
            return 0.0;
        };
        text.chars()
            .map(|ch| font.metrics(ch, size).advance_width)
            .sum()
    }
}

pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Rgba<u8>) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, background),
        }
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    fn blend(&mut self, x: i64, y: i64, color: Rgba<u8>, coverage: f32) {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            return;
        }
        let alpha = (color.0[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }
        let dst = self.image.get_pixel_mut(x as u32, y as u32);
        for channel in 0..3 {
            let src = color.0[channel] as f32;
            let base = dst.0[channel] as f32;
            dst.0[channel] = (src * alpha + base * (1.0 - alpha)).round() as u8;
        }
        let base_alpha = dst.0[3] as f32 / 255.0;
        dst.0[3] = ((alpha + base_alpha * (1.0 - alpha)) * 255.0).round() as u8;
    }

    /// Fills every pixel whose center lies inside the rectangle.
    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba<u8>) {
        let x0 = x.round().max(0.0) as i64;
        let y0 = y.round().max(0.0) as i64;
        let x1 = (x + w).round().min(self.width() as f32) as i64;
        let y1 = (y + h).round().min(self.height() as f32) as i64;
        for py in y0..y1 {
            for px in x0..x1 {
                self.blend(px, py, color, 1.0);
            }
        }
    }

    pub fn fill_linear_gradient(
        &mut self,
        (x0, y0): (f32, f32),
        (x1, y1): (f32, f32),
        from: Rgba<u8>,
        to: Rgba<u8>,
    ) {
        let dx = x1 - x0;
        let dy = y1 - y0;
        let length_sq = (dx * dx + dy * dy).max(f32::EPSILON);
        for (px, py, pixel) in self.image.enumerate_pixels_mut() {
            let cx = px as f32 + 0.5 - x0;
            let cy = py as f32 + 0.5 - y0;
            let t = ((cx * dx + cy * dy) / length_sq).clamp(0.0, 1.0);
            *pixel = lerp(from, to, t);
        }
    }

    pub fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, line_width: f32, color: Rgba<u8>) {
        let half = line_width / 2.0;
        self.fill_rect(x - half, y - half, w + line_width, line_width, color);
        self.fill_rect(x - half, y + h - half, w + line_width, line_width, color);
        self.fill_rect(x - half, y + half, line_width, h - line_width, color);
        self.fill_rect(x + w - half, y + half, line_width, h - line_width, color);
    }

    /// Rectangle outline drawn as `dash` long segments separated by `gap`.
    #[allow(clippy::too_many_arguments)]
    pub fn stroke_dashed_rect(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        line_width: f32,
        (dash, gap): (f32, f32),
        color: Rgba<u8>,
    ) {
        let half = line_width / 2.0;
        let period = (dash + gap).max(1.0);
        let mut offset = 0.0;
        while offset < w {
            let len = dash.min(w - offset);
            self.fill_rect(x + offset, y - half, len, line_width, color);
            self.fill_rect(x + offset, y + h - half, len, line_width, color);
            offset += period;
        }
        let mut offset = 0.0;
        while offset < h {
            let len = dash.min(h - offset);
            self.fill_rect(x - half, y + offset, line_width, len, color);
            self.fill_rect(x + w - half, y + offset, line_width, len, color);
            offset += period;
        }
    }

    pub fn fill_rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32, color: Rgba<u8>) {
        self.paint_rounded(x, y, w, h, radius, None, color);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn stroke_rounded_rect(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        radius: f32,
        line_width: f32,
        color: Rgba<u8>,
    ) {
        self.paint_rounded(x, y, w, h, radius, Some(line_width), color);
    }

    #[allow(clippy::too_many_arguments)]
    fn paint_rounded(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        radius: f32,
        line_width: Option<f32>,
        color: Rgba<u8>,
    ) {
        let grow = line_width.map(|lw| lw / 2.0).unwrap_or(0.0);
        let x0 = (x - grow).floor().max(0.0) as i64;
        let y0 = (y - grow).floor().max(0.0) as i64;
        let x1 = (x + w + grow).ceil().min(self.width() as f32) as i64;
        let y1 = (y + h + grow).ceil().min(self.height() as f32) as i64;
        for py in y0..y1 {
            for px in x0..x1 {
                let cx = px as f32 + 0.5;
                let cy = py as f32 + 0.5;
                let covered = match line_width {
                    None => inside_rounded(cx, cy, x, y, w, h, radius),
                    Some(lw) => {
                        let half = lw / 2.0;
                        inside_rounded(
                            cx,
                            cy,
                            x - half,
                            y - half,
                            w + lw,
                            h + lw,
                            radius + half,
                        ) && !inside_rounded(
                            cx,
                            cy,
                            x + half,
                            y + half,
                            w - lw,
                            h - lw,
                            (radius - half).max(0.0),
                        )
                    }
                };
                if covered {
                    self.blend(px, py, color, 1.0);
                }
            }
        }
    }

    pub fn hline(&mut self, x0: f32, x1: f32, y: f32, line_width: f32, color: Rgba<u8>) {
        self.fill_rect(x0, y - line_width / 2.0, x1 - x0, line_width, color);
    }

    /// Draws `text` with its baseline at `y`. Returns the advance width, or
    /// `0.0` when no font is available.
    pub fn fill_text(&mut self, fonts: &FontSet, text: &str, x: f32, y: f32, style: TextStyle) -> f32 {
        let Some(font) = &fonts.font else {
            return 0.0;
        };
        let width = fonts.measure(text, style.size);
        let mut cursor = match style.align {
            Align::Left => x,
            Align::Center => x - width / 2.0,
        };
        for ch in text.chars() {
            let (metrics, bitmap) = font.rasterize(ch, style.size);
            let glyph_x = (cursor + metrics.xmin as f32).round() as i64;
            let glyph_y = (y - metrics.ymin as f32 - metrics.height as f32).round() as i64;
            let passes: &[i64] = if style.bold { &[0, 1] } else { &[0] };
            for shift in passes {
                for row in 0..metrics.height {
                    for col in 0..metrics.width {
                        let coverage = bitmap[row * metrics.width + col] as f32 / 255.0;
                        if coverage > 0.0 {
                            self.blend(
                                glyph_x + col as i64 + shift,
                                glyph_y + row as i64,
                                style.color,
                                coverage,
                            );
                        }
                    }
                }
            }
            cursor += metrics.advance_width;
        }
        width
    }
}

fn lerp(from: Rgba<u8>, to: Rgba<u8>, t: f32) -> Rgba<u8> {
    let mut out = [0u8; 4];
    for (channel, slot) in out.iter_mut().enumerate() {
        let a = from.0[channel] as f32;
        let b = to.0[channel] as f32;
        *slot = (a + (b - a) * t).round() as u8;
    }
    Rgba(out)
}

#[allow(clippy::too_many_arguments)]
fn inside_rounded(px: f32, py: f32, x: f32, y: f32, w: f32, h: f32, radius: f32) -> bool {
    if w <= 0.0 || h <= 0.0 || px < x || py < y || px > x + w || py > y + h {
        return false;
    }
    let r = radius.min(w / 2.0).min(h / 2.0).max(0.0);
    let cx = px.clamp(x + r, x + w - r);
    let cy = py.clamp(y + r, y + h - r);
    let dx = px - cx;
    let dy = py - cy;
    dx * dx + dy * dy <= r * r
}
