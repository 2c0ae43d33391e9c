//! Turns page images into the frame shown on screen: spread layout, zoom and
//! pan, and the squash used while a page is turning.

use flipbook_core::{FlipDirection, PageImage, Point, RenderImage, Spread};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::canvas::{rgb, rgba, Canvas, FontSet, TextStyle};

/// Page tiles use the A4 aspect ratio (210:297).
pub const PAGE_ASPECT: f32 = 210.0 / 297.0;
pub const GUTTER: u32 = 4;

const CARD: Rgba<u8> = rgb(255, 255, 255);
const PEACH: Rgba<u8> = rgb(0xFF, 0xE4, 0xCC);
const MUTED: Rgba<u8> = rgb(0x64, 0x74, 0x8B);
const MUTED_FAINT: Rgba<u8> = rgba(0x64, 0x74, 0x8B, 153);
const BADGE_FILL: Rgba<u8> = rgba(0x1E, 0x29, 0x3B, 26);
const BADGE_TEXT: Rgba<u8> = rgba(0x1E, 0x29, 0x3B, 179);
pub const BACKDROP: Rgba<u8> = rgb(0xFE, 0xF9, 0xF3);

pub fn to_rgba_image(image: &RenderImage) -> Option<RgbaImage> {
    RgbaImage::from_raw(image.width, image.height, image.pixels.clone())
}

pub fn into_render_image(image: RgbaImage) -> RenderImage {
    RenderImage {
        width: image.width(),
        height: image.height(),
        pixels: image.into_raw(),
    }
}

pub fn tile_width(tile_height: u32) -> u32 {
    ((tile_height as f32) * PAGE_ASPECT).round().max(1.0) as u32
}

/// Lays the pages of `spread` side by side. `page` supplies each page's
/// current image state.
pub fn compose_spread<F>(spread: Spread, tile_height: u32, fonts: &FontSet, mut page: F) -> RgbaImage
where
    F: FnMut(usize) -> PageImage,
{
    let tile_height = tile_height.max(1);
    let tile_w = tile_width(tile_height);
    let pages: Vec<usize> = spread.pages().collect();
    let count = pages.len().max(1) as u32;
    let width = tile_w * count + GUTTER * (count - 1);
    let mut frame = RgbaImage::from_pixel(width, tile_height, BACKDROP);

    for (slot, number) in pages.into_iter().enumerate() {
        let tile = render_tile(number, &page(number), tile_w, tile_height, fonts);
        let x = slot as u32 * (tile_w + GUTTER);
        imageops::overlay(&mut frame, &tile, x as i64, 0);
    }
    frame
}

fn render_tile(number: usize, image: &PageImage, width: u32, height: u32, fonts: &FontSet) -> RgbaImage {
    let mut canvas = match image {
        PageImage::Loaded(render) => match to_rgba_image(render) {
            Some(source) => Canvas::from_image(contain(&source, width, height)),
            None => placeholder(number, width, height, fonts, false),
        },
        PageImage::Loading => placeholder(number, width, height, fonts, true),
        PageImage::Missing => placeholder(number, width, height, fonts, false),
    };
    draw_badge(&mut canvas, number, fonts);
    canvas.into_image()
}

/// Scales `source` to fit inside the box keeping its aspect ratio, centered
/// on a white card.
fn contain(source: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let mut card = RgbaImage::from_pixel(width, height, CARD);
    if source.width() == 0 || source.height() == 0 {
        return card;
    }
    let scale = (width as f32 / source.width() as f32).min(height as f32 / source.height() as f32);
    let w = ((source.width() as f32 * scale).round() as u32).clamp(1, width);
    let h = ((source.height() as f32 * scale).round() as u32).clamp(1, height);
    let resized = imageops::resize(source, w, h, FilterType::Triangle);
    imageops::overlay(&mut card, &resized, ((width - w) / 2) as i64, ((height - h) / 2) as i64);
    card
}

fn placeholder(number: usize, width: u32, height: u32, fonts: &FontSet, loading: bool) -> Canvas {
    let mut canvas = Canvas::new(width, height, CARD);
    canvas.fill_linear_gradient((0.0, 0.0), (width as f32, height as f32), PEACH, CARD);
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let size = (height as f32 * 0.03).max(12.0);
    if loading {
        canvas.fill_text(fonts, "載入中...", cx, cy, TextStyle::new(size, MUTED).centered());
    } else {
        canvas.fill_text(
            fonts,
            &format!("第 {} 頁", number),
            cx,
            cy,
            TextStyle::new(size, MUTED).centered(),
        );
        canvas.fill_text(
            fonts,
            "(圖片尚未上傳)",
            cx,
            cy + size * 1.6,
            TextStyle::new(size * 0.8, MUTED_FAINT).centered(),
        );
    }
    canvas
}

fn draw_badge(canvas: &mut Canvas, number: usize, fonts: &FontSet) {
    let height = canvas.height() as f32;
    let text_size = (height * 0.025).max(10.0);
    let label = number.to_string();
    let text_w = fonts.measure(&label, text_size).max(text_size);
    let pill_h = text_size * 1.8;
    let pill_w = text_w + text_size * 1.6;
    let x = (canvas.width() as f32 - pill_w) / 2.0;
    let y = height - pill_h - (height * 0.02).max(4.0);
    canvas.fill_rounded_rect(x, y, pill_w, pill_h, pill_h / 2.0, BADGE_FILL);
    canvas.fill_text(
        fonts,
        &label,
        canvas.width() as f32 / 2.0,
        y + pill_h / 2.0 + text_size * 0.35,
        TextStyle::new(text_size, BADGE_TEXT).bold().centered(),
    );
}

/// Applies the viewport transform: the output keeps the input size. Above
/// 1.0 a `1/zoom` window is cropped around the center shifted by `pan`
/// (in output pixels); below 1.0 the image is shrunk and centered.
pub fn apply_zoom(image: &RgbaImage, zoom: f32, pan: Point) -> RgbaImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || (zoom - 1.0).abs() < f32::EPSILON {
        return image.clone();
    }
    if zoom > 1.0 {
        let window_w = ((width as f32 / zoom).round() as u32).clamp(1, width);
        let window_h = ((height as f32 / zoom).round() as u32).clamp(1, height);
        let max_x = (width - window_w) as f32;
        let max_y = (height - window_h) as f32;
        let x = (max_x / 2.0 - pan.x / zoom).clamp(0.0, max_x).round() as u32;
        let y = (max_y / 2.0 - pan.y / zoom).clamp(0.0, max_y).round() as u32;
        let window = imageops::crop_imm(image, x, y, window_w, window_h).to_image();
        return imageops::resize(&window, width, height, FilterType::Triangle);
    }
    let w = ((width as f32 * zoom).round() as u32).max(1);
    let h = ((height as f32 * zoom).round() as u32).max(1);
    let shrunk = imageops::resize(image, w, h, FilterType::Triangle);
    let mut out = RgbaImage::from_pixel(width, height, BACKDROP);
    imageops::overlay(&mut out, &shrunk, ((width - w) / 2) as i64, ((height - h) / 2) as i64);
    out
}

/// One animation frame of a page turn. The frame narrows towards the left
/// edge when moving forward and towards the right edge when moving back.
pub fn flip_frame(image: &RgbaImage, direction: FlipDirection, progress: f32) -> RgbaImage {
    let (width, height) = image.dimensions();
    let progress = progress.clamp(0.0, 1.0);
    if width == 0 || height == 0 || progress <= 0.0 {
        return image.clone();
    }
    let mut out = RgbaImage::from_pixel(width, height, BACKDROP);
    let squashed_w = ((width as f32 * (1.0 - progress)).round() as u32).max(1);
    let squashed = imageops::resize(image, squashed_w, height, FilterType::Triangle);
    let x = match direction {
        FlipDirection::Forward => 0,
        FlipDirection::Backward => width - squashed_w,
    };
    imageops::overlay(&mut out, &squashed, x as i64, 0);
    out
}
