//! Certificate and pledge card images, plus saving them to disk.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Local, NaiveDate};
use image::{ImageFormat, RgbaImage};
use tracing::{info, instrument, warn};

use crate::canvas::{rgb, Canvas, FontSet, TextStyle};

pub const CERTIFICATE_SIZE: (u32, u32) = (600, 400);
pub const PLEDGE_CARD_SIZE: (u32, u32) = (800, 1130);

const INK: image::Rgba<u8> = rgb(0x1E, 0x29, 0x3B);
const SLATE: image::Rgba<u8> = rgb(0x47, 0x55, 0x69);
const MUTED: image::Rgba<u8> = rgb(0x64, 0x74, 0x8B);
const FAINT: image::Rgba<u8> = rgb(0x94, 0xA3, 0xB8);
const ORANGE: image::Rgba<u8> = rgb(0xF9, 0x73, 0x16);
const SKY_FILL: image::Rgba<u8> = rgb(0xF0, 0xF9, 0xFF);
const SKY_DASH: image::Rgba<u8> = rgb(0x7D, 0xD3, 0xFC);

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn certificate_filename(name: &str) -> String {
    format!("{}_AI學習證書.png", sanitize_file_stem(name))
}

pub fn pledge_card_filename(name: &str) -> String {
    format!("{}_AI使用承諾卡.png", sanitize_file_stem(name))
}

/// Replaces characters that cannot appear in a file name on common platforms.
fn sanitize_file_stem(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect();
    if cleaned.is_empty() {
        "flipbook".to_string()
    } else {
        cleaned
    }
}

/// 600x400 quiz certificate.
pub fn render_certificate(name: &str, score: u32, total: usize, date: NaiveDate, fonts: &FontSet) -> RgbaImage {
    let (width, height) = CERTIFICATE_SIZE;
    let mut canvas = Canvas::new(width, height, rgb(255, 255, 255));
    canvas.fill_linear_gradient(
        (0.0, 0.0),
        (width as f32, height as f32),
        rgb(0xFF, 0xF5, 0xE6),
        rgb(0xFF, 0xE4, 0xCC),
    );
    canvas.stroke_rect(20.0, 20.0, 560.0, 360.0, 8.0, ORANGE);

    let center = width as f32 / 2.0;
    canvas.fill_text(fonts, "AI 學習小達人", center, 80.0, TextStyle::new(32.0, INK).bold().centered());
    canvas.fill_text(fonts, name, center, 160.0, TextStyle::new(48.0, ORANGE).bold().centered());
    canvas.fill_text(
        fonts,
        &format!("測驗成績：{} / {}", score, total),
        center,
        220.0,
        TextStyle::new(24.0, MUTED).centered(),
    );
    canvas.fill_text(fonts, "恭喜你完成了 AI 學習測驗！", center, 280.0, TextStyle::new(20.0, INK).centered());
    canvas.fill_text(fonts, "你已經是 AI 時代的小達人了！", center, 310.0, TextStyle::new(20.0, INK).centered());
    canvas.fill_text(
        fonts,
        &date.format("%Y/%-m/%-d").to_string(),
        center,
        360.0,
        TextStyle::new(16.0, FAINT).centered(),
    );
    canvas.into_image()
}

pub struct PledgeCard<'a> {
    pub name: &'a str,
    /// May be empty; the underline is drawn either way.
    pub signature: &'a str,
    pub date: NaiveDate,
    pub pledges: &'a [String],
    pub footer: &'a str,
}

/// 800x1130 pledge card.
pub fn render_pledge_card(card: &PledgeCard<'_>, fonts: &FontSet) -> RgbaImage {
    let (width, height) = PLEDGE_CARD_SIZE;
    let mut canvas = Canvas::new(width, height, rgb(0xFE, 0xF9, 0xF3));
    let center = width as f32 / 2.0;

    canvas.fill_text(fonts, "我的 AI 使用承諾卡", center, 70.0, TextStyle::new(42.0, SLATE).bold().centered());

    let banner_y = 100.0;
    canvas.fill_rounded_rect(80.0, banner_y, 640.0, 50.0, 12.0, rgb(0xFE, 0xF0, 0x8A));
    canvas.stroke_rounded_rect(80.0, banner_y, 640.0, 50.0, 12.0, 2.0, rgb(0xEA, 0xB3, 0x08));
    canvas.fill_text(
        fonts,
        "簽署AI使用承諾卡",
        center,
        banner_y + 35.0,
        TextStyle::new(20.0, SLATE).bold().centered(),
    );

    let box_x = 60.0;
    let box_w = 680.0;
    let content_y = 180.0;
    let content_h = 680.0;
    dashed_box(&mut canvas, box_x, content_y, box_w, content_h);

    let padding = 50.0;
    let text_x = box_x + padding;
    let mut y = content_y + padding;
    canvas.fill_text(fonts, &format!("我是 {}", card.name), text_x, y, TextStyle::new(22.0, INK));
    y += 50.0;
    canvas.fill_text(fonts, "我願意承諾：", text_x, y, TextStyle::new(22.0, INK).bold());
    y += 50.0;

    for pledge in card.pledges {
        checked_box(&mut canvas, text_x, y - 18.0, 20.0);
        canvas.fill_text(fonts, pledge, text_x + 35.0, y, TextStyle::new(20.0, INK));
        y += 45.0;
    }
    y += 40.0;

    canvas.fill_text(fonts, "簽名：", text_x, y, TextStyle::new(20.0, INK));
    let signature_x = text_x + 70.0;
    canvas.hline(signature_x, signature_x + 350.0, y + 6.0, 1.5, FAINT);
    if !card.signature.is_empty() {
        canvas.fill_text(fonts, card.signature, signature_x, y, TextStyle::new(20.0, INK));
    }
    y += 50.0;
    canvas.fill_text(
        fonts,
        &format!("日期：{}", card.date.format("%Y/%m/%d")),
        text_x,
        y,
        TextStyle::new(20.0, INK),
    );

    let bottom_y = content_y + content_h + 30.0;
    dashed_box(&mut canvas, box_x, bottom_y, box_w, 120.0);
    canvas.fill_text(
        fonts,
        "下載我的承諾卡",
        center,
        bottom_y + 70.0,
        TextStyle::new(22.0, INK).bold().centered(),
    );

    canvas.fill_text(fonts, card.footer, center, 1110.0, TextStyle::new(16.0, FAINT).centered());
    canvas.into_image()
}

fn dashed_box(canvas: &mut Canvas, x: f32, y: f32, w: f32, h: f32) {
    canvas.fill_rect(x, y, w, h, SKY_FILL);
    canvas.stroke_dashed_rect(x, y, w, h, 2.5, (12.0, 6.0), SKY_DASH);
}

/// Ticked checkbox drawn from shapes so it does not depend on font coverage.
fn checked_box(canvas: &mut Canvas, x: f32, y: f32, size: f32) {
    canvas.stroke_rect(x, y, size, size, 2.0, INK);
    let steps = (size * 2.0) as usize;
    for step in 0..steps {
        let t = step as f32 / steps as f32;
        let (px, py) = if t < 0.35 {
            let k = t / 0.35;
            (x + size * (0.2 + 0.2 * k), y + size * (0.5 + 0.25 * k))
        } else {
            let k = (t - 0.35) / 0.65;
            (x + size * (0.4 + 0.4 * k), y + size * (0.75 - 0.55 * k))
        };
        canvas.fill_rect(px - 1.25, py - 1.25, 2.5, 2.5, INK);
    }
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(bytes.into_inner())
}

pub fn to_data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    pub path: PathBuf,
    pub used_fallback: bool,
}

/// Writes generated images to the export directory, or to the fallback
/// directory when the export directory is unusable.
#[derive(Debug, Clone)]
pub struct ArtifactSink {
    primary: PathBuf,
    fallback: PathBuf,
}

impl ArtifactSink {
    pub fn new(primary: PathBuf, fallback: PathBuf) -> Self {
        Self { primary, fallback }
    }

    pub fn primary(&self) -> &Path {
        &self.primary
    }

    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub fn save(&self, bytes: &[u8], filename: &str) -> Result<SavedArtifact> {
        match write_into(&self.primary, bytes, filename) {
            Ok(path) => {
                info!(?path, "saved image");
                Ok(SavedArtifact {
                    path,
                    used_fallback: false,
                })
            }
            Err(err) => {
                warn!(dir = ?self.primary, error = %err, "export directory unusable, using fallback");
                let path = write_into(&self.fallback, bytes, filename)?;
                info!(?path, "saved image to fallback directory");
                Ok(SavedArtifact {
                    path,
                    used_fallback: true,
                })
            }
        }
    }
}

fn write_into(dir: &Path, bytes: &[u8], filename: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {:?}", dir))?;
    let path = dir.join(filename);
    fs::write(&path, bytes).with_context(|| format!("failed to write {:?}", path))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flipbook_core::Handbook;
    use tempfile::tempdir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
    }

    #[test]
    fn certificate_has_border_and_gradient() {
        let image = render_certificate("小明", 9, 10, date(), &FontSet::none());
        assert_eq!(image.dimensions(), CERTIFICATE_SIZE);
        assert_eq!(*image.get_pixel(20, 200), ORANGE);
        assert_eq!(*image.get_pixel(300, 18), ORANGE);
        let corner = image.get_pixel(2, 2);
        assert_eq!(corner.0[..2], [0xFF, 0xF5]);
        let opposite = image.get_pixel(597, 397);
        assert_eq!(opposite.0[..2], [0xFF, 0xE4]);
    }

    #[test]
    fn pledge_card_draws_layout_boxes() {
        let handbook = Handbook::builtin();
        let card = PledgeCard {
            name: "小明",
            signature: "",
            date: date(),
            pledges: &handbook.pledges,
            footer: &handbook.credit,
        };
        let image = render_pledge_card(&card, &FontSet::none());
        assert_eq!(image.dimensions(), PLEDGE_CARD_SIZE);
        assert_eq!(*image.get_pixel(5, 5), rgb(0xFE, 0xF9, 0xF3));
        assert_eq!(*image.get_pixel(400, 125), rgb(0xFE, 0xF0, 0x8A));
        assert_eq!(*image.get_pixel(400, 500), SKY_FILL);
        assert_eq!(*image.get_pixel(65, 180), SKY_DASH);
        assert_eq!(*image.get_pixel(400, 950), SKY_FILL);
    }

    #[test]
    fn png_round_trips_through_data_uri() {
        let image = render_certificate("A", 7, 10, date(), &FontSet::none());
        let png = encode_png(&image).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let uri = to_data_uri(&png);
        let payload = uri.strip_prefix("data:image/png;base64,").unwrap();
        assert_eq!(STANDARD.decode(payload).unwrap(), png);
    }

    #[test]
    fn filenames_follow_artifact_names() {
        assert_eq!(certificate_filename("小明"), "小明_AI學習證書.png");
        assert_eq!(pledge_card_filename("小明"), "小明_AI使用承諾卡.png");
        assert_eq!(certificate_filename("a/b"), "a_b_AI學習證書.png");
    }

    #[test]
    fn sink_writes_to_primary_directory() {
        let dir = tempdir().unwrap();
        let sink = ArtifactSink::new(dir.path().join("downloads"), dir.path().join("fallback"));
        let saved = sink.save(b"png", "card.png").unwrap();
        assert!(!saved.used_fallback);
        assert_eq!(saved.path, dir.path().join("downloads").join("card.png"));
        assert_eq!(fs::read(&saved.path).unwrap(), b"png");
    }

    #[test]
    fn sink_falls_back_when_primary_is_unusable() {
        let dir = tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        fs::write(&blocked, b"a file, not a directory").unwrap();
        let sink = ArtifactSink::new(blocked, dir.path().join("fallback"));
        let saved = sink.save(b"png", "card.png").unwrap();
        assert!(saved.used_fallback);
        assert_eq!(saved.path, dir.path().join("fallback").join("card.png"));
    }
}
