use flipbook_core::Point;
use flipbook_render::compose::{tile_width, GUTTER, PAGE_ASPECT};
use flipbook_tty::CellMetrics;

/// Largest page tile rendered, in pixels. Bigger terminals scale the image up.
const MAX_TILE_HEIGHT: f32 = 1400.0;
const MIN_TILE_HEIGHT: f32 = 64.0;

#[derive(Debug, Clone, Copy)]
pub struct Screen {
    pub columns: u32,
    pub rows: u32,
    pub cells: CellMetrics,
}

impl Screen {
    pub fn new(columns: u16, rows: u16, width_px: u16, height_px: u16) -> Self {
        Self {
            columns: u32::from(columns).max(1),
            rows: u32::from(rows).max(1),
            cells: CellMetrics::from_window(columns, rows, width_px, height_px),
        }
    }

    /// Rows above the status line.
    pub fn content_rows(&self) -> u32 {
        self.rows.saturating_sub(1).max(1)
    }

    pub fn page_area(&self) -> (u32, u32) {
        let cols = self.columns.saturating_sub(self.columns.min(2)).max(1);
        let rows = self
            .content_rows()
            .saturating_sub(self.content_rows().min(2))
            .max(1);
        (cols, rows)
    }

    pub fn display_width_px(&self) -> u32 {
        self.cells.display_width(self.columns.min(u32::from(u16::MAX)) as u16)
    }
}

/// Height of one page tile so that `tiles` pages fit the page area.
pub fn tile_height_for(screen: &Screen, tiles: usize) -> u32 {
    let tiles = tiles.max(1) as f32;
    let (cols, rows) = screen.page_area();
    let area_w = cols as f32 * screen.cells.width;
    let area_h = rows as f32 * screen.cells.height;
    let by_width = (area_w - GUTTER as f32 * (tiles - 1.0)).max(1.0) / tiles / PAGE_ASPECT;
    area_h
        .min(by_width)
        .clamp(MIN_TILE_HEIGHT, MAX_TILE_HEIGHT)
        .round() as u32
}

/// Cells needed to show an image of `width` x `height` pixels inside the
/// available area, keeping its aspect ratio.
pub fn compute_scaled_dimensions(
    width: u32,
    height: u32,
    available_cols: u32,
    available_rows: u32,
    cells: CellMetrics,
) -> (u32, u32) {
    let available_cols = available_cols.max(1);
    let available_rows = available_rows.max(1);
    if width == 0 || height == 0 || cells.width <= 0.0 || cells.height <= 0.0 {
        return (available_cols, available_rows);
    }
    let scale = (available_cols as f32 * cells.width / width as f32)
        .min(available_rows as f32 * cells.height / height as f32);
    if !scale.is_finite() || scale <= 0.0 {
        return (available_cols, available_rows);
    }
    let cols = (width as f32 * scale / cells.width).round() as u32;
    let rows = (height as f32 * scale / cells.height).round() as u32;
    (cols.clamp(1, available_cols), rows.clamp(1, available_rows))
}

/// Converts a pan offset measured in terminal pixels into image pixels for an
/// image of `image_width` drawn across `draw_cols` cells.
pub fn pan_to_image_pixels(pan: Point, image_width: u32, draw_cols: u32, cells: CellMetrics) -> Point {
    let shown = draw_cols as f32 * cells.width;
    if shown <= 0.0 {
        return pan;
    }
    let ratio = image_width as f32 / shown;
    Point::new(pan.x * ratio, pan.y * ratio)
}

/// Terminal column width of a character. East Asian wide characters take
/// two columns.
pub fn char_width(c: char) -> usize {
    let code = c as u32;
    let wide = matches!(
        code,
        0x1100..=0x115F
            | 0x2E80..=0x303E
            | 0x3041..=0x33FF
            | 0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xA000..=0xA4CF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFF60
            | 0xFFE0..=0xFFE6
            | 0x1F300..=0x1F64F
            | 0x1F900..=0x1F9FF
            | 0x20000..=0x3FFFD
    );
    if wide {
        2
    } else {
        1
    }
}

pub fn display_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}

/// Cuts `text` to `width` columns, marking the cut with `...`, and pads the
/// result with spaces to exactly `width` columns.
pub fn truncate_with_ellipsis(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    if display_width(text) > width {
        let budget = width.saturating_sub(3);
        for c in text.chars() {
            let w = char_width(c);
            if used + w > budget {
                break;
            }
            out.push(c);
            used += w;
        }
        let dots = width.saturating_sub(used).min(3);
        out.push_str(&".".repeat(dots));
        used += dots;
    } else {
        out.push_str(text);
        used = display_width(text);
    }
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

/// Greedy wrap on character boundaries, which suits CJK text without spaces.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(2);
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut used = 0;
        for c in paragraph.chars() {
            let w = char_width(c);
            if used + w > width {
                lines.push(std::mem::take(&mut line));
                used = 0;
            }
            line.push(c);
            used += w;
        }
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen() -> Screen {
        Screen::new(200, 51, 1600, 1020)
    }

    #[test]
    fn spread_tiles_fit_page_area() {
        let screen = screen();
        let single = tile_height_for(&screen, 1);
        let double = tile_height_for(&screen, 2);
        let (cols, rows) = screen.page_area();
        assert!(single as f32 <= rows as f32 * screen.cells.height + 0.5);
        let spread = tile_width(double) * 2 + GUTTER;
        assert!(spread as f32 <= cols as f32 * screen.cells.width + 1.0);
        assert!(double <= single);
    }

    #[test]
    fn scaled_dimensions_keep_aspect_ratio() {
        let cells = CellMetrics::from_window(100, 50, 800, 800);
        let (cols, rows) = compute_scaled_dimensions(210, 297, 100, 40, cells);
        assert_eq!(rows, 40);
        assert_eq!(cols, 57);
        let (cols, rows) = compute_scaled_dimensions(0, 10, 30, 20, cells);
        assert_eq!((cols, rows), (30, 20));
    }

    #[test]
    fn pan_scales_with_displayed_size() {
        let cells = CellMetrics::from_window(10, 10, 100, 100);
        let pan = pan_to_image_pixels(Point::new(10.0, -5.0), 200, 10, cells);
        assert_eq!(pan, Point::new(20.0, -10.0));
    }

    #[test]
    fn wide_characters_count_double() {
        assert_eq!(display_width("AI 學習"), 7);
        assert_eq!(truncate_with_ellipsis("學習小達人", 7), "學習...");
        assert_eq!(truncate_with_ellipsis("ab", 4), "ab  ");
    }

    #[test]
    fn wrap_splits_on_width() {
        assert_eq!(wrap_text("一二三四五", 4), vec!["一二", "三四", "五"]);
        assert_eq!(wrap_text("ab\ncd", 10), vec!["ab", "cd"]);
    }
}
