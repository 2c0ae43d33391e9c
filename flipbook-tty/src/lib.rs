use std::io::{self, Write};

use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crossterm::{
    cursor,
    event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind},
    terminal::{Clear, ClearType},
};
use flipbook_core::{Command, Point, PointerInput, RenderImage, Spread};
use png::{BitDepth, ColorType, Encoder};
use tracing::trace;

/// Image id used for the page area.
pub const PAGE_IMAGE_ID: u32 = 1;
/// Image id used for generated certificate and pledge card previews.
pub const PREVIEW_IMAGE_ID: u32 = 2;

pub struct KittyRenderer<W: Write> {
    writer: W,
    placement_id: u32,
}

pub struct DrawParams {
    pub image_id: u32,
    pub columns: u32,
    pub rows: u32,
}

impl DrawParams {
    pub fn clamped(image_id: u32, columns: u32, rows: u32) -> Self {
        Self {
            image_id,
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }
}

impl<W: Write> KittyRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            placement_id: 1,
        }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Transmits `image` as PNG and places it at the cursor, scaled into
    /// `columns` x `rows` cells.
    pub fn draw(&mut self, image: &RenderImage, params: DrawParams) -> Result<()> {
        let mut buffer = Vec::new();
        let mut encoder = Encoder::new(&mut buffer, image.width, image.height);
        encoder.set_color(ColorType::Rgba);
        encoder.set_depth(BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&image.pixels)?;
        writer.finish()?;
        self.transmit_png(&buffer, image.width, image.height, params)
    }

    /// Same as [`draw`](Self::draw) for data that is already PNG encoded.
    pub fn transmit_png(&mut self, png: &[u8], width: u32, height: u32, params: DrawParams) -> Result<()> {
        let encoded = BASE64.encode(png);
        let mut chunks = encoded.as_bytes().chunks(4096).peekable();
        let mut first = true;
        trace!(bytes = encoded.len(), id = params.image_id, "transmitting image");

        while let Some(chunk) = chunks.next() {
            let more = chunks.peek().is_some();
            if first {
                write!(
                    self.writer,
                    "\u{1b}_Ga=T,f=100,C=1,q=2,i={},p={},c={},r={},s={},v={},z=-1,m={}",
                    params.image_id,
                    self.placement_id,
                    params.columns,
                    params.rows,
                    width,
                    height,
                    if more { 1 } else { 0 }
                )?;
                first = false;
            } else {
                write!(self.writer, "\u{1b}_Gm={},q=2", if more { 1 } else { 0 })?;
            }
            if !chunk.is_empty() {
                self.writer.write_all(b";")?;
                self.writer.write_all(chunk)?;
            }
            write!(self.writer, "\u{1b}\\")?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Removes an image and frees its data in the terminal.
    pub fn delete_image(&mut self, image_id: u32) -> Result<()> {
        write!(self.writer, "\u{1b}_Ga=d,d=I,i={},q=2\u{1b}\\", image_id)?;
        Ok(())
    }

    pub fn begin_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026h")?;
        Ok(())
    }

    /// Disables synchronized updates.
    /// The terminal will render all buffered changes at once.
    pub fn end_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026l")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Clears the entire screen.
    pub fn clear_all(&mut self) -> Result<()> {
        crossterm::execute!(
            &mut self.writer,
            Clear(ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        Ok(())
    }
}

/// Pixel size of one terminal cell, used to turn mouse cells into pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMetrics {
    pub width: f32,
    pub height: f32,
}

impl CellMetrics {
    const FALLBACK: CellMetrics = CellMetrics {
        width: 8.0,
        height: 16.0,
    };

    /// Derives the cell size from the window size report. Terminals that do
    /// not report pixel sizes get a common 8x16 cell.
    pub fn from_window(columns: u16, rows: u16, width_px: u16, height_px: u16) -> Self {
        if columns == 0 || rows == 0 || width_px == 0 || height_px == 0 {
            return Self::FALLBACK;
        }
        Self {
            width: width_px as f32 / columns as f32,
            height: height_px as f32 / rows as f32,
        }
    }

    pub fn to_pixels(&self, column: u16, row: u16) -> Point {
        Point::new(
            (column as f32 + 0.5) * self.width,
            (row as f32 + 0.5) * self.height,
        )
    }

    pub fn display_width(&self, columns: u16) -> u32 {
        (columns as f32 * self.width).round() as u32
    }
}

impl Default for CellMetrics {
    fn default() -> Self {
        Self::FALLBACK
    }
}

#[derive(Debug, Clone)]
pub enum UiEvent {
    Command(Command),
    OpenChapters,
    OpenQuiz,
    OpenPledge,
    CloseOverlay,
    MoveSelection { delta: isize },
    Activate,
    QuizAnswer { option: usize },
    QuizRestart,
    TextChanged { text: String },
    TextSubmit { text: String },
    Resize { columns: u16, rows: u16 },
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Chapters,
    Quiz,
    /// Free text entry: welcome name or pledge signature.
    Text,
    /// Read-only panel such as an image preview.
    Dialog,
}

#[derive(Debug, Default)]
pub struct EventMapper {
    pending_count: Option<usize>,
    pending_digits: String,
    mode: InputMode,
    text_buffer: String,
    text_limit: Option<usize>,
    cells: CellMetrics,
    drag_active: bool,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_cell_metrics(&mut self, cells: CellMetrics) {
        self.cells = cells;
    }

    pub fn cell_metrics(&self) -> CellMetrics {
        self.cells
    }

    /// Pointer moves and releases are only routed while a drag is held.
    pub fn set_drag_active(&mut self, active: bool) {
        self.drag_active = active;
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.reset_count();
            self.text_buffer.clear();
            self.text_limit = None;
            self.mode = mode;
        }
    }

    /// Switches to text entry, pre-filled with `initial` and capped at `limit`
    /// characters.
    pub fn begin_text_input(&mut self, initial: &str, limit: usize) {
        self.set_mode(InputMode::Text);
        self.text_limit = Some(limit);
        self.text_buffer = initial.chars().take(limit).collect();
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn text(&self) -> &str {
        &self.text_buffer
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Resize(columns, rows) => UiEvent::Resize { columns, rows },
            Event::Key(KeyEvent {
                kind: KeyEventKind::Release,
                ..
            }) => UiEvent::None,
            Event::Mouse(mouse) if self.mode == InputMode::Normal => self.map_mouse(mouse),
            event => match self.mode {
                InputMode::Normal => self.map_event_normal(event),
                InputMode::Chapters => self.map_event_chapters(event),
                InputMode::Quiz => self.map_event_quiz(event),
                InputMode::Text => self.map_event_text(event),
                InputMode::Dialog => self.map_event_dialog(event),
            },
        }
    }

    fn map_mouse(&mut self, mouse: MouseEvent) -> UiEvent {
        let pointer = PointerInput::Mouse(self.cells.to_pixels(mouse.column, mouse.row));
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => UiEvent::Command(Command::BeginDrag { pointer }),
            MouseEventKind::Drag(MouseButton::Left) if self.drag_active => {
                UiEvent::Command(Command::UpdateDrag { pointer })
            }
            MouseEventKind::Up(MouseButton::Left) if self.drag_active => UiEvent::Command(Command::EndDrag),
            _ => UiEvent::None,
        }
    }

    fn map_event_normal(&mut self, event: Event) -> UiEvent {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event
        else {
            return UiEvent::None;
        };
        match (code, modifiers) {
            // A lone `0` resets the zoom; after other digits it is part of a page number.
            (KeyCode::Char(c), KeyModifiers::NONE)
                if c.is_ascii_digit() && (c != '0' || self.pending_count.is_some()) =>
            {
                if let Some(digit) = c.to_digit(10) {
                    self.push_digit(digit as usize);
                }
                UiEvent::None
            }
            (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Enter, _)
                if self.pending_count.is_some() =>
            {
                let page = self.take_count();
                UiEvent::Command(Command::GotoPage { page })
            }
            (KeyCode::Right, _) | (KeyCode::Char('l'), KeyModifiers::NONE) | (KeyCode::Char(' '), _) => {
                self.command(Command::NextPage)
            }
            (KeyCode::Left, _) | (KeyCode::Char('h'), KeyModifiers::NONE) => self.command(Command::PrevPage),
            (KeyCode::PageDown, _) => self.command(Command::NextPage),
            (KeyCode::PageUp, _) => self.command(Command::PrevPage),
            (KeyCode::Home, _) => self.command(Command::FirstPage),
            (KeyCode::End, _) | (KeyCode::Char('G'), _) => self.command(Command::LastPage),
            (KeyCode::Char('+'), _) | (KeyCode::Char('='), _) => self.command(Command::ZoomIn),
            (KeyCode::Char('-'), _) => self.command(Command::ZoomOut),
            (KeyCode::Char('0'), _) => self.command(Command::ResetZoom),
            (KeyCode::Char('c'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::OpenChapters
            }
            (KeyCode::Char('z'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::OpenQuiz
            }
            (KeyCode::Char('w'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::OpenPledge
            }
            (KeyCode::Char('q'), _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                self.reset_count();
                UiEvent::Quit
            }
            _ => {
                self.reset_count();
                UiEvent::None
            }
        }
    }

    fn map_event_chapters(&mut self, event: Event) -> UiEvent {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event
        else {
            return UiEvent::None;
        };
        match (code, modifiers) {
            (KeyCode::Esc, _) | (KeyCode::Char('c'), KeyModifiers::NONE) => UiEvent::CloseOverlay,
            (KeyCode::Enter, _) => UiEvent::Activate,
            (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, _) => {
                UiEvent::MoveSelection { delta: 1 }
            }
            (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, _) => {
                UiEvent::MoveSelection { delta: -1 }
            }
            (KeyCode::Char('q'), _) => UiEvent::Quit,
            _ => UiEvent::None,
        }
    }

    fn map_event_quiz(&mut self, event: Event) -> UiEvent {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event
        else {
            return UiEvent::None;
        };
        match (code, modifiers) {
            (KeyCode::Esc, _) => UiEvent::CloseOverlay,
            (KeyCode::Enter, _) | (KeyCode::Char(' '), _) => UiEvent::Activate,
            (KeyCode::Char(c @ 'a'..='d'), KeyModifiers::NONE) => UiEvent::QuizAnswer {
                option: (c as u8 - b'a') as usize,
            },
            (KeyCode::Char(c @ '1'..='4'), KeyModifiers::NONE) => UiEvent::QuizAnswer {
                option: (c as u8 - b'1') as usize,
            },
            (KeyCode::Char('r'), KeyModifiers::NONE) => UiEvent::QuizRestart,
            (KeyCode::Char('q'), _) => UiEvent::Quit,
            _ => UiEvent::None,
        }
    }

    fn map_event_dialog(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Key(KeyEvent { code, .. }) => match code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char(' ') => UiEvent::CloseOverlay,
                KeyCode::Char('q') => UiEvent::Quit,
                _ => UiEvent::None,
            },
            _ => UiEvent::None,
        }
    }

    fn map_event_text(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Paste(pasted) => {
                for c in pasted.chars().filter(|c| !c.is_control()) {
                    self.push_text(c);
                }
                UiEvent::TextChanged {
                    text: self.text_buffer.clone(),
                }
            }
            Event::Key(KeyEvent {
                code, modifiers, ..
            }) => match (code, modifiers) {
                (KeyCode::Esc, _) => UiEvent::CloseOverlay,
                (KeyCode::Enter, _) => UiEvent::TextSubmit {
                    text: self.text_buffer.clone(),
                },
                (KeyCode::Backspace, _) => {
                    self.text_buffer.pop();
                    UiEvent::TextChanged {
                        text: self.text_buffer.clone(),
                    }
                }
                (KeyCode::Char(c), mods) if mods.is_empty() || mods == KeyModifiers::SHIFT => {
                    self.push_text(c);
                    UiEvent::TextChanged {
                        text: self.text_buffer.clone(),
                    }
                }
                _ => UiEvent::None,
            },
            _ => UiEvent::None,
        }
    }

    fn push_text(&mut self, c: char) {
        let full = self
            .text_limit
            .is_some_and(|limit| self.text_buffer.chars().count() >= limit);
        if !full {
            self.text_buffer.push(c);
        }
    }

    fn command(&mut self, command: Command) -> UiEvent {
        self.reset_count();
        UiEvent::Command(command)
    }

    fn push_digit(&mut self, digit: usize) {
        let current = self.pending_count.unwrap_or(0);
        let next = current.saturating_mul(10).saturating_add(digit);
        self.pending_count = Some(next);
        if let Some(c) = char::from_digit(digit as u32, 10) {
            self.pending_digits.push(c);
        }
    }

    fn take_count(&mut self) -> usize {
        let count = self.pending_count.take().unwrap_or(1);
        self.pending_digits.clear();
        count
    }

    fn reset_count(&mut self) {
        self.pending_count = None;
        self.pending_digits.clear();
    }

    /// Digits typed so far for a page jump (`12g`).
    pub fn pending_input(&self) -> Option<String> {
        if self.pending_digits.is_empty() {
            None
        } else {
            Some(self.pending_digits.clone())
        }
    }
}

/// `name | p 2-3 / 74 | zoom 150% | chapter`
pub fn format_status_line(
    name: Option<&str>,
    spread: Spread,
    total: usize,
    zoom: f32,
    chapter: Option<&str>,
) -> String {
    let mut parts = Vec::with_capacity(4);
    if let Some(name) = name.filter(|name| !name.is_empty()) {
        parts.push(name.to_string());
    }
    let pages = match spread.right {
        Some(right) => format!("p {}-{} / {}", spread.left, right, total),
        None => format!("p {} / {}", spread.left, total),
    };
    parts.push(pages);
    parts.push(format!("zoom {}%", (zoom * 100.0).round() as u32));
    if let Some(chapter) = chapter {
        parts.push(chapter.to_string());
    }
    parts.join(" | ")
}

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    write!(writer, "{}", label)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    #[test]
    fn kitty_draw_emits_protocol() {
        let mut renderer = KittyRenderer::new(Vec::new());
        let image = RenderImage {
            width: 1,
            height: 1,
            pixels: vec![255, 0, 0, 255],
        };

        renderer
            .draw(&image, DrawParams::clamped(PAGE_IMAGE_ID, 10, 5))
            .unwrap();
        let output = String::from_utf8(renderer.writer).unwrap();
        assert!(output.starts_with("\u{1b}_Ga=T,f=100,C=1,q=2,i=1,p=1,c=10,r=5,s=1,v=1"));
        assert!(output.ends_with("\u{1b}\\"));
    }

    #[test]
    fn kitty_splits_large_payloads_into_chunks() {
        let mut renderer = KittyRenderer::new(Vec::new());
        let png = vec![7u8; 6000];
        renderer
            .transmit_png(&png, 10, 10, DrawParams::clamped(PREVIEW_IMAGE_ID, 0, 0))
            .unwrap();
        let output = String::from_utf8(renderer.writer).unwrap();
        assert!(output.contains("i=2"));
        assert!(output.contains("c=1,r=1"));
        assert!(output.contains(",m=1;"));
        assert!(output.contains("\u{1b}_Gm=0,q=2;"));
    }

    fn key_event(code: KeyCode) -> Event {
        key_event_with_modifiers(code, KeyModifiers::NONE)
    }

    fn key_event_with_modifiers(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn mouse_event(kind: MouseEventKind, column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn arrows_and_letters_turn_pages() {
        let mut mapper = EventMapper::new();
        for event in [key_event(KeyCode::Right), key_event(KeyCode::Char('l')), key_event(KeyCode::PageDown)] {
            assert!(matches!(
                mapper.map_event(event),
                UiEvent::Command(Command::NextPage)
            ));
        }
        for event in [key_event(KeyCode::Left), key_event(KeyCode::Char('h')), key_event(KeyCode::PageUp)] {
            assert!(matches!(
                mapper.map_event(event),
                UiEvent::Command(Command::PrevPage)
            ));
        }
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Home)),
            UiEvent::Command(Command::FirstPage)
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::End)),
            UiEvent::Command(Command::LastPage)
        ));
    }

    #[test]
    fn zoom_keys_map_to_viewport_commands() {
        let mut mapper = EventMapper::new();
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('+'))),
            UiEvent::Command(Command::ZoomIn)
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('-'))),
            UiEvent::Command(Command::ZoomOut)
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('0'))),
            UiEvent::Command(Command::ResetZoom)
        ));
    }

    #[test]
    fn digits_build_page_jump() {
        let mut mapper = EventMapper::new();
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('1'))),
            UiEvent::None
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('0'))),
            UiEvent::None
        ));
        assert_eq!(mapper.pending_input().as_deref(), Some("10"));
        match mapper.map_event(key_event(KeyCode::Char('g'))) {
            UiEvent::Command(Command::GotoPage { page }) => assert_eq!(page, 10),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(mapper.pending_input().is_none());
    }

    #[test]
    fn other_key_drops_pending_digits() {
        let mut mapper = EventMapper::new();
        mapper.map_event(key_event(KeyCode::Char('4')));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Right)),
            UiEvent::Command(Command::NextPage)
        ));
        assert!(mapper.pending_input().is_none());
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Enter)),
            UiEvent::None
        ));
    }

    #[test]
    fn overlay_shortcuts_and_quit() {
        let mut mapper = EventMapper::new();
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('c'))),
            UiEvent::OpenChapters
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('z'))),
            UiEvent::OpenQuiz
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('w'))),
            UiEvent::OpenPledge
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('q'))),
            UiEvent::Quit
        ));
    }

    #[test]
    fn mouse_drag_uses_cell_size_for_pixels() {
        let mut mapper = EventMapper::new();
        mapper.set_cell_metrics(CellMetrics::from_window(100, 50, 1000, 1000));
        match mapper.map_event(mouse_event(MouseEventKind::Down(MouseButton::Left), 3, 4)) {
            UiEvent::Command(Command::BeginDrag {
                pointer: PointerInput::Mouse(point),
            }) => {
                assert!((point.x - 35.0).abs() < f32::EPSILON);
                assert!((point.y - 90.0).abs() < f32::EPSILON);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        mapper.set_drag_active(true);
        assert!(matches!(
            mapper.map_event(mouse_event(MouseEventKind::Drag(MouseButton::Left), 5, 4)),
            UiEvent::Command(Command::UpdateDrag { .. })
        ));
        assert!(matches!(
            mapper.map_event(mouse_event(MouseEventKind::Up(MouseButton::Left), 5, 4)),
            UiEvent::Command(Command::EndDrag)
        ));
        assert!(matches!(
            mapper.map_event(mouse_event(MouseEventKind::Down(MouseButton::Right), 5, 4)),
            UiEvent::None
        ));
    }

    #[test]
    fn pointer_moves_without_drag_are_dropped() {
        let mut mapper = EventMapper::new();
        assert!(matches!(
            mapper.map_event(mouse_event(MouseEventKind::Drag(MouseButton::Left), 5, 4)),
            UiEvent::None
        ));
        assert!(matches!(
            mapper.map_event(mouse_event(MouseEventKind::Up(MouseButton::Left), 5, 4)),
            UiEvent::None
        ));
        mapper.set_drag_active(true);
        mapper.set_drag_active(false);
        assert!(matches!(
            mapper.map_event(mouse_event(MouseEventKind::Drag(MouseButton::Left), 6, 4)),
            UiEvent::None
        ));
    }

    #[test]
    fn mouse_is_ignored_while_overlay_is_open() {
        let mut mapper = EventMapper::new();
        mapper.set_mode(InputMode::Quiz);
        assert!(matches!(
            mapper.map_event(mouse_event(MouseEventKind::Down(MouseButton::Left), 1, 1)),
            UiEvent::None
        ));
    }

    #[test]
    fn missing_pixel_report_falls_back_to_default_cells() {
        assert_eq!(CellMetrics::from_window(80, 24, 0, 0), CellMetrics::default());
        assert_eq!(CellMetrics::default().display_width(100), 800);
    }

    #[test]
    fn chapter_mode_maps_navigation_keys() {
        let mut mapper = EventMapper::new();
        mapper.set_mode(InputMode::Chapters);

        match mapper.map_event(key_event(KeyCode::Char('j'))) {
            UiEvent::MoveSelection { delta } => assert_eq!(delta, 1),
            other => panic!("unexpected event: {:?}", other),
        }
        match mapper.map_event(key_event(KeyCode::Up)) {
            UiEvent::MoveSelection { delta } => assert_eq!(delta, -1),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Enter)),
            UiEvent::Activate
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Esc)),
            UiEvent::CloseOverlay
        ));
    }

    #[test]
    fn quiz_mode_maps_letters_and_digits_to_options() {
        let mut mapper = EventMapper::new();
        mapper.set_mode(InputMode::Quiz);
        match mapper.map_event(key_event(KeyCode::Char('c'))) {
            UiEvent::QuizAnswer { option } => assert_eq!(option, 2),
            other => panic!("unexpected event: {:?}", other),
        }
        match mapper.map_event(key_event(KeyCode::Char('1'))) {
            UiEvent::QuizAnswer { option } => assert_eq!(option, 0),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('r'))),
            UiEvent::QuizRestart
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Enter)),
            UiEvent::Activate
        ));
    }

    #[test]
    fn text_mode_collects_input_up_to_limit() {
        let mut mapper = EventMapper::new();
        mapper.begin_text_input("小", 3);
        match mapper.map_event(key_event(KeyCode::Char('明'))) {
            UiEvent::TextChanged { ref text } => assert_eq!(text, "小明"),
            other => panic!("unexpected event: {:?}", other),
        }
        mapper.map_event(key_event_with_modifiers(KeyCode::Char('A'), KeyModifiers::SHIFT));
        mapper.map_event(key_event(KeyCode::Char('b')));
        assert_eq!(mapper.text(), "小明A");
        match mapper.map_event(key_event(KeyCode::Backspace)) {
            UiEvent::TextChanged { ref text } => assert_eq!(text, "小明"),
            other => panic!("unexpected event: {:?}", other),
        }
        match mapper.map_event(key_event(KeyCode::Enter)) {
            UiEvent::TextSubmit { ref text } => assert_eq!(text, "小明"),
            other => panic!("unexpected event: {:?}", other),
        }
        mapper.set_mode(InputMode::Normal);
        assert!(mapper.text().is_empty());
    }

    #[test]
    fn dialog_mode_closes_on_enter_or_escape() {
        let mut mapper = EventMapper::new();
        mapper.set_mode(InputMode::Dialog);
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Enter)),
            UiEvent::CloseOverlay
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Esc)),
            UiEvent::CloseOverlay
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Right)),
            UiEvent::None
        ));
    }

    #[test]
    fn key_release_is_ignored() {
        let mut mapper = EventMapper::new();
        let release = Event::Key(KeyEvent {
            code: KeyCode::Right,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        });
        assert!(matches!(mapper.map_event(release), UiEvent::None));
    }

    #[test]
    fn status_line_shows_spread_zoom_and_chapter() {
        let line = format_status_line(
            Some("小明"),
            Spread {
                left: 2,
                right: Some(3),
            },
            74,
            1.5,
            Some("第一章"),
        );
        assert_eq!(line, "小明 | p 2-3 / 74 | zoom 150% | 第一章");
        let cover = format_status_line(None, Spread::single(1), 74, 1.0, None);
        assert_eq!(cover, "p 1 / 74 | zoom 100%");
    }
}
