use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use crossterm::cursor;
use crossterm::style::{Attribute, Print, SetAttribute};
use flipbook_core::{Handbook, QuizPhase, QuizSession};
use flipbook_tty::InputMode;

use crate::layout::{display_width, truncate_with_ellipsis, wrap_text};

pub enum OverlayState {
    None,
    Chapters(ChapterWindow),
    Quiz(Box<QuizOverlay>),
    Prompt(TextPrompt),
    Preview(Preview),
}

impl OverlayState {
    pub fn deactivate(&mut self) {
        *self = OverlayState::None;
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, OverlayState::None)
    }

    pub fn input_mode(&self) -> InputMode {
        match self {
            OverlayState::None => InputMode::Normal,
            OverlayState::Chapters(_) => InputMode::Chapters,
            OverlayState::Quiz(_) => InputMode::Quiz,
            OverlayState::Prompt(_) => InputMode::Text,
            OverlayState::Preview(_) => InputMode::Dialog,
        }
    }
}

pub struct ChapterEntry {
    pub title: String,
    pub start_page: usize,
}

/// Chapter list with a selection cursor, scrolled to keep the selection visible.
pub struct ChapterWindow {
    pub entries: Vec<ChapterEntry>,
    pub selected: usize,
    pub scroll_offset: usize,
    pub header: Vec<String>,
}

impl ChapterWindow {
    pub fn from_handbook(handbook: &Handbook, current_page: usize, header: Vec<String>) -> Self {
        let entries = handbook
            .chapters
            .iter()
            .map(|chapter| ChapterEntry {
                title: chapter.title.clone(),
                start_page: chapter.start_page,
            })
            .collect();
        let selected = handbook
            .chapter_for_page(current_page)
            .map(|(index, _)| index)
            .unwrap_or(0);
        Self {
            entries,
            selected,
            scroll_offset: 0,
            header,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index into the handbook's chapter list.
    pub fn selected_index(&self) -> Option<usize> {
        (!self.entries.is_empty()).then_some(self.selected)
    }

    pub fn move_selection(&mut self, delta: isize) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let len = self.entries.len() as isize;
        let next = (self.selected as isize + delta).clamp(0, len - 1) as usize;
        if next != self.selected {
            self.selected = next;
            true
        } else {
            false
        }
    }

    pub fn ensure_visible(&mut self, viewport_height: usize) {
        if viewport_height == 0 || self.entries.is_empty() {
            self.scroll_offset = 0;
            return;
        }
        let max_offset = self.entries.len().saturating_sub(viewport_height);
        self.scroll_offset = self.scroll_offset.min(max_offset);
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + viewport_height {
            self.scroll_offset = self.selected + 1 - viewport_height;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateState {
    NotRequested,
    Generating,
    Saved(PathBuf),
    Failed(String),
}

pub struct QuizOverlay {
    pub session: QuizSession,
    pub certificate: CertificateState,
    pub best_score: Option<u32>,
}

impl QuizOverlay {
    pub fn new(session: QuizSession, best_score: Option<u32>) -> Self {
        Self {
            session,
            certificate: CertificateState::NotRequested,
            best_score,
        }
    }

    pub fn title(&self) -> &'static str {
        match self.session.phase() {
            QuizPhase::Intro => "AI 知識小測驗",
            QuizPhase::Question => "AI 知識小測驗",
            QuizPhase::Result if self.session.passed() => "太棒了！",
            QuizPhase::Result => "繼續加油！",
        }
    }

    pub fn lines(&self, width: usize) -> Vec<PanelLine> {
        let quiz = &self.session;
        let mut lines = Vec::new();
        match quiz.phase() {
            QuizPhase::Intro => {
                push_wrapped(
                    &mut lines,
                    &format!(
                        "這個測驗有 {} 道題目，答對 {} 題以上就能獲得 AI 學習證書！",
                        quiz.total(),
                        quiz.pass_score()
                    ),
                    width,
                );
                if let Some(best) = self.best_score {
                    lines.push(PanelLine::plain(format!("目前最佳成績：{} / {}", best, quiz.total())));
                }
                lines.push(PanelLine::blank());
                lines.push(PanelLine::plain("Enter 開始測驗  Esc 關閉"));
            }
            QuizPhase::Question => {
                let Some(question) = quiz.current_question() else {
                    return lines;
                };
                lines.push(PanelLine::plain(format!(
                    "第 {} / {} 題    得分 {}",
                    quiz.question_index() + 1,
                    quiz.total(),
                    quiz.score()
                )));
                push_wrapped(&mut lines, &question.question, width);
                lines.push(PanelLine::blank());
                let feedback = quiz.feedback();
                for (index, option) in question.options.iter().enumerate() {
                    let label = (b'A' + index as u8) as char;
                    let marker = match feedback {
                        Some(_) if question.is_correct(index) => "✓",
                        Some(f) if f.selected == index => "✗",
                        _ => " ",
                    };
                    let text = format!("{} {}. {}", marker, label, option);
                    lines.push(PanelLine {
                        text,
                        highlight: feedback.is_some_and(|f| f.selected == index),
                    });
                }
                if let Some(feedback) = feedback {
                    lines.push(PanelLine::blank());
                    let verdict = if feedback.correct {
                        "✓ 答對了！".to_string()
                    } else {
                        let label = (b'A' + question.answer as u8) as char;
                        format!("✗ 答錯了，正確答案是 {}", label)
                    };
                    lines.push(PanelLine::plain(verdict));
                    push_wrapped(&mut lines, &question.explanation, width);
                    lines.push(PanelLine::blank());
                    let next = if quiz.is_last_question() {
                        "Enter 看結果"
                    } else {
                        "Enter 下一題"
                    };
                    lines.push(PanelLine::plain(next));
                } else {
                    lines.push(PanelLine::blank());
                    lines.push(PanelLine::plain("按 A-D 或 1-4 作答"));
                }
            }
            QuizPhase::Result => {
                lines.push(PanelLine::plain(format!(
                    "你答對了 {} / {} 題",
                    quiz.score(),
                    quiz.total()
                )));
                if quiz.passed() {
                    let status = match &self.certificate {
                        CertificateState::NotRequested | CertificateState::Generating => {
                            "正在生成證書...".to_string()
                        }
                        CertificateState::Saved(path) => format!("證書已儲存：{}", path.display()),
                        CertificateState::Failed(reason) => format!("證書儲存失敗：{}", reason),
                    };
                    push_wrapped(&mut lines, &status, width);
                } else {
                    lines.push(PanelLine::plain(format!(
                        "答對 {} 題以上就能獲得證書，再試一次吧！",
                        quiz.pass_score()
                    )));
                }
                lines.push(PanelLine::blank());
                lines.push(PanelLine::plain("r 再測一次  Esc 關閉"));
            }
        }
        lines
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptPurpose {
    Welcome,
    Signature,
}

pub struct TextPrompt {
    pub purpose: PromptPurpose,
    pub text: String,
    pub error: Option<String>,
}

impl TextPrompt {
    pub fn new(purpose: PromptPurpose) -> Self {
        Self {
            purpose,
            text: String::new(),
            error: None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self.purpose {
            PromptPurpose::Welcome => "和你一起學 AI",
            PromptPurpose::Signature => "簽署AI使用承諾卡",
        }
    }

    pub fn lines(&self, width: usize, pledges: &[String]) -> Vec<PanelLine> {
        let mut lines = Vec::new();
        match self.purpose {
            PromptPurpose::Welcome => {
                lines.push(PanelLine::plain("歡迎！請輸入你的名字："));
            }
            PromptPurpose::Signature => {
                lines.push(PanelLine::plain("我願意承諾："));
                for pledge in pledges {
                    lines.push(PanelLine::plain(format!("  ☑ {}", pledge)));
                }
                lines.push(PanelLine::blank());
                lines.push(PanelLine::plain("簽名（可留空）："));
            }
        }
        lines.push(PanelLine {
            text: format!("> {}_", self.text),
            highlight: true,
        });
        if let Some(error) = &self.error {
            push_wrapped(&mut lines, error, width);
        }
        lines.push(PanelLine::blank());
        let hint = match self.purpose {
            PromptPurpose::Welcome => "Enter 開始閱讀  Esc 離開",
            PromptPurpose::Signature => "Enter 下載我的承諾卡  Esc 取消",
        };
        lines.push(PanelLine::plain(hint));
        lines
    }
}

/// A generated image that was saved and is now shown to the reader.
pub struct Preview {
    pub title: String,
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub path: PathBuf,
    pub used_fallback: bool,
}

pub struct PanelLine {
    pub text: String,
    pub highlight: bool,
}

impl PanelLine {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            highlight: false,
        }
    }

    pub fn blank() -> Self {
        Self::plain("")
    }
}

fn push_wrapped(lines: &mut Vec<PanelLine>, text: &str, width: usize) {
    lines.extend(wrap_text(text, width).into_iter().map(PanelLine::plain));
}

/// Inner width used for wrapped panel text on a terminal `total_cols` wide.
pub fn panel_inner_width(total_cols: u32) -> usize {
    (total_cols.saturating_sub(8) as usize).clamp(10, 72)
}

/// Draws a framed panel centered in the content area. Highlighted lines are
/// drawn without the inverted background so they stand out.
pub fn draw_panel(
    writer: &mut impl Write,
    title: &str,
    lines: &[PanelLine],
    total_cols: u32,
    content_rows: u32,
) -> Result<()> {
    if total_cols < 16 || content_rows < 5 {
        return Ok(());
    }
    let max_inner = panel_inner_width(total_cols);
    let widest = lines
        .iter()
        .map(|line| display_width(&line.text) + 2)
        .chain(std::iter::once(display_width(title) + 2))
        .max()
        .unwrap_or(0);
    let inner_width = widest.clamp(20.min(max_inner), max_inner);
    let max_body = content_rows.saturating_sub(4).max(1) as usize;
    let body: Vec<&PanelLine> = lines.iter().take(max_body).collect();

    let window_width = (inner_width + 2) as u32;
    let window_height = (body.len() + 4) as u32;
    let start_col = (total_cols.saturating_sub(window_width) / 2) as u16;
    let mut row = (content_rows.saturating_sub(window_height) / 2) as u16;

    let border = format!("+{}+", "-".repeat(inner_width));
    print_inverted(writer, start_col, row, &border)?;
    row = row.saturating_add(1);
    let title_pad = inner_width.saturating_sub(display_width(title));
    let title_line = format!(
        "|{}{}{}|",
        " ".repeat(title_pad / 2),
        title,
        " ".repeat(title_pad - title_pad / 2)
    );
    print_inverted(writer, start_col, row, &title_line)?;
    row = row.saturating_add(1);
    print_inverted(writer, start_col, row, &format!("|{}|", "-".repeat(inner_width)))?;
    row = row.saturating_add(1);

    for line in body {
        let content = truncate_with_ellipsis(&format!(" {}", line.text), inner_width);
        if line.highlight {
            print_inverted(writer, start_col, row, "|")?;
            crossterm::queue!(
                writer,
                cursor::MoveTo(start_col + 1, row),
                SetAttribute(Attribute::Bold),
                Print(&content),
                SetAttribute(Attribute::Reset)
            )?;
            print_inverted(writer, start_col + 1 + inner_width as u16, row, "|")?;
        } else {
            print_inverted(writer, start_col, row, &format!("|{}|", content))?;
        }
        row = row.saturating_add(1);
    }
    print_inverted(writer, start_col, row, &border)?;
    writer.flush()?;
    Ok(())
}

pub fn chapter_lines(window: &mut ChapterWindow, content_rows: u32) -> Vec<PanelLine> {
    let mut lines: Vec<PanelLine> = window.header.iter().cloned().map(PanelLine::plain).collect();
    if !lines.is_empty() {
        lines.push(PanelLine::blank());
    }
    if window.is_empty() {
        lines.push(PanelLine::plain("沒有章節資料"));
        return lines;
    }
    let available = (content_rows as usize)
        .saturating_sub(6 + lines.len())
        .max(1);
    window.ensure_visible(available);
    let end = (window.scroll_offset + available).min(window.entries.len());
    for index in window.scroll_offset..end {
        let entry = &window.entries[index];
        let selected = index == window.selected;
        let marker = if selected { '>' } else { ' ' };
        lines.push(PanelLine {
            text: format!("{} {} (p{})", marker, entry.title, entry.start_page),
            highlight: selected,
        });
    }
    lines
}

pub fn print_inverted(writer: &mut impl Write, col: u16, row: u16, content: &str) -> Result<()> {
    crossterm::queue!(
        writer,
        cursor::MoveTo(col, row),
        SetAttribute(Attribute::Reverse),
        Print(content),
        SetAttribute(Attribute::Reset)
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flipbook_core::MemoryProgressStore;
    use std::sync::Arc;

    fn window(current_page: usize) -> ChapterWindow {
        ChapterWindow::from_handbook(&Handbook::builtin(), current_page, Vec::new())
    }

    #[test]
    fn chapter_window_selects_chapter_of_current_page() {
        let handbook = Handbook::builtin();
        let window = window(25);
        let expected = handbook.chapter_for_page(25).map(|(index, _)| index);
        assert_eq!(window.selected_index(), expected);
    }

    #[test]
    fn chapter_selection_is_clamped() {
        let mut window = window(1);
        let last = window.entries.len() - 1;
        window.selected = 0;
        assert!(!window.move_selection(-1));
        assert!(window.move_selection(100));
        assert_eq!(window.selected, last);
    }

    #[test]
    fn ensure_visible_scrolls_to_selection() {
        let mut window = window(1);
        window.selected = window.entries.len() - 1;
        window.ensure_visible(3);
        assert_eq!(window.scroll_offset, window.entries.len() - 3);
        window.selected = 0;
        window.ensure_visible(3);
        assert_eq!(window.scroll_offset, 0);
    }

    #[test]
    fn quiz_overlay_reports_wrong_answer_with_correct_label() {
        let store = Arc::new(MemoryProgressStore::new());
        let mut session = QuizSession::new(Handbook::builtin(), store);
        session.start();
        let answer = session.current_question().unwrap().answer;
        session.answer((answer + 1) % 4);
        let overlay = QuizOverlay::new(session, None);
        let label = (b'A' + answer as u8) as char;
        let expected = format!("✗ 答錯了，正確答案是 {}", label);
        assert!(overlay.lines(60).iter().any(|line| line.text == expected));
    }

    #[test]
    fn overlay_modes_follow_state() {
        assert_eq!(OverlayState::None.input_mode(), InputMode::Normal);
        let prompt = OverlayState::Prompt(TextPrompt::new(PromptPurpose::Welcome));
        assert_eq!(prompt.input_mode(), InputMode::Text);
        assert!(prompt.is_active());
    }

    #[test]
    fn panel_is_written_inside_terminal() {
        let mut out = Vec::new();
        let lines = vec![PanelLine::plain("第一行"), PanelLine {
            text: "選擇".into(),
            highlight: true,
        }];
        draw_panel(&mut out, "標題", &lines, 80, 24).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("標題"));
        assert!(text.contains("第一行"));
        assert!(text.contains("選擇"));
    }
}
