mod layout;
mod overlay;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use flipbook_core::profile::{MAX_NAME_CHARS, MAX_SIGNATURE_CHARS};
use flipbook_core::{
    next_target, normalize_name, normalize_signature, prev_target, resolve_spread, AppDirs,
    BookProvider, Command, Config, FileProgressStore, ProgressStore, QuizPhase, QuizSession,
    Reader, RenderImage, Role, Spread, ViewMode,
};
use flipbook_render::{
    apply_zoom, certificate_filename, compose_spread, encode_png, flip_frame, into_render_image,
    load_avatar, page_asset_name, pledge_card_filename, render_certificate, render_pledge_card,
    today, ArtifactSink, FontSet, ImageBookProvider, PledgeCard,
};
use flipbook_tty::{
    format_status_line, write_status_line, DrawParams, EventMapper, KittyRenderer, UiEvent,
    PAGE_IMAGE_ID, PREVIEW_IMAGE_ID,
};
use image::RgbaImage;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::layout::{compute_scaled_dimensions, pan_to_image_pixels, tile_height_for, Screen};
use crate::overlay::{
    chapter_lines, draw_panel, panel_inner_width, print_inverted, CertificateState, ChapterWindow,
    OverlayState, Preview, PromptPurpose, QuizOverlay, TextPrompt,
};

const IDLE_POLL: Duration = Duration::from_millis(100);
const FRAME_POLL: Duration = Duration::from_millis(33);

#[derive(Debug, Parser)]
#[command(
    name = "flipbook",
    version,
    about = "Flip-book reader for illustrated handbooks in kitty-compatible terminals"
)]
struct Args {
    /// Directory holding the edu-NN.png page images
    #[arg(short = 'b', long = "book")]
    book: Option<PathBuf>,

    /// Page to open on (1-based)
    #[arg(short = 'p', long = "page")]
    page: Option<usize>,

    /// Always show one page at a time
    #[arg(long, conflicts_with = "spread")]
    single: bool,

    /// Always show two-page spreads
    #[arg(long)]
    spread: bool,

    /// Reader name shown in the status line and on certificates
    #[arg(long)]
    name: Option<String>,

    /// Avatar role, 1 through 5
    #[arg(long)]
    role: Option<u8>,

    /// Forget the stored name, role, last page and quiz score
    #[arg(long)]
    reset: bool,

    /// Print page and export paths instead of drawing images
    #[arg(long = "no-graphics")]
    no_graphics: bool,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,
}

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, DisableMouseCapture, cursor::Show);
        let _ = terminal::disable_raw_mode();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let dirs = AppDirs::resolve().ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = init_logging(&dirs.log_dir)?;

    let config_path = args.config.clone().unwrap_or_else(|| dirs.config_file.clone());
    let config = Config::load_or_default(&config_path)?;

    let book_dir = match args.book.clone().or_else(|| config.book_dir.clone()) {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to read current directory")?,
    };
    let provider = ImageBookProvider::new(config.cache_pages);
    let backend = provider
        .open(&book_dir)
        .await
        .with_context(|| format!("failed to open book {:?}", book_dir))?;
    let info = backend.info().clone();
    let store: Arc<dyn ProgressStore> = Arc::new(FileProgressStore::open(&dirs.state_dir, info.id)?);

    if args.reset {
        store.clear_all();
        info!("progress cleared");
    }
    if let Some(raw) = args.name.as_deref() {
        let name = normalize_name(raw)?;
        store.set_user_name(&name);
    }
    if let Some(raw) = args.role {
        store.set_user_role(Role::try_from(raw)?);
    }
    if let Some(page) = args.page {
        store.set_last_page(page);
    }

    let mut reader = Reader::mount(Arc::clone(&backend), Arc::clone(&store), &config);
    if args.single {
        reader.force_mode(Some(ViewMode::Single));
    } else if args.spread {
        reader.force_mode(Some(ViewMode::Spread));
    }

    let fonts = match config.font_path.as_deref() {
        Some(path) => FontSet::load(path).unwrap_or_else(|err| {
            warn!(?path, %err, "font unavailable, generated images will have no text");
            FontSet::none()
        }),
        None => FontSet::none(),
    };
    let avatar = store
        .user_role()
        .and_then(|role| load_avatar(&info.path, role));

    let mut app = App {
        reader,
        fonts: Arc::new(fonts),
        sink: ArtifactSink::new(dirs.export_dir(&config), dirs.fallback_export_dir.clone()),
        graphics: !args.no_graphics,
        overlay: OverlayState::None,
        notice: None,
        jobs: Vec::new(),
        frame: None,
        avatar,
    };
    if store.user_name().is_none() {
        app.overlay = OverlayState::Prompt(TextPrompt::new(PromptPurpose::Welcome));
    }

    let _raw = RawModeGuard::new()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnableMouseCapture, cursor::Hide)?;
    let mut renderer = KittyRenderer::new(stdout);
    let mut mapper = EventMapper::new();

    let (columns, rows) = terminal::size()?;
    app.resize(&mut mapper, columns, rows);

    let mut dirty = true;
    loop {
        let now = Instant::now();
        if app.reader.tick(now) {
            dirty = true;
        }
        if app.is_animating() {
            dirty = true;
        }
        if app.poll_jobs().await {
            dirty = true;
        }
        for event in app.reader.drain_events() {
            debug!(?event, "reader event");
            dirty = true;
        }
        sync_input_mode(&mut mapper, &app.overlay);

        if dirty {
            let pending = mapper.pending_input();
            app.redraw(&mut renderer, pending.as_deref())?;
            dirty = false;
        }

        let timeout = if app.reader.flip().deadline().is_some() {
            FRAME_POLL
        } else {
            IDLE_POLL
        };
        if event::poll(timeout)? {
            let ev = event::read()?;
            mapper.set_drag_active(app.reader.viewport().is_dragging());
            let ui_event = mapper.map_event(ev);
            match app.handle_event(ui_event, &mut mapper, &mut renderer)? {
                LoopAction::ContinueRedraw => dirty = true,
                LoopAction::Continue => {}
                LoopAction::Quit => break,
            }
        }
    }

    app.reader.unmount();
    renderer.delete_image(PAGE_IMAGE_ID)?;
    renderer.delete_image(PREVIEW_IMAGE_ID)?;
    renderer.clear_all()?;
    info!(page = app.reader.current_page(), "reader closed");
    Ok(())
}

enum LoopAction {
    Continue,
    ContinueRedraw,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArtifactKind {
    Certificate,
    PledgeCard,
}

struct ArtifactJob {
    kind: ArtifactKind,
    handle: JoinHandle<Result<Preview>>,
}

/// Composed spread kept between redraws; zoom and flip frames derive from it.
struct CachedFrame {
    spread: Spread,
    tile_height: u32,
    image: RgbaImage,
}

struct App {
    reader: Reader,
    fonts: Arc<FontSet>,
    sink: ArtifactSink,
    graphics: bool,
    overlay: OverlayState,
    notice: Option<String>,
    jobs: Vec<ArtifactJob>,
    frame: Option<CachedFrame>,
    avatar: Option<RenderImage>,
}

impl App {
    fn is_animating(&self) -> bool {
        self.graphics
            && !self.overlay.is_active()
            && self.reader.mode() == ViewMode::Spread
            && self.reader.flip().deadline().is_some()
    }

    fn resize(&mut self, mapper: &mut EventMapper, columns: u16, rows: u16) {
        let (width_px, height_px) = match terminal::window_size() {
            Ok(window) => (window.width, window.height),
            Err(err) => {
                warn!(%err, "terminal pixel size unavailable");
                (0, 0)
            }
        };
        let screen = Screen::new(columns, rows, width_px, height_px);
        mapper.set_cell_metrics(screen.cells);
        self.frame = None;
        self.reader.apply(
            Command::SetDisplayWidth {
                px: screen.display_width_px(),
            },
            Instant::now(),
        );
    }

    fn handle_event(
        &mut self,
        event: UiEvent,
        mapper: &mut EventMapper,
        renderer: &mut KittyRenderer<io::Stdout>,
    ) -> Result<LoopAction> {
        let now = Instant::now();
        let action = match event {
            UiEvent::Command(command) => {
                redraw_if(!self.overlay.is_active() && self.reader.apply(command, now))
            }
            UiEvent::Resize { columns, rows } => {
                self.resize(mapper, columns, rows);
                LoopAction::ContinueRedraw
            }
            UiEvent::OpenChapters => {
                let header = self.welcome_header();
                let window =
                    ChapterWindow::from_handbook(self.reader.handbook(), self.reader.current_page(), header);
                self.open(OverlayState::Chapters(window))
            }
            UiEvent::OpenQuiz => {
                let store = self.reader.store();
                let best = store.quiz_score();
                let session = QuizSession::new(Arc::clone(&self.reader.info().handbook), store);
                self.open(OverlayState::Quiz(Box::new(QuizOverlay::new(session, best))))
            }
            UiEvent::OpenPledge => self.open(OverlayState::Prompt(TextPrompt::new(PromptPurpose::Signature))),
            UiEvent::CloseOverlay => self.close_overlay(renderer)?,
            UiEvent::MoveSelection { delta } => match &mut self.overlay {
                OverlayState::Chapters(window) => redraw_if(window.move_selection(delta)),
                _ => LoopAction::Continue,
            },
            UiEvent::Activate => self.activate(renderer)?,
            UiEvent::QuizAnswer { option } => match &mut self.overlay {
                OverlayState::Quiz(quiz) => redraw_if(quiz.session.answer(option).is_some()),
                _ => LoopAction::Continue,
            },
            UiEvent::QuizRestart => match &mut self.overlay {
                OverlayState::Quiz(quiz) if quiz.session.phase() == QuizPhase::Result => {
                    quiz.best_score = self.reader.store().quiz_score();
                    quiz.certificate = CertificateState::NotRequested;
                    quiz.session.start();
                    LoopAction::ContinueRedraw
                }
                _ => LoopAction::Continue,
            },
            UiEvent::TextChanged { text } => match &mut self.overlay {
                OverlayState::Prompt(prompt) => {
                    prompt.text = text;
                    prompt.error = None;
                    LoopAction::ContinueRedraw
                }
                _ => LoopAction::Continue,
            },
            UiEvent::TextSubmit { text } => self.submit_text(text),
            UiEvent::Quit => LoopAction::Quit,
            UiEvent::None => LoopAction::Continue,
        };
        sync_input_mode(mapper, &self.overlay);
        Ok(action)
    }

    fn open(&mut self, overlay: OverlayState) -> LoopAction {
        if matches!(self.overlay, OverlayState::Prompt(TextPrompt { purpose: PromptPurpose::Welcome, .. })) {
            return LoopAction::Continue;
        }
        self.overlay = overlay;
        LoopAction::ContinueRedraw
    }

    fn close_overlay(&mut self, renderer: &mut KittyRenderer<io::Stdout>) -> Result<LoopAction> {
        match &self.overlay {
            OverlayState::None => return Ok(LoopAction::Continue),
            OverlayState::Prompt(prompt) if prompt.purpose == PromptPurpose::Welcome => {
                return Ok(LoopAction::Quit);
            }
            OverlayState::Preview(_) | OverlayState::Chapters(_) => {
                renderer.delete_image(PREVIEW_IMAGE_ID)?;
            }
            _ => {}
        }
        self.overlay.deactivate();
        Ok(LoopAction::ContinueRedraw)
    }

    fn activate(&mut self, renderer: &mut KittyRenderer<io::Stdout>) -> Result<LoopAction> {
        let now = Instant::now();
        match &mut self.overlay {
            OverlayState::Chapters(window) => {
                let Some(index) = window.selected_index() else {
                    return Ok(LoopAction::Continue);
                };
                renderer.delete_image(PREVIEW_IMAGE_ID)?;
                self.overlay.deactivate();
                self.reader.apply(Command::GotoChapter { index }, now);
                Ok(LoopAction::ContinueRedraw)
            }
            OverlayState::Quiz(quiz) => match quiz.session.phase() {
                QuizPhase::Intro => {
                    quiz.session.start();
                    Ok(LoopAction::ContinueRedraw)
                }
                QuizPhase::Question => {
                    if !quiz.session.next() {
                        return Ok(LoopAction::Continue);
                    }
                    if quiz.session.phase() == QuizPhase::Result && quiz.session.passed() {
                        quiz.certificate = CertificateState::Generating;
                        let (score, total) = (quiz.session.score(), quiz.session.total());
                        self.spawn_certificate(score, total);
                    }
                    Ok(LoopAction::ContinueRedraw)
                }
                QuizPhase::Result => {
                    self.overlay.deactivate();
                    Ok(LoopAction::ContinueRedraw)
                }
            },
            OverlayState::Preview(_) => self.close_overlay(renderer),
            OverlayState::Prompt(_) | OverlayState::None => Ok(LoopAction::Continue),
        }
    }

    fn submit_text(&mut self, text: String) -> LoopAction {
        let OverlayState::Prompt(prompt) = &mut self.overlay else {
            return LoopAction::Continue;
        };
        match prompt.purpose {
            PromptPurpose::Welcome => match normalize_name(&text) {
                Ok(name) => {
                    self.reader.store().set_user_name(&name);
                    info!(%name, "reader name stored");
                    self.notice = Some(format!("歡迎，{}！", name));
                    self.overlay.deactivate();
                }
                Err(_) => {
                    prompt.text = text;
                    prompt.error = Some("請輸入你的名字".to_string());
                }
            },
            PromptPurpose::Signature => {
                let signature = normalize_signature(&text);
                self.overlay.deactivate();
                self.notice = Some("正在生成承諾卡...".to_string());
                self.spawn_pledge_card(signature);
            }
        }
        LoopAction::ContinueRedraw
    }

    fn reader_name(&self) -> String {
        self.reader
            .store()
            .user_name()
            .unwrap_or_else(|| "同學".to_string())
    }

    fn welcome_header(&self) -> Vec<String> {
        let store = self.reader.store();
        let mut header = vec![self.reader.handbook().heading()];
        if let Some(name) = store.user_name() {
            header.push(format!("歡迎回來，{}", name));
        }
        if let Some(score) = store.quiz_score() {
            header.push(format!(
                "小測驗最佳成績：{} / {}",
                score,
                self.reader.handbook().questions.len()
            ));
        }
        header
    }

    fn spawn_certificate(&mut self, score: u32, total: usize) {
        let name = self.reader_name();
        let fonts = Arc::clone(&self.fonts);
        let sink = self.sink.clone();
        let handle = tokio::task::spawn_blocking(move || -> Result<Preview> {
            let image = render_certificate(&name, score, total, today(), &fonts);
            let png = encode_png(&image)?;
            let saved = sink.save(&png, &certificate_filename(&name))?;
            Ok(Preview {
                title: "AI 學習證書".to_string(),
                width: image.width(),
                height: image.height(),
                png,
                path: saved.path,
                used_fallback: saved.used_fallback,
            })
        });
        self.jobs.push(ArtifactJob {
            kind: ArtifactKind::Certificate,
            handle,
        });
    }

    fn spawn_pledge_card(&mut self, signature: String) {
        let name = self.reader_name();
        let handbook = Arc::clone(&self.reader.info().handbook);
        let fonts = Arc::clone(&self.fonts);
        let sink = self.sink.clone();
        let handle = tokio::task::spawn_blocking(move || -> Result<Preview> {
            let card = PledgeCard {
                name: &name,
                signature: &signature,
                date: today(),
                pledges: &handbook.pledges,
                footer: &handbook.credit,
            };
            let image = render_pledge_card(&card, &fonts);
            let png = encode_png(&image)?;
            let saved = sink.save(&png, &pledge_card_filename(&name))?;
            Ok(Preview {
                title: "AI 使用承諾卡".to_string(),
                width: image.width(),
                height: image.height(),
                png,
                path: saved.path,
                used_fallback: saved.used_fallback,
            })
        });
        self.jobs.push(ArtifactJob {
            kind: ArtifactKind::PledgeCard,
            handle,
        });
    }

    /// Collects finished export jobs. Returns `true` when something changed on screen.
    async fn poll_jobs(&mut self) -> bool {
        if self.jobs.iter().all(|job| !job.handle.is_finished()) {
            return false;
        }
        let (finished, running): (Vec<_>, Vec<_>) =
            self.jobs.drain(..).partition(|job| job.handle.is_finished());
        self.jobs = running;

        for job in finished {
            let outcome = match job.handle.await {
                Ok(result) => result,
                Err(err) => Err(anyhow!(err)),
            };
            match outcome {
                Ok(preview) => self.artifact_ready(job.kind, preview),
                Err(err) => {
                    warn!(kind = ?job.kind, %err, "failed to export image");
                    if let OverlayState::Quiz(quiz) = &mut self.overlay {
                        if job.kind == ArtifactKind::Certificate {
                            quiz.certificate = CertificateState::Failed(err.to_string());
                        }
                    }
                    self.notice = Some(format!("儲存失敗：{}", err));
                }
            }
        }
        true
    }

    fn artifact_ready(&mut self, kind: ArtifactKind, preview: Preview) {
        let mut notice = format!("已儲存：{}", preview.path.display());
        if preview.used_fallback {
            notice.push_str("（下載資料夾無法使用，已改存此處）");
        }
        self.notice = Some(notice);

        let quiz_open = match &mut self.overlay {
            OverlayState::Quiz(quiz) if kind == ArtifactKind::Certificate => {
                quiz.certificate = CertificateState::Saved(preview.path.clone());
                true
            }
            _ => false,
        };
        if !self.graphics {
            return;
        }
        // Never cover a prompt the reader is typing into.
        if quiz_open || !self.overlay.is_active() {
            self.overlay = OverlayState::Preview(preview);
        }
    }

    fn redraw(&mut self, renderer: &mut KittyRenderer<io::Stdout>, pending: Option<&str>) -> Result<()> {
        let window = terminal::window_size()?;
        let screen = Screen::new(window.columns, window.rows, window.width, window.height);

        renderer.begin_sync_update()?;
        {
            let writer = renderer.writer();
            crossterm::queue!(writer, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
        }

        if self.overlay.is_active() {
            renderer.delete_image(PAGE_IMAGE_ID)?;
            self.draw_overlay(renderer, &screen)?;
        } else if self.graphics {
            self.draw_pages(renderer, &screen)?;
        } else {
            self.print_page_paths(renderer, &screen)?;
        }

        let status = self.status_text(pending);
        draw_status_line(renderer, &screen, &status)?;
        renderer.end_sync_update()?;

        self.prefetch_neighbors();
        Ok(())
    }

    fn draw_pages(&mut self, renderer: &mut KittyRenderer<io::Stdout>, screen: &Screen) -> Result<()> {
        let spread = self.reader.spread();
        let tiles = spread.pages().count();
        let tile_height = tile_height_for(screen, tiles);
        let fresh = matches!(
            &self.frame,
            Some(frame) if frame.spread == spread && frame.tile_height == tile_height
        );
        if !fresh {
            let backend = self.reader.backend();
            let image = compose_spread(spread, tile_height, &self.fonts, |page| backend.load_page(page));
            self.frame = Some(CachedFrame {
                spread,
                tile_height,
                image,
            });
        }
        let Some(frame) = self.frame.as_ref() else {
            return Ok(());
        };

        let flipping = self.reader.flip().flip_direction().filter(|_| self.reader.mode() == ViewMode::Spread);
        let base = match flipping {
            Some(direction) => flip_frame(&frame.image, direction, self.reader.flip().progress(Instant::now())),
            None => frame.image.clone(),
        };

        let (avail_cols, avail_rows) = screen.page_area();
        let (draw_cols, draw_rows) =
            compute_scaled_dimensions(base.width(), base.height(), avail_cols, avail_rows, screen.cells);
        let viewport = self.reader.viewport();
        let pan = pan_to_image_pixels(viewport.pan(), base.width(), draw_cols, screen.cells);
        let zoomed = apply_zoom(&base, viewport.zoom(), pan);

        let start_col = screen.columns.saturating_sub(draw_cols) / 2;
        let start_row = screen.content_rows().saturating_sub(draw_rows) / 2;
        {
            let writer = renderer.writer();
            crossterm::queue!(writer, cursor::MoveTo(start_col as u16, start_row as u16))?;
        }
        renderer.draw(
            &into_render_image(zoomed),
            DrawParams::clamped(PAGE_IMAGE_ID, draw_cols, draw_rows),
        )?;
        Ok(())
    }

    fn print_page_paths(&self, renderer: &mut KittyRenderer<io::Stdout>, screen: &Screen) -> Result<()> {
        let info = self.reader.info();
        let writer = renderer.writer();
        let mut row: u16 = 1;
        for page in self.reader.spread().pages() {
            let path = info.path.join(page_asset_name(page));
            let state = if path.exists() { "" } else { "  (圖片尚未上傳)" };
            crossterm::queue!(
                writer,
                cursor::MoveTo(2, row),
                Print(format!("第 {} 頁: {}{}", page, path.display(), state))
            )?;
            row = row.saturating_add(1);
            if u32::from(row) >= screen.content_rows() {
                break;
            }
        }
        writer.flush()?;
        Ok(())
    }

    fn draw_overlay(&mut self, renderer: &mut KittyRenderer<io::Stdout>, screen: &Screen) -> Result<()> {
        let width = panel_inner_width(screen.columns).saturating_sub(2);
        let content_rows = screen.content_rows();
        match &mut self.overlay {
            OverlayState::None => Ok(()),
            OverlayState::Chapters(window) => {
                let lines = chapter_lines(window, content_rows);
                draw_panel(renderer.writer(), "章節目錄", &lines, screen.columns, content_rows)?;
                if let (true, Some(avatar)) = (self.graphics, self.avatar.as_ref()) {
                    {
                        let writer = renderer.writer();
                        crossterm::queue!(writer, cursor::MoveTo(1, 0))?;
                    }
                    renderer.draw(avatar, DrawParams::clamped(PREVIEW_IMAGE_ID, 8, 4))?;
                }
                Ok(())
            }
            OverlayState::Quiz(quiz) => {
                let lines = quiz.lines(width);
                draw_panel(renderer.writer(), quiz.title(), &lines, screen.columns, content_rows)
            }
            OverlayState::Prompt(prompt) => {
                let lines = prompt.lines(width, &self.reader.handbook().pledges);
                draw_panel(renderer.writer(), prompt.title(), &lines, screen.columns, content_rows)
            }
            OverlayState::Preview(preview) => draw_preview(renderer, preview, screen),
        }
    }

    fn status_text(&self, pending: Option<&str>) -> String {
        let name = self.reader.store().user_name();
        let chapter = self
            .reader
            .handbook()
            .chapter_for_page(self.reader.current_page())
            .map(|(_, chapter)| chapter.title.as_str());
        let mut status = format_status_line(
            name.as_deref(),
            self.reader.spread(),
            self.reader.total_pages(),
            self.reader.viewport().zoom(),
            chapter,
        );
        if let Some(pending) = pending.filter(|s| !s.is_empty()) {
            status.push_str(" | ");
            status.push_str(pending);
        }
        if let Some(notice) = &self.notice {
            status.push_str(" | ");
            status.push_str(notice);
        }
        status
    }

    fn prefetch_neighbors(&self) {
        let total = self.reader.total_pages();
        let mode = self.reader.mode();
        let current = self.reader.current_page();
        let mut pages = Vec::with_capacity(4);
        for target in [next_target(current, mode, total), prev_target(current, mode, total)]
            .into_iter()
            .flatten()
        {
            pages.extend(resolve_spread(target, mode, total).pages());
        }
        self.reader.backend().prefetch(&pages);
    }
}

fn redraw_if(changed: bool) -> LoopAction {
    if changed {
        LoopAction::ContinueRedraw
    } else {
        LoopAction::Continue
    }
}

fn sync_input_mode(mapper: &mut EventMapper, overlay: &OverlayState) {
    let wanted = overlay.input_mode();
    if mapper.mode() == wanted {
        return;
    }
    match overlay {
        OverlayState::Prompt(prompt) => {
            let limit = match prompt.purpose {
                PromptPurpose::Welcome => MAX_NAME_CHARS,
                PromptPurpose::Signature => MAX_SIGNATURE_CHARS,
            };
            mapper.begin_text_input(&prompt.text, limit);
        }
        _ => mapper.set_mode(wanted),
    }
}

fn draw_preview(renderer: &mut KittyRenderer<io::Stdout>, preview: &Preview, screen: &Screen) -> Result<()> {
    let content_rows = screen.content_rows();
    print_inverted(renderer.writer(), 0, 0, &format!(" {} ", preview.title))?;
    let (cols, rows) = compute_scaled_dimensions(
        preview.width,
        preview.height,
        screen.columns.saturating_sub(4).max(1),
        content_rows.saturating_sub(4).max(1),
        screen.cells,
    );
    let start_col = screen.columns.saturating_sub(cols) / 2;
    {
        let writer = renderer.writer();
        crossterm::queue!(writer, cursor::MoveTo(start_col as u16, 2))?;
    }
    renderer.transmit_png(
        &preview.png,
        preview.width,
        preview.height,
        DrawParams::clamped(PREVIEW_IMAGE_ID, cols, rows),
    )?;

    let footer_row = (2 + rows).min(content_rows.saturating_sub(1)) as u16;
    let mut footer = format!("{}  Esc 關閉", preview.path.display());
    if preview.used_fallback {
        footer.insert_str(0, "已改存 ");
    }
    let writer = renderer.writer();
    crossterm::queue!(writer, cursor::MoveTo(1, footer_row), Print(footer))?;
    writer.flush()?;
    Ok(())
}

fn draw_status_line(renderer: &mut KittyRenderer<io::Stdout>, screen: &Screen, status: &str) -> Result<()> {
    let status_row = screen.rows.saturating_sub(1) as u16;
    let writer = renderer.writer();
    crossterm::queue!(writer, cursor::MoveTo(0, status_row), Clear(ClearType::CurrentLine))?;
    write_status_line(writer, status)?;
    Ok(())
}

fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir).with_context(|| format!("failed to create {:?}", log_dir))?;

    let file_appender = tracing_appender::rolling::never(log_dir, "flipbook.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Stdout carries the page graphics, so logs only go to the file.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
