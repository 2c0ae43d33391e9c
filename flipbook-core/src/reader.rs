use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, instrument};

use crate::config::{Config, TurnPolicy};
use crate::flip::{FlipController, FlipDirection};
use crate::handbook::Handbook;
use crate::pagination::{next_target, prev_target, resolve_spread, Spread, ViewMode};
use crate::store::ProgressStore;
use crate::viewport::{PointerInput, Viewport};
use crate::{BookInfo, PageBackend};

#[derive(Debug, Clone)]
pub enum Command {
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    GotoPage { page: usize },
    GotoChapter { index: usize },
    ZoomIn,
    ZoomOut,
    ResetZoom,
    BeginDrag { pointer: PointerInput },
    UpdateDrag { pointer: PointerInput },
    EndDrag,
    SetDisplayWidth { px: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReaderEvent {
    FlipStarted {
        target: usize,
        direction: FlipDirection,
    },
    PageCommitted {
        page: usize,
    },
    ViewportChanged,
    ModeChanged(ViewMode),
}

/// Reading state for one mounted book.
pub struct Reader {
    backend: Arc<dyn PageBackend>,
    store: Arc<dyn ProgressStore>,
    current_page: usize,
    flip: FlipController,
    viewport: Viewport,
    mode: ViewMode,
    mode_override: Option<ViewMode>,
    spread_min_width: u32,
    turn_policy: TurnPolicy,
    events: Mutex<Vec<ReaderEvent>>,
}

impl Reader {
    /// Mounts the reader on the page stored as last viewed, clamped into the book.
    pub fn mount(
        backend: Arc<dyn PageBackend>,
        store: Arc<dyn ProgressStore>,
        config: &Config,
    ) -> Self {
        let total = backend.info().total_pages();
        let current_page = store.last_page().clamp(1, total);
        store.set_last_page(current_page);
        debug!(current_page, total, "reader mounted");
        Self {
            backend,
            store,
            current_page,
            flip: FlipController::new(total, config.flip_duration),
            viewport: Viewport::new(),
            mode: ViewMode::Spread,
            mode_override: None,
            spread_min_width: config.spread_min_width,
            turn_policy: config.turn_policy,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn info(&self) -> &BookInfo {
        self.backend.info()
    }

    pub fn handbook(&self) -> &Handbook {
        &self.backend.info().handbook
    }

    pub fn backend(&self) -> Arc<dyn PageBackend> {
        Arc::clone(&self.backend)
    }

    pub fn store(&self) -> Arc<dyn ProgressStore> {
        Arc::clone(&self.store)
    }

    /// Takes every event queued since the last drain.
    pub fn drain_events(&self) -> Vec<ReaderEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn total_pages(&self) -> usize {
        self.backend.info().total_pages()
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    /// Pins the view mode regardless of the display width.
    pub fn force_mode(&mut self, mode: Option<ViewMode>) {
        self.mode_override = mode;
        if let Some(mode) = mode {
            self.set_mode(mode);
        }
    }

    pub fn flip(&self) -> &FlipController {
        &self.flip
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn spread(&self) -> Spread {
        resolve_spread(self.current_page, self.mode, self.total_pages())
    }

    /// Requests a flip to `target`. Out-of-range targets and requests made
    /// while a flip is pending are ignored.
    pub fn go_to(&mut self, target: usize, direction: FlipDirection, now: Instant) -> bool {
        if !self.flip.go_to(target, direction, now) {
            return false;
        }
        self.events
            .lock()
            .push(ReaderEvent::FlipStarted { target, direction });
        true
    }

    #[instrument(skip(self, now))]
    pub fn apply(&mut self, command: Command, now: Instant) -> bool {
        let total = self.total_pages();
        match command {
            Command::NextPage => match next_target(self.current_page, self.mode, total) {
                Some(target) => self.go_to(target, FlipDirection::Forward, now),
                None => false,
            },
            Command::PrevPage => match prev_target(self.current_page, self.mode, total) {
                Some(target) => self.go_to(target, FlipDirection::Backward, now),
                None => false,
            },
            Command::FirstPage => self.go_to(1, FlipDirection::Backward, now),
            Command::LastPage => self.go_to(total, FlipDirection::Forward, now),
            Command::GotoPage { page } => {
                let direction = FlipDirection::between(self.current_page, page);
                self.go_to(page, direction, now)
            }
            Command::GotoChapter { index } => {
                let Some(page) = self.handbook().chapters.get(index).map(|c| c.start_page) else {
                    return false;
                };
                let direction = FlipDirection::between(self.current_page, page);
                self.go_to(page, direction, now)
            }
            Command::ZoomIn => {
                let changed = self.viewport.zoom_in();
                self.viewport_changed(changed)
            }
            Command::ZoomOut => {
                let changed = self.viewport.zoom_out();
                self.viewport_changed(changed)
            }
            Command::ResetZoom => {
                let changed = self.viewport.reset_zoom();
                self.viewport_changed(changed)
            }
            Command::UpdateDrag { .. } | Command::EndDrag if !self.viewport.is_dragging() => {
                false
            }
            Command::BeginDrag { pointer } => self.viewport.begin_drag(&pointer),
            Command::UpdateDrag { pointer } => {
                let changed = self.viewport.update_drag(&pointer);
                self.viewport_changed(changed)
            }
            Command::EndDrag => self.viewport.end_drag(),
            Command::SetDisplayWidth { px } => {
                if self.mode_override.is_some() {
                    return false;
                }
                self.set_mode(ViewMode::for_width(px, self.spread_min_width))
            }
        }
    }

    /// Commits a pending flip whose duration has elapsed. Returns `true` when
    /// the page changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(page) = self.flip.tick(now) else {
            return false;
        };
        self.current_page = page;
        self.store.set_last_page(page);
        self.viewport.on_page_committed(self.turn_policy);
        self.events.lock().push(ReaderEvent::PageCommitted { page });
        true
    }

    /// Tears the reader down. A pending flip is discarded so nothing
    /// commits after the book is closed.
    pub fn unmount(&mut self) {
        self.flip.cancel_pending();
        self.viewport.end_drag();
        debug!(current_page = self.current_page, "reader unmounted");
    }

    fn set_mode(&mut self, mode: ViewMode) -> bool {
        if self.mode == mode {
            return false;
        }
        self.mode = mode;
        self.events.lock().push(ReaderEvent::ModeChanged(mode));
        true
    }

    fn viewport_changed(&mut self, changed: bool) -> bool {
        if changed {
            let mut events = self.events.lock();
            if events.last() != Some(&ReaderEvent::ViewportChanged) {
                events.push(ReaderEvent::ViewportChanged);
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use crate::store::MemoryProgressStore;
    use crate::viewport::Point;
    use crate::{book_id_for_path, BookProvider, PageImage};

    struct FakeBackend {
        info: BookInfo,
    }

    impl PageBackend for FakeBackend {
        fn info(&self) -> &BookInfo {
            &self.info
        }

        fn load_page(&self, _page: usize) -> PageImage {
            PageImage::Missing
        }
    }

    struct FakeProvider;

    #[async_trait::async_trait]
    impl BookProvider for FakeProvider {
        async fn open(&self, path: &Path) -> anyhow::Result<Arc<dyn PageBackend>> {
            let info = BookInfo {
                id: book_id_for_path(path),
                path: path.to_path_buf(),
                handbook: Handbook::builtin(),
            };
            Ok(Arc::new(FakeBackend { info }))
        }
    }

    async fn mount_with(store: Arc<MemoryProgressStore>, config: &Config) -> Reader {
        let backend = FakeProvider
            .open(&PathBuf::from("/tmp/handbook"))
            .await
            .unwrap();
        Reader::mount(backend, store, config)
    }

    fn flip_and_settle(reader: &mut Reader, command: Command, now: &mut Instant) {
        reader.apply(command, *now);
        *now += Duration::from_millis(300);
        reader.tick(*now);
    }

    #[tokio::test]
    async fn mount_resumes_from_stored_page() {
        let store = Arc::new(MemoryProgressStore::new());
        store.set_last_page(12);
        let reader = mount_with(store, &Config::default()).await;
        assert_eq!(reader.current_page(), 12);
    }

    #[tokio::test]
    async fn mount_clamps_stale_page_into_the_book() {
        let store = Arc::new(MemoryProgressStore::new());
        store.set_last_page(500);
        let reader = mount_with(store.clone(), &Config::default()).await;
        assert_eq!(reader.current_page(), 74);
        assert_eq!(store.last_page(), 74);
    }

    #[tokio::test]
    async fn spread_navigation_walks_the_book() {
        let store = Arc::new(MemoryProgressStore::new());
        let mut reader = mount_with(store.clone(), &Config::default()).await;
        let mut now = Instant::now();

        assert_eq!(reader.spread(), Spread::single(1));
        flip_and_settle(&mut reader, Command::NextPage, &mut now);
        assert_eq!(reader.current_page(), 3);
        assert_eq!(
            reader.spread(),
            Spread {
                left: 2,
                right: Some(3)
            }
        );
        assert_eq!(store.last_page(), 3);

        flip_and_settle(&mut reader, Command::PrevPage, &mut now);
        assert_eq!(reader.current_page(), 1);
        assert!(!reader.apply(Command::PrevPage, now));
    }

    #[tokio::test]
    async fn narrow_display_switches_to_single_steps() {
        let store = Arc::new(MemoryProgressStore::new());
        let mut reader = mount_with(store, &Config::default()).await;
        let mut now = Instant::now();
        assert!(reader.apply(Command::SetDisplayWidth { px: 600 }, now));
        assert_eq!(reader.mode(), ViewMode::Single);
        flip_and_settle(&mut reader, Command::NextPage, &mut now);
        assert_eq!(reader.current_page(), 2);
        assert_eq!(reader.spread(), Spread::single(2));
    }

    #[tokio::test]
    async fn forced_mode_ignores_display_width() {
        let store = Arc::new(MemoryProgressStore::new());
        let mut reader = mount_with(store, &Config::default()).await;
        reader.force_mode(Some(ViewMode::Single));
        assert!(!reader.apply(Command::SetDisplayWidth { px: 2000 }, Instant::now()));
        assert_eq!(reader.mode(), ViewMode::Single);
    }

    #[tokio::test]
    async fn rapid_input_during_flip_is_dropped() {
        let store = Arc::new(MemoryProgressStore::new());
        store.set_last_page(10);
        let mut reader = mount_with(store, &Config::default()).await;
        let start = Instant::now();
        assert!(reader.apply(Command::NextPage, start));
        for ms in [20u64, 100, 250] {
            assert!(!reader.apply(Command::NextPage, start + Duration::from_millis(ms)));
            assert!(!reader.apply(
                Command::GotoPage { page: 40 },
                start + Duration::from_millis(ms)
            ));
        }
        assert_eq!(reader.current_page(), 10);
        assert!(reader.tick(start + Duration::from_millis(300)));
        assert_eq!(reader.current_page(), 12);
    }

    #[tokio::test]
    async fn out_of_range_goto_is_ignored() {
        let store = Arc::new(MemoryProgressStore::new());
        let mut reader = mount_with(store, &Config::default()).await;
        let now = Instant::now();
        assert!(!reader.apply(Command::GotoPage { page: 0 }, now));
        assert!(!reader.apply(Command::GotoPage { page: 75 }, now));
        assert!(reader.flip().is_idle());
    }

    #[tokio::test]
    async fn committed_page_resets_pan() {
        let store = Arc::new(MemoryProgressStore::new());
        let mut reader = mount_with(store, &Config::default()).await;
        let mut now = Instant::now();
        reader.apply(Command::ZoomIn, now);
        reader.apply(
            Command::BeginDrag {
                pointer: PointerInput::Mouse(Point::new(0.0, 0.0)),
            },
            now,
        );
        reader.apply(
            Command::UpdateDrag {
                pointer: PointerInput::Mouse(Point::new(25.0, 10.0)),
            },
            now,
        );
        assert_eq!(reader.viewport().pan(), Point::new(25.0, 10.0));

        flip_and_settle(&mut reader, Command::GotoPage { page: 20 }, &mut now);
        assert_eq!(reader.viewport().pan(), Point::ORIGIN);
        assert_eq!(reader.viewport().zoom(), 1.25);
    }

    #[tokio::test]
    async fn fit_page_policy_resets_zoom_on_turn() {
        let store = Arc::new(MemoryProgressStore::new());
        let config = Config {
            turn_policy: TurnPolicy::FitPage,
            ..Config::default()
        };
        let mut reader = mount_with(store, &config).await;
        let mut now = Instant::now();
        reader.apply(Command::ZoomIn, now);
        flip_and_settle(&mut reader, Command::NextPage, &mut now);
        assert_eq!(reader.viewport().zoom(), 1.0);
    }

    #[tokio::test]
    async fn chapter_jump_flips_to_chapter_start() {
        let store = Arc::new(MemoryProgressStore::new());
        store.set_last_page(40);
        let mut reader = mount_with(store, &Config::default()).await;
        let now = Instant::now();
        assert!(reader.apply(Command::GotoChapter { index: 2 }, now));
        assert_eq!(reader.flip().flip_direction(), Some(FlipDirection::Backward));
        assert!(reader.tick(now + Duration::from_millis(300)));
        assert_eq!(reader.current_page(), 9);
        assert!(!reader.apply(Command::GotoChapter { index: 99 }, now));
    }

    #[tokio::test]
    async fn events_record_flip_and_commit() {
        let store = Arc::new(MemoryProgressStore::new());
        let mut reader = mount_with(store, &Config::default()).await;
        let mut now = Instant::now();
        flip_and_settle(&mut reader, Command::LastPage, &mut now);
        let recorded = reader.drain_events();
        assert_eq!(
            recorded,
            vec![
                ReaderEvent::FlipStarted {
                    target: 74,
                    direction: FlipDirection::Forward
                },
                ReaderEvent::PageCommitted { page: 74 },
            ]
        );
    }

    #[tokio::test]
    async fn drained_events_leave_the_queue_empty() {
        let store = Arc::new(MemoryProgressStore::new());
        let mut reader = mount_with(store, &Config::default()).await;
        let now = Instant::now();
        reader.apply(Command::ZoomIn, now);
        reader.apply(
            Command::BeginDrag {
                pointer: PointerInput::Mouse(Point::new(0.0, 0.0)),
            },
            now,
        );
        for step in 1..=1000 {
            reader.apply(
                Command::UpdateDrag {
                    pointer: PointerInput::Mouse(Point::new(step as f32, 0.0)),
                },
                now,
            );
        }
        assert_eq!(reader.events.lock().len(), 1);
        assert_eq!(reader.drain_events(), vec![ReaderEvent::ViewportChanged]);
        assert!(reader.events.lock().is_empty());
        assert!(reader.drain_events().is_empty());
    }

    #[tokio::test]
    async fn drag_moves_without_grab_are_ignored() {
        let store = Arc::new(MemoryProgressStore::new());
        let mut reader = mount_with(store, &Config::default()).await;
        let now = Instant::now();
        assert!(reader.apply(Command::ZoomIn, now));
        reader.drain_events();

        let moved = reader.apply(
            Command::UpdateDrag {
                pointer: PointerInput::Mouse(Point::new(40.0, 40.0)),
            },
            now,
        );
        assert!(!moved);
        assert!(!reader.apply(Command::EndDrag, now));
        assert_eq!(reader.viewport().pan(), Point::ORIGIN);
        assert!(reader.drain_events().is_empty());
    }

    #[tokio::test]
    async fn unmount_discards_pending_flip() {
        let store = Arc::new(MemoryProgressStore::new());
        store.set_last_page(5);
        let mut reader = mount_with(store.clone(), &Config::default()).await;
        let now = Instant::now();
        assert!(reader.apply(Command::NextPage, now));
        reader.unmount();
        assert!(reader.flip().is_idle());
        assert!(!reader.tick(now + Duration::from_secs(1)));
        assert_eq!(reader.current_page(), 5);
        assert_eq!(store.last_page(), 5);
        assert!(!reader
            .drain_events()
            .iter()
            .any(|event| matches!(event, ReaderEvent::PageCommitted { .. })));
    }
}
