use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use once_cell::sync::Lazy;
use uuid::Uuid;

pub mod config;
pub mod flip;
pub mod handbook;
pub mod pagination;
pub mod profile;
pub mod quiz;
pub mod reader;
pub mod store;
pub mod viewport;

pub use config::{AppDirs, Config, ConfigError, TurnPolicy};
pub use flip::{FlipController, FlipDirection, FlipState, DEFAULT_FLIP_DURATION};
pub use handbook::{Chapter, Handbook, HandbookError, QuizQuestion};
pub use pagination::{next_target, prev_target, resolve_spread, Spread, ViewMode};
pub use profile::{normalize_name, normalize_signature, ProfileError, Role};
pub use quiz::{AnswerFeedback, QuizPhase, QuizSession};
pub use reader::{Command, Reader, ReaderEvent};
pub use store::{FileProgressStore, MemoryProgressStore, ProgressStore, StorageKey};
pub use viewport::{Point, PointerInput, Viewport, MAX_ZOOM, MIN_ZOOM, ZOOM_STEP};

pub type BookId = Uuid;

static BOOK_NAMESPACE: Lazy<Uuid> = Lazy::new(|| {
    Uuid::parse_str("3f6d2a9e-5c1b-5e47-9a80-0c2f7e6b41d3").expect("valid namespace UUID")
});

/// Stable identifier for a book directory, used to key its progress file.
pub fn book_id_for_path(path: &Path) -> BookId {
    let resolved = path
        .canonicalize()
        .or_else(|_| {
            if path.is_absolute() {
                Ok(path.to_path_buf())
            } else {
                std::env::current_dir().map(|cwd| cwd.join(path))
            }
        })
        .unwrap_or_else(|_| path.to_path_buf());
    let rendered = resolved.to_string_lossy();
    Uuid::new_v5(&*BOOK_NAMESPACE, rendered.as_bytes())
}

#[derive(Debug, Clone)]
pub struct BookInfo {
    pub id: BookId,
    pub path: PathBuf,
    pub handbook: Arc<Handbook>,
}

impl BookInfo {
    pub fn total_pages(&self) -> usize {
        self.handbook.total_pages
    }
}

#[derive(Debug, Clone)]
pub struct RenderImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RenderImage {
    pub fn blank(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..(width as usize * height as usize) {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Outcome of trying to show one page asset.
#[derive(Debug, Clone)]
pub enum PageImage {
    Loading,
    Loaded(RenderImage),
    Missing,
}

impl PageImage {
    pub fn is_loaded(&self) -> bool {
        matches!(self, PageImage::Loaded(_))
    }
}

pub trait PageBackend: Send + Sync {
    fn info(&self) -> &BookInfo;
    /// Never fails: a page that cannot be read is reported as `Missing`.
    fn load_page(&self, page: usize) -> PageImage;
    /// Current state of a page without blocking on IO.
    fn peek_page(&self, _page: usize) -> PageImage {
        PageImage::Loading
    }
    /// Starts loading pages in the background.
    fn prefetch(&self, _pages: &[usize]) {}
}

#[async_trait::async_trait]
pub trait BookProvider: Send + Sync {
    async fn open(&self, path: &Path) -> Result<Arc<dyn PageBackend>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn book_id_is_stable_for_same_path() {
        let dir = tempdir().unwrap();
        let first = book_id_for_path(dir.path());
        let second = book_id_for_path(dir.path());
        assert_eq!(first, second);
    }

    #[test]
    fn book_id_differs_between_directories() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        assert_ne!(book_id_for_path(a.path()), book_id_for_path(b.path()));
    }

    #[test]
    fn blank_image_has_expected_size() {
        let image = RenderImage::blank(3, 2, [1, 2, 3, 4]);
        assert_eq!(image.pixels.len(), 24);
        assert_eq!(&image.pixels[20..24], &[1, 2, 3, 4]);
        assert!(!image.is_empty());
    }
}
