use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use flipbook_core::{
    book_id_for_path, BookInfo, BookProvider, Handbook, PageBackend, PageImage, RenderImage, Role,
};
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

pub const DEFAULT_CACHE_PAGES: usize = 12;

/// File name of the image for a 1-based page number.
pub fn page_asset_name(page: usize) -> String {
    format!("edu-{:02}.png", page)
}

/// Opens book directories of pre-rendered page images.
pub struct ImageBookProvider {
    cache_pages: usize,
}

impl ImageBookProvider {
    pub fn new(cache_pages: usize) -> Self {
        Self {
            cache_pages: cache_pages.max(2),
        }
    }
}

impl Default for ImageBookProvider {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_PAGES)
    }
}

#[async_trait]
impl BookProvider for ImageBookProvider {
    async fn open(&self, path: &Path) -> Result<Arc<dyn PageBackend>> {
        let absolute = path
            .canonicalize()
            .with_context(|| format!("failed to resolve book directory {:?}", path))?;
        if !absolute.is_dir() {
            anyhow::bail!("{:?} is not a directory", absolute);
        }
        let handbook = Handbook::load_for_book(&absolute)?;
        let info = BookInfo {
            id: book_id_for_path(&absolute),
            path: absolute,
            handbook,
        };
        debug!(path = ?info.path, pages = info.total_pages(), "opened book");
        Ok(Arc::new(PageLibrary::new(info, self.cache_pages)))
    }
}

/// Decoded page images for one book, bounded by `capacity`.
pub struct PageLibrary {
    info: BookInfo,
    capacity: usize,
    cache: Arc<Mutex<PageCache>>,
}

#[derive(Default)]
struct PageCache {
    focus: usize,
    entries: HashMap<usize, PageImage>,
}

impl PageCache {
    fn insert(&mut self, page: usize, image: PageImage, capacity: usize) {
        self.entries.insert(page, image);
        while self.entries.len() > capacity {
            let focus = self.focus;
            let farthest = self
                .entries
                .keys()
                .copied()
                .max_by_key(|candidate| candidate.abs_diff(focus));
            match farthest {
                Some(victim) => {
                    self.entries.remove(&victim);
                }
                None => break,
            }
        }
    }
}

impl PageLibrary {
    pub fn new(info: BookInfo, capacity: usize) -> Self {
        Self {
            info,
            capacity: capacity.max(2),
            cache: Arc::new(Mutex::new(PageCache::default())),
        }
    }

    pub fn page_path(&self, page: usize) -> PathBuf {
        self.info.path.join(page_asset_name(page))
    }

    pub fn cached_pages(&self) -> Vec<usize> {
        let mut pages: Vec<usize> = self.cache.lock().entries.keys().copied().collect();
        pages.sort_unstable();
        pages
    }
}

fn decode_page(path: &Path) -> PageImage {
    match image::open(path) {
        Ok(decoded) => {
            let rgba = decoded.to_rgba8();
            PageImage::Loaded(RenderImage {
                width: rgba.width(),
                height: rgba.height(),
                pixels: rgba.into_raw(),
            })
        }
        Err(err) => {
            warn!(?path, %err, "page image unavailable");
            PageImage::Missing
        }
    }
}

/// Avatar picture for `role` stored next to the page images, if any.
pub fn load_avatar(book_dir: &Path, role: Role) -> Option<RenderImage> {
    let path = book_dir.join(role.asset_name());
    if !path.exists() {
        return None;
    }
    match decode_page(&path) {
        PageImage::Loaded(image) => Some(image),
        _ => None,
    }
}

impl PageBackend for PageLibrary {
    fn info(&self) -> &BookInfo {
        &self.info
    }

    #[instrument(skip(self))]
    fn load_page(&self, page: usize) -> PageImage {
        if page == 0 || page > self.info.total_pages() {
            return PageImage::Missing;
        }
        {
            let mut cache = self.cache.lock();
            cache.focus = page;
            match cache.entries.get(&page) {
                Some(PageImage::Loading) | None => {}
                Some(done) => return done.clone(),
            }
        }

        let image = decode_page(&self.page_path(page));
        self.cache
            .lock()
            .insert(page, image.clone(), self.capacity);
        image
    }

    fn peek_page(&self, page: usize) -> PageImage {
        if page == 0 || page > self.info.total_pages() {
            return PageImage::Missing;
        }
        self.cache
            .lock()
            .entries
            .get(&page)
            .cloned()
            .unwrap_or(PageImage::Loading)
    }

    fn prefetch(&self, pages: &[usize]) {
        let total = self.info.total_pages();
        for &page in pages {
            if page == 0 || page > total {
                continue;
            }
            {
                let mut cache = self.cache.lock();
                if cache.entries.contains_key(&page) {
                    continue;
                }
                cache.insert(page, PageImage::Loading, self.capacity);
            }
            let cache = Arc::clone(&self.cache);
            let capacity = self.capacity;
            let path = self.page_path(page);
            rayon::spawn(move || {
                let image = decode_page(&path);
                let mut cache = cache.lock();
                // Evicted while decoding; the page is no longer wanted.
                if matches!(cache.entries.get(&page), Some(PageImage::Loading)) {
                    cache.insert(page, image, capacity);
                }
            });
        }
    }
}
