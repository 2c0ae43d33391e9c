//! Key-value progress storage.
//!
//! Values are kept as strings under fixed keys, so a value that fails to parse
//! behaves exactly like a missing one. Setters never fail from the caller's
//! point of view: write errors are logged and dropped.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::{instrument, warn};

use crate::profile::Role;
use crate::BookId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StorageKey {
    UserName,
    UserRole,
    LastPage,
    QuizScore,
    QuizCompleted,
}

impl StorageKey {
    pub const ALL: [StorageKey; 5] = [
        StorageKey::UserName,
        StorageKey::UserRole,
        StorageKey::LastPage,
        StorageKey::QuizScore,
        StorageKey::QuizCompleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::UserName => "userName",
            StorageKey::UserRole => "userRole",
            StorageKey::LastPage => "lastPage",
            StorageKey::QuizScore => "quizScore",
            StorageKey::QuizCompleted => "quizCompleted",
        }
    }
}

pub trait ProgressStore: Send + Sync {
    fn get(&self, key: StorageKey) -> Option<String>;
    fn set(&self, key: StorageKey, value: String);
    fn remove(&self, key: StorageKey);

    fn user_name(&self) -> Option<String> {
        self.get(StorageKey::UserName).filter(|name| !name.is_empty())
    }

    fn set_user_name(&self, name: &str) {
        self.set(StorageKey::UserName, name.to_owned());
    }

    fn user_role(&self) -> Option<Role> {
        self.get(StorageKey::UserRole)
            .and_then(|raw| raw.trim().parse::<u8>().ok())
            .and_then(|raw| Role::try_from(raw).ok())
    }

    fn set_user_role(&self, role: Role) {
        self.set(StorageKey::UserRole, role.get().to_string());
    }

    /// Last viewed page, `1` when nothing usable is stored.
    fn last_page(&self) -> usize {
        self.get(StorageKey::LastPage)
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|page| *page > 0)
            .unwrap_or(1)
    }

    fn set_last_page(&self, page: usize) {
        self.set(StorageKey::LastPage, page.to_string());
    }

    fn quiz_score(&self) -> Option<u32> {
        self.get(StorageKey::QuizScore)
            .and_then(|raw| raw.trim().parse::<u32>().ok())
    }

    /// Records `score` only when it beats the stored best.
    fn set_quiz_score(&self, score: u32) {
        match self.quiz_score() {
            Some(best) if best >= score => {}
            _ => self.set(StorageKey::QuizScore, score.to_string()),
        }
    }

    fn is_quiz_completed(&self) -> bool {
        self.get(StorageKey::QuizCompleted).as_deref() == Some("true")
    }

    fn set_quiz_completed(&self, completed: bool) {
        self.set(StorageKey::QuizCompleted, completed.to_string());
    }

    fn clear_all(&self) {
        for key in StorageKey::ALL {
            self.remove(key);
        }
    }
}

/// JSON file per book, rewritten atomically on every change.
pub struct FileProgressStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileProgressStore {
    pub fn open(root: &Path, book: BookId) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("failed to create state directory at {:?}", root))?;
        let path = root.join(format!("{}.json", book));
        let values = match Self::read(&path) {
            Ok(values) => values,
            Err(err) => {
                warn!(?err, ?path, "discarding unreadable progress file");
                BTreeMap::new()
            }
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(path: &Path) -> Result<BTreeMap<String, String>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let mut file =
            File::open(path).with_context(|| format!("failed to open state file {:?}", path))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        let values = serde_json::from_str(&buf)
            .with_context(|| format!("failed to decode state file {:?}", path))?;
        Ok(values)
    }

    #[instrument(skip(self, values), fields(path = ?self.path))]
    fn flush(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let payload = serde_json::to_string_pretty(values)?;
        let mut file = File::create(&tmp)
            .with_context(|| format!("failed to open temp state file {:?}", tmp))?;
        file.write_all(payload.as_bytes())?;
        file.flush()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) {
        let mut values = self.values.lock();
        apply(&mut values);
        if let Err(err) = self.flush(&values) {
            warn!(?err, path = ?self.path, "failed to persist progress");
        }
    }
}

impl ProgressStore for FileProgressStore {
    fn get(&self, key: StorageKey) -> Option<String> {
        self.values.lock().get(key.as_str()).cloned()
    }

    fn set(&self, key: StorageKey, value: String) {
        self.update(|values| {
            values.insert(key.as_str().to_owned(), value);
        });
    }

    fn remove(&self, key: StorageKey) {
        self.update(|values| {
            values.remove(key.as_str());
        });
    }
}

pub struct MemoryProgressStore {
    inner: Mutex<BTreeMap<StorageKey, String>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressStore for MemoryProgressStore {
    fn get(&self, key: StorageKey) -> Option<String> {
        self.inner.lock().get(&key).cloned()
    }

    fn set(&self, key: StorageKey, value: String) {
        self.inner.lock().insert(key, value);
    }

    fn remove(&self, key: StorageKey) {
        self.inner.lock().remove(&key);
    }
}
