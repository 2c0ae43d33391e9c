//! Static content of a handbook: page count, chapters, quiz and pledges.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const BUILTIN_HANDBOOK: &str = include_str!("../assets/handbook.toml");

static BUILTIN: Lazy<Arc<Handbook>> = Lazy::new(|| {
    let handbook = Handbook::from_toml_str(BUILTIN_HANDBOOK).expect("valid built-in handbook");
    Arc::new(handbook)
});

/// File name looked up in a book directory to override the built-in content.
pub const HANDBOOK_FILE: &str = "handbook.toml";

#[derive(Debug, Error)]
pub enum HandbookError {
    #[error("invalid handbook description: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("handbook must have at least one page")]
    NoPages,
    #[error("chapter {id:?} starts on page {page}, outside 1..={total}")]
    ChapterOutOfRange { id: String, page: usize, total: usize },
    #[error("question {index} has answer {answer} but only {options} options")]
    AnswerOutOfRange {
        index: usize,
        answer: usize,
        options: usize,
    },
    #[error("pass score {pass_score} exceeds the {questions} quiz questions")]
    PassScoreTooHigh { pass_score: u32, questions: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub start_page: usize,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer: usize,
    pub chapter: String,
    pub explanation: String,
}

impl QuizQuestion {
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.answer
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handbook {
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    /// Footer line printed on generated pledge cards.
    pub credit: String,
    pub total_pages: usize,
    pub pass_score: u32,
    #[serde(default)]
    pub pledges: Vec<String>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
}

impl Handbook {
    pub fn builtin() -> Arc<Handbook> {
        Arc::clone(&BUILTIN)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, HandbookError> {
        let handbook: Handbook = toml::from_str(raw)?;
        handbook.validate()?;
        Ok(handbook)
    }

    /// Uses `<dir>/handbook.toml` when present, the built-in handbook otherwise.
    pub fn load_for_book(dir: &Path) -> Result<Arc<Handbook>> {
        let path = dir.join(HANDBOOK_FILE);
        if !path.exists() {
            return Ok(Self::builtin());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read handbook file {:?}", path))?;
        let handbook = Self::from_toml_str(&raw)
            .with_context(|| format!("failed to load handbook file {:?}", path))?;
        Ok(Arc::new(handbook))
    }

    fn validate(&self) -> Result<(), HandbookError> {
        if self.total_pages == 0 {
            return Err(HandbookError::NoPages);
        }
        for chapter in &self.chapters {
            if chapter.start_page == 0 || chapter.start_page > self.total_pages {
                return Err(HandbookError::ChapterOutOfRange {
                    id: chapter.id.clone(),
                    page: chapter.start_page,
                    total: self.total_pages,
                });
            }
        }
        for (index, question) in self.questions.iter().enumerate() {
            if question.answer >= question.options.len() {
                return Err(HandbookError::AnswerOutOfRange {
                    index,
                    answer: question.answer,
                    options: question.options.len(),
                });
            }
        }
        if self.pass_score as usize > self.questions.len() {
            return Err(HandbookError::PassScoreTooHigh {
                pass_score: self.pass_score,
                questions: self.questions.len(),
            });
        }
        Ok(())
    }

    /// Chapter with the latest start page not after `page`.
    pub fn chapter_for_page(&self, page: usize) -> Option<(usize, &Chapter)> {
        self.chapters
            .iter()
            .enumerate()
            .filter(|(_, chapter)| chapter.start_page <= page)
            .max_by_key(|(index, chapter)| (chapter.start_page, *index))
    }

    /// Title line shown above the chapter list, with the subtitle when set.
    pub fn heading(&self) -> String {
        match &self.subtitle {
            Some(subtitle) if !subtitle.is_empty() => format!("{}：{}", self.title, subtitle),
            _ => self.title.clone(),
        }
    }
}
