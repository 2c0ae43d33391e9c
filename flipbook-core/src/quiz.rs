//! Quiz flow: intro, one question at a time with feedback, result.

use std::sync::Arc;

use tracing::info;

use crate::handbook::{Handbook, QuizQuestion};
use crate::store::ProgressStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    Intro,
    Question,
    Result,
}

/// Shown after an answer until the reader moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub selected: usize,
    pub correct: bool,
}

pub struct QuizSession {
    handbook: Arc<Handbook>,
    store: Arc<dyn ProgressStore>,
    phase: QuizPhase,
    index: usize,
    score: u32,
    answers: Vec<usize>,
    feedback: Option<AnswerFeedback>,
}

impl QuizSession {
    pub fn new(handbook: Arc<Handbook>, store: Arc<dyn ProgressStore>) -> Self {
        Self {
            handbook,
            store,
            phase: QuizPhase::Intro,
            index: 0,
            score: 0,
            answers: Vec::new(),
            feedback: None,
        }
    }

    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn total(&self) -> usize {
        self.handbook.questions.len()
    }

    pub fn pass_score(&self) -> u32 {
        self.handbook.pass_score
    }

    pub fn passed(&self) -> bool {
        self.score >= self.handbook.pass_score
    }

    pub fn answers(&self) -> &[usize] {
        &self.answers
    }

    /// Zero-based position of the current question.
    pub fn question_index(&self) -> usize {
        self.index
    }

    pub fn current_question(&self) -> Option<&QuizQuestion> {
        match self.phase {
            QuizPhase::Question => self.handbook.questions.get(self.index),
            _ => None,
        }
    }

    pub fn feedback(&self) -> Option<AnswerFeedback> {
        self.feedback
    }

    pub fn is_last_question(&self) -> bool {
        self.index + 1 >= self.total()
    }

    pub fn start(&mut self) {
        self.reset();
        if self.total() == 0 {
            self.finish();
            return;
        }
        self.phase = QuizPhase::Question;
    }

    /// Records an answer. Ignored while feedback is already showing or when
    /// `option` does not exist.
    pub fn answer(&mut self, option: usize) -> Option<AnswerFeedback> {
        if self.feedback.is_some() {
            return None;
        }
        let question = self.current_question()?;
        if option >= question.options.len() {
            return None;
        }
        let correct = question.is_correct(option);
        if correct {
            self.score += 1;
        }
        self.answers.push(option);
        let feedback = AnswerFeedback {
            selected: option,
            correct,
        };
        self.feedback = Some(feedback);
        Some(feedback)
    }

    /// Moves past the answered question; the last one leads to the result.
    pub fn next(&mut self) -> bool {
        if self.phase != QuizPhase::Question || self.feedback.is_none() {
            return false;
        }
        if self.is_last_question() {
            self.finish();
        } else {
            self.index += 1;
            self.feedback = None;
        }
        true
    }

    fn finish(&mut self) {
        self.phase = QuizPhase::Result;
        self.feedback = None;
        self.store.set_quiz_score(self.score);
        self.store.set_quiz_completed(true);
        info!(
            score = self.score,
            total = self.total(),
            passed = self.passed(),
            "quiz finished"
        );
    }

    pub fn reset(&mut self) {
        self.phase = QuizPhase::Intro;
        self.index = 0;
        self.score = 0;
        self.answers.clear();
        self.feedback = None;
    }
}
