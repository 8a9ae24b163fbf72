// src/env.rs
//
// Gym-style episodic environment over a chapter sequence.
//
// One episode walks the chapters of a single article in order. At each step
// the agent proposes a replacement running summary; the environment scores it
// against the current chapter and advances. The running summary is stored
// verbatim, whatever its length.
//
// The phase machine is explicit: stepping outside an episode is an error,
// never a silent no-op.

use serde::{Deserialize, Serialize};

use crate::config::{Config, PenaltyConfig, RewardWeights};
use crate::error::{PrecisError, Result};
use crate::quality::{analyze_summary, SummaryMetrics, WordChecker};
use crate::tokenizer::CharTokenizer;

/// Environment lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvPhase {
    /// Constructed, no episode started.
    Ready,
    /// Mid-episode, step() is legal.
    InEpisode,
    /// Episode exhausted, reset() required to continue.
    Done,
}

/// What the agent sees before acting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Running summary carried in from the previous step, unmodified.
    pub previous_summary: String,
    /// Chapter to fold into the summary this step.
    pub chapter: String,
    /// Zero-based position of the chapter within the episode.
    pub chapter_index: usize,
    /// Framed token encoding of (previous_summary, chapter).
    pub token_ids: Vec<usize>,
}

/// One completed environment step, as stored in replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub step_index: usize,
    pub previous_summary: String,
    pub chapter: String,
    pub action_summary: String,
    pub reward: f64,
    pub metrics: SummaryMetrics,
    pub done: bool,
}

/// Result of a single environment step.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// The transition just made.
    pub transition: Transition,
    /// Next observation, or None when the episode just ended.
    pub observation: Option<Observation>,
}

/// Episodic summarization environment.
///
/// - reset() -> observation
/// - step(action_summary) -> (transition, next observation)
///
/// Deterministic: the environment holds no RNG, and scoring is pure.
#[derive(Debug)]
pub struct ArticleEnv<W: WordChecker> {
    chapters: Vec<String>,
    tokenizer: CharTokenizer,
    checker: W,
    reward_weights: RewardWeights,
    garbled_shaping: PenaltyConfig,
    word_shaping: PenaltyConfig,
    phase: EnvPhase,
    cursor: usize,
    summary: String,
    episodes_started: u64,
}

impl<W: WordChecker> ArticleEnv<W> {
    /// Create an environment over the given chapters.
    ///
    /// Applies the configured chapter cap. Fails with a configuration error
    /// when no chapters remain.
    pub fn new(
        mut chapters: Vec<String>,
        tokenizer: CharTokenizer,
        checker: W,
        config: &Config,
    ) -> Result<Self> {
        if let Some(cap) = config.max_chapters {
            chapters.truncate(cap);
        }
        if chapters.is_empty() {
            return Err(PrecisError::configuration(
                "environment requires at least one chapter",
            ));
        }
        Ok(Self {
            chapters,
            tokenizer,
            checker,
            reward_weights: config.reward_weights,
            garbled_shaping: config.garbled_penalty,
            word_shaping: config.word_penalty,
            phase: EnvPhase::Ready,
            cursor: 0,
            summary: String::new(),
            episodes_started: 0,
        })
    }

    /// Start a fresh episode and return the first observation.
    ///
    /// Legal from any phase; an in-flight episode is discarded.
    pub fn reset(&mut self) -> Observation {
        self.cursor = 0;
        self.summary.clear();
        self.phase = EnvPhase::InEpisode;
        self.episodes_started += 1;
        self.observe()
    }

    /// Apply the agent's replacement summary for the current chapter.
    ///
    /// The action is adopted verbatim as the new running summary. Returns an
    /// invalid-state error outside an episode and a malformed-metrics error
    /// if scoring ever produces a non-finite value.
    pub fn step(&mut self, action_summary: &str) -> Result<StepResult> {
        if self.phase != EnvPhase::InEpisode {
            return Err(PrecisError::invalid_state(format!(
                "step() called in phase {:?}; call reset() first",
                self.phase
            )));
        }

        let step_index = self.cursor;
        let chapter = self.chapters[step_index].clone();
        let previous_summary = std::mem::replace(&mut self.summary, action_summary.to_string());

        let metrics = analyze_summary(
            action_summary,
            &chapter,
            &self.tokenizer,
            &self.checker,
            &self.garbled_shaping,
            &self.word_shaping,
        );
        metrics.validate()?;
        let reward = metrics.reward(&self.reward_weights);

        self.cursor += 1;
        let done = self.cursor == self.chapters.len();
        if done {
            self.phase = EnvPhase::Done;
        }

        let transition = Transition {
            step_index,
            previous_summary,
            chapter,
            action_summary: action_summary.to_string(),
            reward,
            metrics,
            done,
        };
        let observation = if done { None } else { Some(self.observe()) };

        Ok(StepResult {
            transition,
            observation,
        })
    }

    /// The summary produced by a finished episode.
    pub fn final_summary(&self) -> Result<&str> {
        if self.phase != EnvPhase::Done {
            return Err(PrecisError::invalid_state(format!(
                "final_summary() requires a finished episode, phase is {:?}",
                self.phase
            )));
        }
        Ok(&self.summary)
    }

    pub fn phase(&self) -> EnvPhase {
        self.phase
    }

    pub fn num_chapters(&self) -> usize {
        self.chapters.len()
    }

    pub fn chapters(&self) -> &[String] {
        &self.chapters
    }

    pub fn tokenizer(&self) -> &CharTokenizer {
        &self.tokenizer
    }

    pub fn episodes_started(&self) -> u64 {
        self.episodes_started
    }

    fn observe(&self) -> Observation {
        let chapter = &self.chapters[self.cursor];
        Observation {
            previous_summary: self.summary.clone(),
            chapter: chapter.clone(),
            chapter_index: self.cursor,
            token_ids: self.tokenizer.encode_observation(&self.summary, chapter),
        }
    }
}
